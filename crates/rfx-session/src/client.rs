use std::fs;
use std::io::{BufRead, Read, Write};

use tracing::{debug, info, span, warn, Level};

use rfx_transport::RfxStream;
use rfx_wire::{payload_len, Command, Header, PacketReader, PacketWriter, FILENAME_SIZE};

use crate::error::{Result, SessionError};

/// Static usage summary printed by `help`.
const HELP_TEXT: &str = "\
exit         - Exit the program.  Equivalent to EOF.
get filename - Copy remote file to local host.
help         - Print help summary.
ls           - List names of files on remote server.
put filename - Copy local file to remote host.
rm filename  - Remove file from remote server.
";

/// One parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Exit,
    Help,
    Ls,
    Get(String),
    Put(String),
    Rm(String),
    /// Unrecognized keyword, stray operand, or missing filename; reported
    /// locally without contacting the server.
    Invalid(String),
}

/// Parse one line of user input.
///
/// `exit`, `help` and `ls` stand alone; `get`, `put` and `rm` take the rest
/// of the line as the filename.
pub fn parse_request(line: &str) -> Request {
    let trimmed = line.trim();
    let (keyword, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (trimmed, ""),
    };

    match keyword {
        "exit" if rest.is_empty() => Request::Exit,
        "help" if rest.is_empty() => Request::Help,
        "ls" if rest.is_empty() => Request::Ls,
        "get" if !rest.is_empty() => Request::Get(rest.to_string()),
        "put" if !rest.is_empty() => Request::Put(rest.to_string()),
        "rm" if !rest.is_empty() => Request::Rm(rest.to_string()),
        _ => Request::Invalid(trimmed.to_string()),
    }
}

/// Interactive command loop over one server connection.
///
/// Each user command drives exactly one request/response cycle; `exit` and
/// `help` never touch the network. User-visible output (help text, LS
/// listings, failure reports) goes to the injected console writer.
pub struct ClientSession<R, W> {
    reader: PacketReader<R>,
    writer: PacketWriter<W>,
    span: tracing::Span,
}

impl ClientSession<RfxStream, RfxStream> {
    /// Take ownership of an established connection, splitting it into a
    /// read half and a write half.
    pub fn open(stream: RfxStream, name: &str) -> Result<Self> {
        let peer = stream.peer_addr()?;
        info!(prog = name, peer = %peer, "connected");
        let reader_stream = stream.try_clone()?;
        Ok(Self::from_parts_with_span(
            reader_stream,
            stream,
            span!(Level::INFO, "client", prog = name, peer = %peer),
        ))
    }
}

impl<R: Read, W: Write> ClientSession<R, W> {
    /// Build a session from separate read and write streams.
    pub fn from_parts(reader: R, writer: W, name: &str) -> Self {
        Self::from_parts_with_span(reader, writer, span!(Level::INFO, "client", prog = name))
    }

    fn from_parts_with_span(reader: R, writer: W, span: tracing::Span) -> Self {
        Self {
            reader: PacketReader::new(reader),
            writer: PacketWriter::new(writer),
            span,
        }
    }

    /// Consume the session and return the inner streams.
    pub fn into_parts(self) -> (R, W) {
        (self.reader.into_inner(), self.writer.into_inner())
    }

    /// Drive the command loop until `exit` or end of input.
    ///
    /// Transport and wire failures abort the loop with an error; protocol
    /// surprises (NAK, unexpected response command) are reported on the
    /// console and the loop continues with the next command.
    pub fn run(&mut self, input: impl BufRead, mut console: impl Write) -> Result<()> {
        let _guard = self.span.clone().entered();
        for line in input.lines() {
            let line = line.map_err(SessionError::Console)?;
            debug!(line = %line, "command");
            match parse_request(&line) {
                Request::Exit => break,
                Request::Help => {
                    console
                        .write_all(HELP_TEXT.as_bytes())
                        .map_err(SessionError::Console)?;
                }
                Request::Ls => self.ls(&mut console)?,
                Request::Get(name) => self.get(&name, &mut console)?,
                Request::Put(name) => self.put(&name, &mut console)?,
                Request::Rm(name) => self.rm(&name, &mut console)?,
                Request::Invalid(line) => {
                    writeln!(console, "{line}: invalid command").map_err(SessionError::Console)?;
                }
            }
        }
        info!("session ended");
        Ok(())
    }

    /// Send one request header and read the paired response header.
    fn exchange(&mut self, request: &Header) -> Result<Header> {
        debug!(header = ?request, "sending header");
        self.writer.send_header(request)?;
        let response = self.reader.recv_header()?;
        debug!(header = ?response, "received header");
        Ok(response)
    }

    fn get(&mut self, name: &str, console: &mut impl Write) -> Result<()> {
        let response = self.exchange(&self.request_for(Command::Get, name))?;
        if response.command != Command::FileOut {
            return report_failure(console, "get", name, &response);
        }

        let payload = self.reader.recv_payload(response.nbytes)?;
        debug!(nbytes = response.nbytes, "received payload");
        if let Err(err) = fs::write(name, &payload) {
            warn!(name, error = %err, "local write failed");
            writeln!(console, "get {name}: {err}").map_err(SessionError::Console)?;
        }
        Ok(())
    }

    fn ls(&mut self, console: &mut impl Write) -> Result<()> {
        let response = self.exchange(&Header::new(Command::Ls))?;
        if response.command != Command::LsOut {
            return report_failure(console, "ls", "", &response);
        }

        let listing = self.reader.recv_payload(response.nbytes)?;
        debug!(nbytes = response.nbytes, "received payload");
        console.write_all(&listing).map_err(SessionError::Console)
    }

    fn put(&mut self, name: &str, console: &mut impl Write) -> Result<()> {
        let content = match fs::read(name) {
            Ok(content) => content,
            Err(err) => {
                // Local open failure: tell the server with a bare NAK and
                // stop; the server sends nothing back for it.
                let mut nak = Header::new(Command::Nak);
                nak.nbytes = err.raw_os_error().unwrap_or(0) as u32;
                debug!(header = ?nak, "sending header");
                self.writer.send_header(&nak)?;
                warn!(name, error = %err, "local read failed");
                return writeln!(console, "put {name}: {err}").map_err(SessionError::Console);
            }
        };

        let mut request = self.request_for(Command::Put, name);
        request.nbytes = payload_len(&content)?;
        debug!(header = ?request, "sending header");
        self.writer.send_header(&request)?;
        self.writer.send_payload(&content)?;
        debug!(nbytes = request.nbytes, "sent payload");

        let response = self.reader.recv_header()?;
        debug!(header = ?response, "received header");
        if response.command != Command::Ack {
            return report_failure(console, "put", name, &response);
        }
        Ok(())
    }

    fn rm(&mut self, name: &str, console: &mut impl Write) -> Result<()> {
        let response = self.exchange(&self.request_for(Command::Rm, name))?;
        if response.command == Command::Nak {
            return report_failure(console, "rm", name, &response);
        }
        Ok(())
    }

    fn request_for(&self, command: Command, name: &str) -> Header {
        let mut header = Header::new(command);
        if header.set_filename(name) {
            warn!(name, limit = FILENAME_SIZE - 1, "filename truncated");
        }
        header
    }
}

fn report_failure(
    console: &mut impl Write,
    verb: &str,
    target: &str,
    response: &Header,
) -> Result<()> {
    warn!(verb, target, response = ?response, "request failed");
    let reason = match response.command {
        Command::Nak => os_error_message(response.nbytes),
        other => format!("unexpected {other} response"),
    };
    if target.is_empty() {
        writeln!(console, "{verb}: {reason}").map_err(SessionError::Console)
    } else {
        writeln!(console, "{verb} {target}: {reason}").map_err(SessionError::Console)
    }
}

/// Render an OS error code carried in a NAK's `nbytes` field.
fn os_error_message(code: u32) -> String {
    std::io::Error::from_raw_os_error(code as i32).to_string()
}
