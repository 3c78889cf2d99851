use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use tracing::{debug, error, info, span, warn, Level};

use rfx_transport::RfxStream;
use rfx_wire::{payload_len, Command, Header, PacketReader, PacketWriter, WireError};

use crate::error::{Result, SessionError};

/// Serves one accepted connection to completion.
///
/// Repeatedly reads a header and routes it to a command handler. Handlers
/// perform their filesystem or process side effect against `root` (the
/// served directory) and answer with exactly one response header, plus a
/// payload where the command implies one.
pub struct Dispatcher<R, W> {
    reader: PacketReader<R>,
    writer: PacketWriter<W>,
    root: PathBuf,
    span: tracing::Span,
}

impl Dispatcher<RfxStream, RfxStream> {
    /// Take ownership of an accepted connection.
    pub fn open(stream: RfxStream, root: impl Into<PathBuf>, worker_id: u64) -> Result<Self> {
        let peer = stream.peer_addr()?;
        let reader_stream = stream.try_clone()?;
        let span = span!(Level::INFO, "worker", id = worker_id, peer = %peer);
        Ok(Self::from_parts_with_span(reader_stream, stream, root, span))
    }
}

impl<R: Read, W: Write> Dispatcher<R, W> {
    /// Build a dispatcher from separate read and write streams.
    pub fn from_parts(reader: R, writer: W, root: impl Into<PathBuf>, worker_id: u64) -> Self {
        let span = span!(Level::INFO, "worker", id = worker_id);
        Self::from_parts_with_span(reader, writer, root, span)
    }

    fn from_parts_with_span(reader: R, writer: W, root: impl Into<PathBuf>, span: tracing::Span) -> Self {
        Self {
            reader: PacketReader::new(reader),
            writer: PacketWriter::new(writer),
            root: root.into(),
            span,
        }
    }

    /// Serve requests until the peer disconnects or the stream fails.
    ///
    /// The wire failure ending the loop is logged here and swallowed: one
    /// connection's failure is never fatal to the process.
    pub fn run(&mut self) {
        let _guard = self.span.clone().entered();
        info!("serving");
        match self.serve_loop() {
            Err(SessionError::Wire(WireError::ConnectionClosed)) => info!("peer disconnected"),
            Err(err) => error!(error = %err, "connection failed"),
            Ok(()) => {}
        }
        info!("finishing");
    }

    fn serve_loop(&mut self) -> Result<()> {
        loop {
            let header = self.reader.recv_header()?;
            debug!(header = ?header, "received header");
            match header.command {
                Command::Get => self.reply_get(&header)?,
                Command::Ls => self.reply_ls()?,
                Command::Put => self.reply_put(header)?,
                Command::Rm => self.reply_rm(&header)?,
                // Unknown commands get no response at all: log and keep
                // serving the connection.
                other => warn!(command = %other, "invalid command from client"),
            }
        }
    }

    fn reply_get(&mut self, request: &Header) -> Result<()> {
        let path = self.root.join(request.filename().as_ref());
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "get failed");
                return self.send_nak(&err);
            }
        };

        let mut response = Header::new(Command::FileOut);
        response.nbytes = payload_len(&content)?;
        self.send_header(&response)?;
        self.writer.send_payload(&content)?;
        debug!(nbytes = response.nbytes, "sent payload");
        Ok(())
    }

    fn reply_ls(&mut self) -> Result<()> {
        let output = match std::process::Command::new("ls")
            .arg("-l")
            .current_dir(&self.root)
            .output()
        {
            Ok(output) => output,
            Err(err) => {
                warn!(error = %err, "ls: spawn failed");
                return self.send_nak(&err);
            }
        };
        log_exit_status(&output.status);

        // Combined stdout + stderr, the way `ls -l 2>&1` through a pipe
        // reads.
        let mut listing = output.stdout;
        listing.extend_from_slice(&output.stderr);

        let mut response = Header::new(Command::LsOut);
        response.nbytes = payload_len(&listing)?;
        self.send_header(&response)?;
        self.writer.send_payload(&listing)?;
        debug!(nbytes = response.nbytes, "sent payload");
        Ok(())
    }

    fn reply_put(&mut self, request: Header) -> Result<()> {
        if request.command != Command::Put {
            warn!(command = %request.command, "put handler invoked without PUT");
            return self.send_header(&Header::new(Command::Nak));
        }

        let payload = self.reader.recv_payload(request.nbytes)?;
        debug!(nbytes = request.nbytes, "received payload");

        let path = self.root.join(request.filename().as_ref());
        if let Err(err) = fs::write(&path, &payload) {
            warn!(path = %path.display(), error = %err, "put failed");
            return self.send_nak(&err);
        }
        self.send_header(&Header::new(Command::Ack))
    }

    fn reply_rm(&mut self, request: &Header) -> Result<()> {
        let path = self.root.join(request.filename().as_ref());
        // Existence probe first: a missing file is reported with the open
        // error's code, matching the GET failure shape.
        if let Err(err) = fs::File::open(&path) {
            warn!(path = %path.display(), error = %err, "rm failed");
            return self.send_nak(&err);
        }
        if let Err(err) = fs::remove_file(&path) {
            warn!(path = %path.display(), error = %err, "rm failed");
            return self.send_nak(&err);
        }
        self.send_header(&Header::new(Command::Ack))
    }

    fn send_header(&mut self, response: &Header) -> Result<()> {
        debug!(header = ?response, "sending header");
        self.writer.send_header(response)?;
        Ok(())
    }

    fn send_nak(&mut self, err: &std::io::Error) -> Result<()> {
        let mut nak = Header::new(Command::Nak);
        nak.nbytes = err.raw_os_error().unwrap_or(0) as u32;
        self.send_header(&nak)
    }
}

fn log_exit_status(status: &std::process::ExitStatus) {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        debug!(
            code = status.code(),
            signal = status.signal(),
            core_dumped = status.core_dumped(),
            "ls exit status"
        );
    }
    #[cfg(not(unix))]
    debug!(code = status.code(), "ls exit status");
}
