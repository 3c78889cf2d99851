use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use rfx_transport::{RfxStream, TcpSocket};

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::reaper::WorkerSet;

/// Accepts connections and hands each one to an isolated worker thread.
///
/// The accept loop itself is single-threaded and blocks between
/// connections; every accepted stream is owned by exactly one worker
/// running a [`Dispatcher`] to completion. Workers share nothing but the
/// served directory.
pub struct FileServer {
    socket: TcpSocket,
    root: PathBuf,
    workers: Arc<WorkerSet>,
}

impl FileServer {
    /// Bind the listening socket. Workers serve files out of `root`.
    pub fn bind(port: u16, root: impl Into<PathBuf>) -> Result<Self> {
        let socket = TcpSocket::bind(port)?;
        Ok(Self {
            socket,
            root: root.into(),
            workers: WorkerSet::new(),
        })
    }

    /// The bound listening address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// The worker registry, for observing or shutting down reaping.
    pub fn workers(&self) -> &Arc<WorkerSet> {
        &self.workers
    }

    /// Accept and dispatch connections forever.
    ///
    /// Nothing that happens on one connection ends this loop: accept
    /// failures (beyond the transparently retried interruption) and worker
    /// spawn failures are logged and the listener keeps going.
    pub fn serve(&self) {
        info!(addr = ?self.local_addr().ok(), root = %self.root.display(), "serving");
        loop {
            self.serve_once();
        }
    }

    fn serve_once(&self) {
        let stream = match self.socket.accept() {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "accept failed");
                return;
            }
        };

        if let Err(err) = self.dispatch(stream) {
            error!(error = %err, "worker spawn failed");
        }

        // Synchronous pass: collect whatever finished while the listener
        // was blocked in accept.
        self.workers.reap_finished();
    }

    fn dispatch(&self, stream: RfxStream) -> std::io::Result<()> {
        let root = self.root.clone();
        let id = self.workers.spawn(move |id| match Dispatcher::open(stream, root, id) {
            Ok(mut dispatcher) => dispatcher.run(),
            Err(err) => error!(worker = id, error = %err, "worker setup failed"),
        })?;
        debug!(worker = id, "worker started");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;
    use std::path::PathBuf;

    use bytes::BytesMut;

    use rfx_wire::{encode_header, Command, Header, PacketReader, PacketWriter};

    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "rfx-server-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    /// Bind on an ephemeral port, serve forever in a background thread.
    fn start_server(tag: &str) -> (SocketAddr, PathBuf) {
        let dir = temp_dir(tag);
        let server = FileServer::bind(0, &dir).expect("server should bind");
        let addr = server.local_addr().expect("bound address");
        std::thread::spawn(move || server.serve());
        (addr, dir)
    }

    struct TestClient {
        reader: PacketReader<RfxStream>,
        writer: PacketWriter<RfxStream>,
    }

    impl TestClient {
        fn connect(addr: &SocketAddr) -> Self {
            let stream = TcpSocket::connect(&addr.ip().to_string(), addr.port())
                .expect("client should connect");
            let reader = PacketReader::new(stream.try_clone().expect("clone"));
            Self {
                reader,
                writer: PacketWriter::new(stream),
            }
        }

        fn send(&mut self, command: Command, name: &str, payload: &[u8]) {
            let mut header = Header::new(command);
            header.set_filename(name);
            header.nbytes = payload.len() as u32;
            self.writer.send_header(&header).expect("send header");
            if !payload.is_empty() {
                self.writer.send_payload(payload).expect("send payload");
            }
        }

        fn recv(&mut self) -> (Header, Vec<u8>) {
            let header = self.reader.recv_header().expect("response header");
            let payload = if header.command.carries_payload() {
                self.reader
                    .recv_payload(header.nbytes)
                    .expect("response payload")
                    .to_vec()
            } else {
                Vec::new()
            };
            (header, payload)
        }
    }

    #[test]
    fn put_then_get_round_trip_across_connections() {
        let (addr, dir) = start_server("roundtrip");
        // Past the original's 4 KiB transfer buffer on purpose.
        let content: Vec<u8> = (0..=255u8).cycle().take(0x1000 * 5 + 17).collect();

        let mut uploader = TestClient::connect(&addr);
        uploader.send(Command::Put, "blob.bin", &content);
        let (response, _) = uploader.recv();
        assert_eq!(response.command, Command::Ack);

        let mut downloader = TestClient::connect(&addr);
        downloader.send(Command::Get, "blob.bin", b"");
        let (response, payload) = downloader.recv();
        assert_eq!(response.command, Command::FileOut);
        assert_eq!(payload, content);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn deletion_is_visible_across_connections() {
        let (addr, dir) = start_server("rm-visibility");

        let mut first = TestClient::connect(&addr);
        first.send(Command::Put, "victim.txt", b"short lived");
        assert_eq!(first.recv().0.command, Command::Ack);
        first.send(Command::Rm, "victim.txt", b"");
        assert_eq!(first.recv().0.command, Command::Ack);

        let mut second = TestClient::connect(&addr);
        second.send(Command::Get, "victim.txt", b"");
        let (response, _) = second.recv();
        assert_eq!(response.command, Command::Nak);
        assert_ne!(response.nbytes, 0);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn concurrent_connections_stay_isolated() {
        let (addr, dir) = start_server("isolation");

        let handles: Vec<_> = (0..2)
            .map(|i| {
                let addr = addr;
                std::thread::spawn(move || {
                    let name = format!("file-{i}.bin");
                    let content: Vec<u8> = std::iter::repeat(i as u8 + 1)
                        .take(0x1000 * 2 + i)
                        .collect();

                    let mut client = TestClient::connect(&addr);
                    client.send(Command::Put, &name, &content);
                    assert_eq!(client.recv().0.command, Command::Ack);

                    client.send(Command::Get, &name, b"");
                    let (response, payload) = client.recv();
                    assert_eq!(response.command, Command::FileOut);
                    assert_eq!(payload, content);
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("client thread should finish");
        }

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unknown_command_gets_no_response_and_connection_survives() {
        let (addr, dir) = start_server("unknown");
        fs::write(dir.join("present.txt"), b"here").unwrap();

        let stream = TcpSocket::connect(&addr.ip().to_string(), addr.port())
            .expect("client should connect");
        let mut raw = stream.try_clone().expect("clone");

        // A header whose command byte is out of range.
        let mut bogus = BytesMut::new();
        encode_header(&Header::new(Command::Ls), &mut bogus);
        bogus[0] = 0xee;
        raw.write_all(&bogus).expect("write bogus header");

        // Same connection, regular request: the only response that ever
        // arrives answers it.
        let mut client = TestClient {
            reader: PacketReader::new(stream.try_clone().expect("clone")),
            writer: PacketWriter::new(stream),
        };
        client.send(Command::Get, "present.txt", b"");
        let (response, payload) = client.recv();
        assert_eq!(response.command, Command::FileOut);
        assert_eq!(payload, b"here");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn serves_connections_sequentially_and_reaps_workers() {
        let (addr, dir) = start_server("sequential");

        for i in 0..3 {
            let mut client = TestClient::connect(&addr);
            client.send(Command::Put, &format!("seq-{i}.txt"), b"x");
            assert_eq!(client.recv().0.command, Command::Ack);
        }

        for i in 0..3 {
            assert!(dir.join(format!("seq-{i}.txt")).exists());
        }

        let _ = fs::remove_dir_all(&dir);
    }
}
