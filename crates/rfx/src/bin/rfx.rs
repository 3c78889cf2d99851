use std::io::{stdin, stdout};

use clap::Parser;

use rfx::logging::{init_logging, LogFormat, LogLevel};
use rfx::session::ClientSession;
use rfx::transport::TcpSocket;
use rfx::{DEFAULT_HOST, DEFAULT_PORT};

/// Interactive remote file exchange client.
///
/// Reads commands from standard input (`help` lists them) and drives one
/// protocol exchange per command. End of input is equivalent to `exit`.
#[derive(Parser, Debug)]
#[command(name = "rfx", version, about = "Remote file exchange client")]
struct Cli {
    /// Server host.
    host: Option<String>,

    /// Server port.
    port: Option<u16>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let host = cli.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = cli.port.unwrap_or(DEFAULT_PORT);
    tracing::info!(host, port, "starting");

    // A failed session still exits 0: the failure lands in the log and the
    // operator reissues commands on a fresh run.
    if let Err(err) = run(&host, port) {
        tracing::error!(error = %err, "session failed");
    }
    tracing::info!("finishing");
}

fn run(host: &str, port: u16) -> rfx::session::Result<()> {
    let stream = TcpSocket::connect(host, port)?;
    let mut session = ClientSession::open(stream, "rfx")?;
    session.run(stdin().lock(), stdout())
}
