use clap::Parser;

use rfx::exit::{transport_error, CliError, INTERNAL, SUCCESS};
use rfx::logging::{init_logging, LogFormat, LogLevel};
use rfx::session::{FileServer, SessionError};
use rfx::DEFAULT_PORT;

/// Remote file exchange server.
///
/// Listens forever and serves its working directory, one isolated worker
/// thread per accepted connection.
#[derive(Parser, Debug)]
#[command(name = "rfxd", version, about = "Remote file exchange server")]
struct Cli {
    /// Listening port.
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
    install_ctrlc_handler();

    let port = cli.port.unwrap_or(DEFAULT_PORT);
    tracing::info!(port, "starting");

    match FileServer::bind(port, ".") {
        Ok(server) => server.serve(),
        Err(err) => {
            let err = bind_error(err);
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

fn bind_error(err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error("bind failed", err),
        other => CliError::new(INTERNAL, format!("bind failed: {other}")),
    }
}

fn install_ctrlc_handler() {
    if let Err(err) = ctrlc::set_handler(|| {
        tracing::info!("finishing");
        std::process::exit(SUCCESS);
    }) {
        tracing::warn!(error = %err, "signal handler setup failed");
    }
}
