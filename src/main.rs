use smtpd::{daemon, logging, Opt, SmtpServer};

use anyhow::{Context, Result};
use std::sync::Arc;
use structopt::StructOpt;
use tokio::signal;
use tracing::info;

fn main() -> Result<()> {
    let opt = Opt::from_args();

    // Daemonisation AVANT la création du runtime tokio
    if opt.daemon {
        daemon::daemonize(&opt.pid_file)?;
    }

    logging::setup_tracing(opt.json, !opt.daemon)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start the tokio runtime")?;
    runtime.block_on(serve(opt))
}

async fn serve(opt: Opt) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), pid = std::process::id(), "smtpd starting");

    let server = Arc::new(SmtpServer::new(opt)?);

    info!(
        fqdn = server.fqdn(),
        ports = ?server.opt.ports,
        address = %server.opt.address,
        data_dir = ?server.opt.data_dir,
        "waiting for connections"
    );

    tokio::select! {
        result = server.run() => result,
        _ = signal::ctrl_c() => {
            info!("interrupted, shutting down");
            Ok(())
        }
    }
}
