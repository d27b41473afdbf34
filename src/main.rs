use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use mailgram::config::Config;
use mailgram::cursor::CursorStore;
use mailgram::daemon::Daemon;
use mailgram::forwarder::TelegramForwarder;
use mailgram::imap::ImapRetriever;
use mailgram::runner::TaskRunner;
use mailgram::scheduler::Scheduler;

#[derive(Parser, Debug)]
#[command(name = "mailgram", version, about = "Forward incoming IMAP mail to chat destinations")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(long, short, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let cfg = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("mailgram: invalid configuration: {err}");
            process::exit(2);
        }
    };

    // initialize logging
    let default_directive = format!(
        "mailgram={}",
        cfg.log_level.as_deref().unwrap_or("info")
    );
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or(default_directive),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        version = mailgram::VERSION,
        config = %args.config.display(),
        "mailgram starting"
    );

    let cfg = Arc::new(cfg);
    let store = Arc::new(CursorStore::new());
    let runner = Arc::new(TaskRunner::new(
        cfg.clone(),
        store,
        ImapRetriever::new(),
        TelegramForwarder::new(),
    ));
    let daemon = Daemon::new(cfg, Scheduler::new(), runner);

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            wait_for_signal().await;
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    let exit_code = match daemon.run(shutdown).await {
        Ok(()) => {
            info!("mailgram exited cleanly");
            0
        }
        Err(err) => {
            error!("mailgram exited with error: {err}");
            1
        }
    };

    process::exit(exit_code);
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(err) => {
            error!("unable to install SIGTERM handler: {err}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
