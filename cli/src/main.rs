//! `smartctx` binary entry point: loads config, wires the Intent Router,
//! and runs the line-delimited JSON stdio transport (§6) until EOF or a
//! shutdown signal, honoring the configured shutdown timeout and exit
//! code contract (0 clean, 1 forced).

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use smartctx_server::App;
use smartctx_server::IntentRouter;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "smartctx")]
#[command(about = "Code-intelligence backend: hybrid search, transactional edits, dependency analysis")]
struct Args {
    /// Project root to serve (defaults to the current directory).
    #[arg(default_value = ".")]
    project_root: PathBuf,
}

/// `ENGINE_MODE` and `PARSER_BACKEND` (§6) are read directly here rather
/// than through `Config`: they select process-level behavior (log
/// verbosity defaults, which chunk-language backend to prefer) rather than
/// backend tuning knobs, so they don't belong in the project config file.
fn engine_mode() -> String {
    std::env::var("ENGINE_MODE").unwrap_or_else(|_| "prod".to_string())
}

fn init_logging(log_to_file: bool, project_root: &std::path::Path) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if engine_mode() == "test" {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    if log_to_file {
        let log_dir = smartctx_config::Config::state_dir(project_root);
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "smartctx.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
            .init();
        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
        None
    }
}

fn spawn_heartbeat(app: Arc<App>, enabled: bool) {
    if !enabled {
        return;
    }
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
        loop {
            interval.tick().await;
            match app.store.pending_transactions().await {
                Ok(pending) if pending.is_empty() => tracing::debug!("heartbeat: alive, no pending transactions"),
                Ok(pending) => tracing::warn!(count = pending.len(), "heartbeat: pending transactions outstanding"),
                Err(e) => tracing::warn!(error = %e, "heartbeat: failed to query pending transactions"),
            }
        }
    });
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = Args::parse();
    let project_root = args.project_root.canonicalize().unwrap_or(args.project_root);

    let probe_config = smartctx_config::Config::load(&project_root);
    let _log_guard = init_logging(probe_config.server.log_to_file, &project_root);

    tracing::info!(project_root = %project_root.display(), engine_mode = %engine_mode(), "starting smartctx");

    let app = match App::bootstrap(project_root.clone()).await {
        Ok(app) => Arc::new(app),
        Err(e) => {
            tracing::error!(error = %e, "failed to bootstrap backend");
            return std::process::ExitCode::FAILURE;
        }
    };

    let shutdown_timeout_ms = app.config.server.shutdown_timeout_ms;
    spawn_heartbeat(app.clone(), app.config.server.heartbeat);

    let router = Arc::new(IntentRouter::new(app));
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let serve_router = router.clone();
    let serve_task = tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        smartctx_server::transport::serve(&serve_router, stdin, stdout, shutdown_rx).await
    });

    tokio::pin!(serve_task);
    tokio::select! {
        result = &mut serve_task => {
            match result {
                Ok(Ok(())) => std::process::ExitCode::SUCCESS,
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "transport loop failed");
                    std::process::ExitCode::FAILURE
                }
                Err(e) => {
                    tracing::error!(error = %e, "transport task panicked");
                    std::process::ExitCode::FAILURE
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received, draining in-flight requests");
            let _ = shutdown_tx.send(true);
            let timeout = std::time::Duration::from_millis(shutdown_timeout_ms);
            match tokio::time::timeout(timeout, &mut serve_task).await {
                Ok(Ok(Ok(()))) => std::process::ExitCode::SUCCESS,
                Ok(_) => std::process::ExitCode::FAILURE,
                Err(_) => {
                    tracing::error!("shutdown timeout exceeded, forcing exit");
                    std::process::ExitCode::FAILURE
                }
            }
        }
    }
}
