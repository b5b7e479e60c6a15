//! task-presenter - demo host
//!
//! Creates a host, lets it present for a while (or until Ctrl-C), then
//! destroys it. Logs show which thread each notification ran on.

use std::sync::Arc;
use std::time::Duration;

use task_presenter::{
    BackgroundPool, Config, DataProvider, ForegroundLoop, Host, LoggingView, Presenter,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "task_presenter=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: param={} delay={:?} failure_rate={} workers={}",
        config.task_param, config.load_delay, config.failure_rate, config.background_workers
    );

    // Both execution contexts live for the whole process.
    let pool = BackgroundPool::new(config.background_workers)?;
    let foreground = ForegroundLoop::spawn()?;

    let presenter = Presenter::new(
        Arc::new(LoggingView),
        Arc::new(DataProvider::from_config(&config)),
        foreground.handle(),
        pool.handle(),
    )
    .with_config(&config);

    let mut host = Host::new(Arc::new(presenter));
    let run = host.on_create()?;

    let state = pool.block_on(async {
        tokio::select! {
            _ = tokio::time::sleep(config.run_for) => {
                info!("Host lifetime elapsed");
            }
            _ = run.wait() => {}
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
            }
        }
        host.on_destroy();
        run.wait().await
    });
    info!(task_id = %run.id(), state = ?state, "Run finished");

    foreground.shutdown();
    pool.shutdown(Duration::from_secs(1));
    Ok(())
}
