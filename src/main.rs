use anyhow::Context;
use iqac_portal::{config::Config, router, worker, AppState};
use tokio::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("iqac_portal=debug,tower_http=info")
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let worker_config = config.worker.clone();

    let state = AppState::connect(config)
        .await
        .context("Failed to create MongoDB client")?;

    state
        .mongo
        .ensure_indexes()
        .await
        .context("Failed to create MongoDB indexes")?;
    state
        .ensure_admin()
        .await
        .context("Failed to create bootstrap admin")?;

    if worker_config.reminder_enabled {
        let mongo = state.mongo.clone();
        let notifier = state.notifier.clone();
        let every = Duration::from_secs(worker_config.reminder_interval_secs.max(1));
        tokio::spawn(async move {
            worker::reminder_process(mongo, notifier, every).await;
        });
    }

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .await
        .context("Server error")?;

    Ok(())
}
