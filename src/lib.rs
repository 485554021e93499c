pub mod api;
pub mod cli;
pub mod clients;
pub mod config;
pub mod constants;
pub mod db;
pub mod domain;
pub mod entities;
pub mod services;
pub mod state;

use std::sync::Arc;
use tokio::signal;

use anyhow::Context;
use cli::Commands;
pub use config::Config;
use db::Store;
use metrics_exporter_prometheus::PrometheusHandle;
use state::SharedState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run(command: Commands, config: Config) -> anyhow::Result<()> {
    config.validate()?;

    if command == Commands::CheckConfig {
        let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
        println!("{rendered}");
        return Ok(());
    }

    let prometheus_handle = if config.observability.metrics_enabled && command == Commands::Serve {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        Some(handle)
    } else {
        None
    };

    init_tracing(&config)?;

    info!(
        event = "microblog_startup",
        version = env!("CARGO_PKG_VERSION"),
        command = ?command,
        metrics = prometheus_handle.is_some(),
        "microblog startup"
    );

    match command {
        Commands::Serve => run_server(config, prometheus_handle).await,
        Commands::Migrate => run_migrations(&config).await,
        Commands::CheckConfig => Ok(()),
    }
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let json = config.observability.json_logs;
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json());
    let text_layer = (!json).then(tracing_subscriber::fmt::layer);

    let loki_layer = if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let (layer, task) = tracing_loki::builder()
            .label("app", "microblog")?
            .build_url(url)?;

        tokio::spawn(task);
        Some(layer)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(loki_layer)
        .try_init()
        .context("Failed to initialize tracing")?;

    if config.observability.loki_enabled {
        info!(loki_url = %config.observability.loki_url, "Loki logging initialized");
    }

    Ok(())
}

async fn run_migrations(config: &Config) -> anyhow::Result<()> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;
    store.ping().await?;

    info!(database = %config.general.database_path, "Migrations applied");
    Ok(())
}

async fn run_server(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<()> {
    let port = config.server.port;
    let public_url = config.server.public_url.clone();

    let shared = Arc::new(SharedState::new(config).await?);
    let app_state = api::create_app_state(shared, prometheus_handle).await?;
    let app = api::router(app_state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(%addr, %public_url, "Web server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {e}"),
    }
}
