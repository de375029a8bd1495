use anyhow::Result;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use widget_analytics_api::core::{config::Settings, store::AnalyticsStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let settings = Settings::new()?;
    init_tracing(settings.logging.json);

    info!(
        "Starting widget analytics API on {}:{}",
        settings.server.host, settings.server.port
    );

    let backend = settings.storage.build_backend();
    info!(
        "Using {} storage backend ({})",
        backend.name(),
        settings.storage.path.display()
    );
    let store = Arc::new(AnalyticsStore::new(backend));
    let app = widget_analytics_api::create_app(store);

    let host: IpAddr = settings.server.host.parse()?;
    let addr = SocketAddr::new(host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(json: bool) {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
