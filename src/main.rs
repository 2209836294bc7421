use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use genrelay::{api, config::Config, providers::ProviderKind};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    Config::dotenv_load();
    let config = Config::from_env().expect("Failed to load configuration");
    config.print_env_vars();
    for provider in ProviderKind::ALL {
        if !config.is_configured(provider) {
            tracing::warn!("{} is not configured: {}", provider.label(), provider.setup_instructions());
        }
    }
    if config.is_configured(ProviderKind::Replicate) && config.public_base_url_is_loopback() {
        tracing::warn!(
            "PUBLIC_BASE_URL '{}' is a loopback address; {} cannot fetch uploaded images from it",
            config.public_base_url,
            ProviderKind::Replicate.label()
        );
    }

    let state = Arc::new(api::AppState::new(config));
    state
        .orchestrator
        .store()
        .ensure_dirs()
        .await
        .expect("Failed to create upload/generated directories");

    let host_str = state.config.api_host.clone();
    let ip: std::net::IpAddr = host_str.parse().unwrap_or_else(|_| {
        tracing::warn!("Invalid API_HOST '{}', falling back to 127.0.0.1", host_str);
        std::net::IpAddr::from([127, 0, 0, 1])
    });
    let socket_address = SocketAddr::new(ip, state.config.api_port);

    let app = api::router(state);

    tracing::info!("listening on {}", socket_address);
    axum::Server::bind(&socket_address)
        .serve(app.into_make_service())
        .await
        .unwrap();
}
