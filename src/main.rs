// src/main.rs
use kinder_records::{app, config::Config, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Invalid configuration, check .env");
    let addr = config.bind_addr;
    tracing::info!("上游记录服务: {}", config.api_base_url);

    let state = AppState::new(config).expect("Failed to build the upstream client");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listen address");
    tracing::info!("🚀 服务器运行在: {}", addr);

    axum::serve(listener, app(state))
        .await
        .expect("Server error");
}
