// School Ideas Server

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use school_ideas::{api::create_router, app_state::AppState, config::Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("school_ideas=info,tower_http=info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.prepare_database_dir()?;

    // Initialize application state
    let app_state = AppState::new(config.clone()).await?;
    let app = create_router(app_state);

    // Start server
    let addr: SocketAddr = config.server_address().parse()?;
    info!("School ideas server starting on http://{}", addr);
    info!("  GET    /api/v1/health");
    info!("  GET    /api/v1/ideas?category=&status=&sort=recent|popular|comments");
    info!("  POST   /api/v1/ideas/{{id}}/teacher-review");
    info!("  POST   /api/v1/ideas/{{id}}/principal-decision");
    info!("  POST   /api/v1/ideas/{{id}}/votes");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
