use std::net::SocketAddr;

use opportunity_board::{
    config::{get_config, init_config},
    database::pool::{create_pool, run_migrations},
    AppState,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    run_migrations(&pool).await?;

    let state = AppState::new(pool)?;

    info!("Serving uploads from: {}", config.uploads_dir);
    let app = opportunity_board::app(state)
        .nest_service("/uploads", ServeDir::new(config.uploads_dir.clone()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
