//! Local build service
//!
//! Serves `POST /api/contracts/compile` and the WebSocket stream at
//! `/api/contracts/compile/stream` on top of a [`Compiler`].

mod error;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use color_eyre::eyre::{Result, WrapErr};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub use routes::create_router;
pub use state::AppState;

use crate::forge::Compiler;

/// Server configuration
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Start the build service and serve until the process ends
pub async fn run_server(compiler: Arc<dyn Compiler>, config: ServerConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .wrap_err("Invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("Could not bind {}", addr))?;

    info!(%addr, "build service listening");
    serve(listener, compiler).await
}

/// Serve on an already bound listener
pub async fn serve(listener: tokio::net::TcpListener, compiler: Arc<dyn Compiler>) -> Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(compiler)).layer(cors);
    axum::serve(listener, app).await?;

    Ok(())
}
