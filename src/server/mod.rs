/*!
HTTP transport for Keypilot.

Exposes the `SequenceRunner` and the input injector to the browser frontend:

- `GET  /health`
- `GET  /automation/status`
- `POST /automation/start`, `/automation/stop`, `/automation/action`
- `POST /automation/paste`, `/automation/send`, `/automation/close`
- `GET  /mouse/position`, `/screen/size`

Success bodies carry `{"message": ...}` (plus endpoint-specific fields), failures
carry `{"error": ...}`. CORS is open to any origin: the service is meant for a
trusted local operator.
*/

use axum::Router;
use axum::routing::{get, post};
use std::future::IntoFuture;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::executor::SequenceRunner;

pub mod error;
pub mod routes;

pub use error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub runner: SequenceRunner,
}

/// Build the application router around `runner`.
pub fn router(runner: SequenceRunner) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/automation/status", get(routes::status))
        .route("/automation/start", post(routes::start))
        .route("/automation/stop", post(routes::stop))
        .route("/automation/action", post(routes::action))
        .route("/automation/paste", post(routes::paste))
        .route("/automation/send", post(routes::send))
        .route("/automation/close", post(routes::close))
        .route("/mouse/position", get(routes::mouse_position))
        .route("/screen/size", get(routes::screen_size))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(AppState { runner })
}

/// Serve until Ctrl+C, then stop any running sequence.
pub async fn serve(listener: TcpListener, runner: SequenceRunner) -> anyhow::Result<()> {
    let app = router(runner.clone());

    tokio::select! {
        res = axum::serve(listener, app).into_future() => {
            if let Err(err) = res {
                error!(target: "keypilot::server", error = %err, "HTTP server terminated with error");
                return Err(err.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!(target: "keypilot::server", "Received Ctrl+C, shutting down");
        }
    }

    runner.cancel().await;
    Ok(())
}
