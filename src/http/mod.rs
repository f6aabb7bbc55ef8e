//! HTTP transport: maps REST routes onto mediator requests.
//!
//! Requires the `http` feature. Uses axum for routing.
//!
//! ## Routes
//!
//! - `POST /api/prescriptions` - create, 201 with the stored record.
//! - `GET /api/prescriptions/:id` - fetch one, 404 when absent.
//! - `GET /api/prescriptions/patient/:patient_id` - `{ items, total }`, newest first.
//! - `POST /api/prescriptions/suggest` - LLM suggestion or fallback, always 200.
//! - `POST /api/prescriptions/train` - retrain the diagnosis classifier.
//! - `GET /health` - static service description.
//!
//! Malformed bodies and path ids are rejected with 422 before any handler
//! runs. Every 5xx response carries the same generic body; the detail only
//! goes to the log.

mod error;
mod extract;
mod routes;
mod session;

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use crate::config::Settings;
use crate::mediator::Mediator;

pub use error::{ApiError, INTERNAL_ERROR_DETAIL};
pub use extract::ValidJson;
pub use session::{Session, CORRELATION_ID_HEADER};

/// Shared state for route handlers.
#[derive(Clone)]
pub struct AppState {
    pub mediator: Mediator,
    pub settings: Arc<Settings>,
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/prescriptions", post(routes::create_prescription))
        .route("/api/prescriptions/suggest", post(routes::suggest_prescription))
        .route("/api/prescriptions/train", post(routes::train_model))
        .route(
            "/api/prescriptions/patient/:patient_id",
            get(routes::get_prescriptions_by_patient),
        )
        .route("/api/prescriptions/:id", get(routes::get_prescription))
        .fallback(routes::not_found)
        .with_state(state)
}

/// Serve `app` on `listener` until `shutdown` resolves, then drain
/// in-flight requests.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
