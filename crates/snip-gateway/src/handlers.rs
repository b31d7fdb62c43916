mod url;

pub use url::{not_found_handler, redirect_handler, shorten_handler};

use crate::model::HealthResponse;
use axum::Json;

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
