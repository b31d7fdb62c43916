use crate::error::{AppError, Result};
use crate::model::{ShortenRequest, ShortenResponse};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use snip_core::{ExpirationPolicy, ShortCode, ShortenParams};

pub async fn shorten_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ShortenResponse>)> {
    let Json(request) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    if request.url.trim().is_empty() {
        return Err(AppError::BadRequest("url is required".to_string()));
    }

    let base = state
        .public_base(&headers)
        .ok_or_else(|| AppError::BadRequest("missing Host header".to_string()))?;

    let expiration = match request.expire_at {
        Some(expire_at) => ExpirationPolicy::AtTimestamp(expire_at),
        None => ExpirationPolicy::Never,
    };
    let params = ShortenParams::new(request.url).with_expiration(expiration);
    let code = state.shortener().shorten(params).await?;

    Ok((
        StatusCode::CREATED,
        Json(ShortenResponse {
            short_url: code.to_url(&base),
        }),
    ))
}

pub async fn redirect_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response> {
    let code = ShortCode::new(code).map_err(|_| AppError::NotFound)?;
    let original_url = state.shortener().resolve(&code).await?;

    Ok((
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, original_url)],
    )
        .into_response())
}

pub async fn not_found_handler() -> AppError {
    AppError::NotFound
}
