//! # dropnote-api
//!
//! HTTP service for DropNote: router, handlers, error mapping, the write
//! quota and the ambient middleware stack. The `dropnote-api` binary wires
//! this to PostgreSQL; tests drive [`app`] over an in-memory repository.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod openapi;
pub mod rate_limit;
pub mod seed;
pub mod telemetry;

use std::any::Any;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{from_fn_with_state, map_response};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any as AnyOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use dropnote_core::defaults::REQUEST_BODY_LIMIT;
use dropnote_core::logging::SUBSYSTEM;
use dropnote_core::{NoteRepository, Result};

use crate::config::{AllowedOrigins, AppConfig};
use crate::error::ErrorBody;
use crate::extract::BODY_TOO_LARGE;
use crate::handlers::{notes, system, tags};
use crate::rate_limit::{write_quota, WriteQuota};
use crate::telemetry::{MakeRequestUuidV7, RequestSpan};

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub notes: Arc<dyn NoteRepository>,
    /// Total note cap enforced on create.
    pub max_notes: i64,
    /// `None` disables the write quota.
    pub write_quota: Option<Arc<WriteQuota>>,
}

impl AppState {
    pub fn new(
        notes: Arc<dyn NoteRepository>,
        max_notes: i64,
        write_quota: Option<WriteQuota>,
    ) -> Self {
        Self {
            notes,
            max_notes,
            write_quota: write_quota.map(Arc::new),
        }
    }

    pub fn from_config(notes: Arc<dyn NoteRepository>, config: &AppConfig) -> Result<Self> {
        let quota = if config.rate_limit_enabled {
            Some(WriteQuota::per_day(
                config.write_limit_per_day,
                config.trust_forwarded_for,
            )?)
        } else {
            None
        };
        Ok(Self::new(notes, config.max_notes, quota))
    }
}

/// Routes without the middleware stack.
///
/// Create, update and delete sit behind the write quota; reads and batch
/// fetch do not.
pub fn router(state: AppState) -> Router {
    let quota = || from_fn_with_state(state.clone(), write_quota);

    Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health_check))
        .route("/api-docs/openapi.json", get(system::openapi_json))
        .route(
            "/api/notes",
            get(notes::list_notes).merge(post(notes::create_note).route_layer(quota())),
        )
        .route("/api/notes/random", get(notes::random_note))
        .route("/api/notes/batch", post(notes::batch_notes))
        .route(
            "/api/notes/:id",
            get(notes::get_note).merge(
                axum::routing::put(notes::update_note)
                    .delete(notes::delete_note)
                    .route_layer(quota()),
            ),
        )
        .route("/api/tags", get(tags::list_tags))
        .fallback(system::not_found)
        .with_state(state)
}

/// CORS policy for the configured origins. Unparsable origins are skipped.
pub fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600));

    match origins {
        AllowedOrigins::Any => layer.allow_origin(AnyOrigin),
        AllowedOrigins::List(list) => {
            let parsed: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!({ SUBSYSTEM } = "api", origin = %origin, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            layer.allow_origin(AllowOrigin::list(parsed))
        }
    }
}

/// Full application: routes plus tracing, request ids, CORS, body limit,
/// JSON error bodies and panic recovery.
pub fn app(state: AppState, origins: &AllowedOrigins) -> Router {
    router(state)
        .layer(TraceLayer::new_for_http().make_span_with(RequestSpan))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors_layer(origins))
        .layer(RequestBodyLimitLayer::new(REQUEST_BODY_LIMIT))
        .layer(map_response(json_error_bodies))
        .layer(CatchPanicLayer::custom(handle_panic))
}

/// Give error responses produced outside the handlers, such as the body
/// limit rejection or a method mismatch, the same JSON body as the rest.
async fn json_error_bodies(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return response;
    }

    let message = match status {
        StatusCode::PAYLOAD_TOO_LARGE => BODY_TOO_LARGE,
        StatusCode::METHOD_NOT_ALLOWED => "Method not allowed",
        StatusCode::NOT_FOUND => "Not found",
        other => other.canonical_reason().unwrap_or("Request failed"),
    };
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_TYPE);
    parts.headers.remove(header::CONTENT_LENGTH);
    (
        parts,
        Json(ErrorBody {
            error: message.to_string(),
            details: None,
        }),
    )
        .into_response()
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    error!({ SUBSYSTEM } = "api", panic = %detail, "Handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: "An internal server error occurred.".to_string(),
            details: None,
        }),
    )
        .into_response()
}
