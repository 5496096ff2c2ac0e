//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/analyze` | Multipart upload (`image` field) → description + products |
//! | `POST` | `/chat` | `{"message": ...}` → `{"reply": ...}` |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/*` | Static files from `[server].static_dir`, if configured |
//!
//! # Error Contract
//!
//! `/analyze` and `/chat` always answer `200 OK`. Failures are reported in
//! the body: `/analyze` sets `status` to `degraded` or `failed` with an
//! explanatory `description`, `/chat` replies `"Something went wrong."`.
//! A handler that panics is answered the same way.
//!
//! ```json
//! { "description": "ERROR: No image file part in the request.", "links": [],
//!   "status": "failed", "reason": "missing_image" }
//! ```
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the upload page can be
//! served from anywhere.

use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::chat::{self, ChatReply, ChatRequest};
use crate::config::ServerConfig;
use crate::models::{AnalysisRequest, AnalysisResponse, Reason};
use crate::pipeline::{panic_message, Pipeline};

/// Name of the multipart field carrying the uploaded image.
pub const IMAGE_FIELD: &str = "image";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Starts the HTTP server on `[server].bind` and runs until the process is
/// terminated.
pub async fn run_server(config: &ServerConfig, pipeline: Pipeline) -> anyhow::Result<()> {
    let app = build_router(config, pipeline);

    println!("Outfit finder listening on http://{}", config.bind);
    info!(bind = %config.bind, "server starting");

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the router with all routes and layers. Exposed for tests and for
/// embedding the service in another binary.
pub fn build_router(config: &ServerConfig, pipeline: Pipeline) -> Router {
    let state = AppState {
        pipeline: Arc::new(pipeline),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .route(
            "/analyze",
            post(handle_analyze).layer(CatchPanicLayer::custom(analyze_panic)),
        )
        .route(
            "/chat",
            post(handle_chat).layer(CatchPanicLayer::custom(chat_panic)),
        )
        .route("/health", get(handle_health));

    if let Some(dir) = &config.static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /analyze ============

/// Handler for `POST /analyze`.
///
/// A body that is not multipart, lacks the `image` field, or cannot be read
/// is answered with an `ERROR: ...` description instead of a 4xx. An upload
/// counts as "No selected file." when its content is zero bytes; the client
/// filename is not checked and may be empty.
async fn handle_analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Json<AnalysisResponse> {
    let multipart = match multipart {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "rejected analyze body");
            return Json(AnalysisResponse::failed(
                "No image file part in the request.",
                Reason::MissingImage,
            ));
        }
    };

    match read_image_field(multipart).await {
        Ok(Some(request)) => Json(state.pipeline.analyze(request).await),
        Ok(None) => {
            warn!("no image field in analyze request");
            Json(AnalysisResponse::failed(
                "No image file part in the request.",
                Reason::MissingImage,
            ))
        }
        Err(message) => {
            warn!(error = %message, "could not read analyze upload");
            Json(AnalysisResponse::failed(message, Reason::MissingImage))
        }
    }
}

/// Returns the first `image` field, skipping any other fields.
async fn read_image_field(mut multipart: Multipart) -> Result<Option<AnalysisRequest>, String> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Could not read the upload: {}", e))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(|c| c.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| format!("Could not read the upload: {}", e))?;

        if bytes.is_empty() {
            return Err("No selected file.".to_string());
        }

        let mut request = AnalysisRequest::new(bytes.to_vec(), filename);
        if let Some(ct) = content_type {
            request = request.with_content_type(ct);
        }
        return Ok(Some(request));
    }
    Ok(None)
}

fn analyze_panic(payload: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let message = panic_message(payload.as_ref());
    error!(panic = %message, "analyze handler panicked");
    Json(AnalysisResponse::failed(
        format_args!("An unexpected error occurred: panic: {}", message),
        Reason::Internal,
    ))
    .into_response()
}

// ============ POST /chat ============

async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Json<ChatReply> {
    match body {
        Ok(Json(request)) => {
            let model = state.pipeline.describer().model();
            Json(chat::reply(model.as_ref(), &request.message).await)
        }
        Err(e) => {
            warn!(error = %e, "rejected chat body");
            Json(ChatReply {
                reply: chat::FAILURE_REPLY.to_string(),
            })
        }
    }
}

fn chat_panic(payload: Box<dyn std::any::Any + Send + 'static>) -> Response {
    error!(panic = %panic_message(payload.as_ref()), "chat handler panicked");
    Json(ChatReply {
        reply: chat::FAILURE_REPLY.to_string(),
    })
    .into_response()
}
