use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::HttpServerConfig;
use crate::error::{AskragError, Result};
use crate::memory::ConversationMemory;
use crate::router::{AnswerRouter, AskResult};
use crate::session::{IngestReport, KnowledgeBase};
use crate::sources::Retriever;

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Check if a port is available by attempting to bind to it
async fn check_port_available(port: u16) -> bool {
    tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .is_ok()
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<AnswerRouter>,
    pub knowledge: Arc<KnowledgeBase>,
    pub memory: Arc<ConversationMemory>,
}

pub struct HttpServer {
    state: AppState,
    config: HttpServerConfig,
}

impl HttpServer {
    pub fn new(state: AppState, config: HttpServerConfig) -> Self {
        Self { state, config }
    }

    pub async fn run(self) -> Result<()> {
        let port = self.config.port;
        let addr = format!("127.0.0.1:{}", port);

        if !check_port_available(port).await {
            return Err(AskragError::Config(format!(
                "Port {} is already in use. Stop the other process or set http_server.port in config.toml",
                port
            )));
        }

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        log::info!("Listening on http://{}", addr);

        let app = create_router(self.state, &self.config.allowed_origins);
        axum::serve(listener, app).await.map_err(|e| {
            AskragError::Io(std::io::Error::other(format!("HTTP server error: {}", e)))
        })?;

        Ok(())
    }
}

/// Build the axum router with CORS and request tracing.
///
/// An empty `allowed_origins` list allows any origin.
pub fn create_router(state: AppState, allowed_origins: &[String]) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);
    let cors = if allowed_origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
    };

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/ask", post(handle_ask))
        .route("/ingest", post(handle_ingest))
        .route("/history", get(handle_history))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Error response body: `{"error": "..."}`.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<AskragError> for ApiError {
    fn from(err: AskragError) -> Self {
        let status = match &err {
            AskragError::UnsupportedDocumentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AskragError::InvalidInput(_) | AskragError::Parse(_) => StatusCode::BAD_REQUEST,
            AskragError::Embedding(_) | AskragError::Timeout { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            log::error!("{}", self.message);
        }
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "message": "Knowledge assistant backend is running",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> std::result::Result<Json<AskResult>, ApiError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::bad_request("question must not be empty"));
    }

    let retriever = state.knowledge.retriever().await;
    let result = state
        .router
        .ask(question, retriever.as_deref().map(|r| r as &dyn Retriever))
        .await;

    state.memory.add(question, result.answer.clone());
    Ok(Json(result))
}

async fn handle_ingest(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> std::result::Result<Json<IngestReport>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("file field has no filename"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;

        let report = state.knowledge.ingest_upload(&filename, &bytes).await?;
        return Ok(Json(report));
    }

    Err(ApiError::bad_request("multipart field 'file' is required"))
}

async fn handle_history(State(state): State<AppState>) -> Response {
    Json(serde_json::json!({
        "capacity": state.memory.capacity(),
        "exchanges": state.memory.entries(),
        "context": state.memory.context(),
    }))
    .into_response()
}
