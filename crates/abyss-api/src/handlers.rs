//! API Handlers
use std::sync::Arc;

use abyss_core::{ActionResult, Identity, MemoryCollaborator, OutboundMessage, ABYSS_VERSION};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    /// Snippet, template or throwex message
    #[serde(default)]
    pub source: String,
    /// Who invokes the command; an anonymous identity when missing
    #[serde(default)]
    pub invoker: Option<Identity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub result: ActionResult,
    /// Everything sent during the run, in send order
    pub replies: Vec<OutboundMessage>,
}

pub async fn eval(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> (StatusCode, Json<CommandResponse>) {
    run_command(&state, "eval", request).await
}

pub async fn inspect(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> (StatusCode, Json<CommandResponse>) {
    run_command(&state, "inspect", request).await
}

pub async fn hb(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> (StatusCode, Json<CommandResponse>) {
    run_command(&state, "hb", request).await
}

pub async fn throwex(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> (StatusCode, Json<CommandResponse>) {
    run_command(&state, "throwex", request).await
}

async fn run_command(
    state: &AppState,
    command: &str,
    request: CommandRequest,
) -> (StatusCode, Json<CommandResponse>) {
    let collaborator = Arc::new(
        MemoryCollaborator::new(state.bot.clone()).with_accent(state.accent),
    );
    let invoker = request
        .invoker
        .unwrap_or_else(|| Identity::new(0, "anonymous"));
    let ctx = Arc::new(collaborator.context_for(invoker));

    let result = state.commands.run(command, &request.source, ctx).await;
    let replies = collaborator.drain();

    let (status, label) = match &result {
        ActionResult::Ok(_) => (StatusCode::OK, "ok"),
        ActionResult::Empty => (StatusCode::OK, "empty"),
        ActionResult::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
    };
    state.metrics.record(command, label, replies.len());

    (status, Json(CommandResponse { result, replies }))
}

pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "version": ABYSS_VERSION })),
    )
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        ),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                err.to_string(),
            )
        }
    }
}
