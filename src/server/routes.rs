//! Request handlers. Each one is a thin mapping between JSON and a runner or
//! injector operation.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use super::AppState;
use super::error::ApiError;
use crate::config::ScreenSize;
use crate::executor::actions;
use crate::executor::sequence::default_on_null;
use crate::executor::{ActionKind, Delay, RunStatus, Sequence, StepParams};

#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

fn message(text: impl Into<String>) -> Json<MessageBody> {
    Json(MessageBody {
        message: text.into(),
    })
}

/// Body of `/automation/action`.
#[derive(Debug, Default, Deserialize)]
struct ActionRequest {
    #[serde(default)]
    action: Option<ActionKind>,
    #[serde(default)]
    delay: Delay,
    #[serde(default, deserialize_with = "default_on_null")]
    params: StepParams,
}

/// Body of the fixed-kind shortcuts (`/automation/paste` etc).
#[derive(Debug, Default, Deserialize)]
struct DelayRequest {
    #[serde(default)]
    delay: Delay,
}

#[derive(Debug, Serialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// Parse a JSON body. `None` for an empty body, `null`, or `{}`.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<Option<T>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let value: Value =
        serde_json::from_slice(body).map_err(|err| ApiError::BadRequest(err.to_string()))?;
    match &value {
        Value::Null => return Ok(None),
        Value::Object(map) if map.is_empty() => return Ok(None),
        _ => {}
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|err| ApiError::BadRequest(err.to_string()))
}

fn parse_body_or_default<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    Ok(parse_body(body)?.unwrap_or_default())
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "message": "Keypilot input backend is running",
    }))
}

pub async fn status(State(state): State<AppState>) -> Json<RunStatus> {
    Json(state.runner.status())
}

pub async fn start(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageBody>, ApiError> {
    let sequence: Sequence =
        parse_body(&body)?.ok_or(ApiError::MissingField("No configuration provided"))?;
    state.runner.submit(sequence)?;
    Ok(message("Automation started successfully"))
}

pub async fn stop(State(state): State<AppState>) -> Json<MessageBody> {
    state.runner.cancel().await;
    message("Automation stopped successfully")
}

pub async fn action(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageBody>, ApiError> {
    let request: ActionRequest = parse_body_or_default(&body)?;
    let kind = match request.action {
        Some(ActionKind::Unknown(name)) if name.is_empty() => None,
        other => other,
    }
    .ok_or(ApiError::MissingField("No action specified"))?;

    state
        .runner
        .execute_single(&kind, &request.params, request.delay)
        .await?;
    Ok(message(format!("Action {kind} executed successfully")))
}

async fn shortcut(
    state: &AppState,
    body: &Bytes,
    kind: ActionKind,
    done: &'static str,
) -> Result<Json<MessageBody>, ApiError> {
    let request: DelayRequest = parse_body_or_default(body)?;
    state
        .runner
        .execute_single(&kind, &StepParams::default(), request.delay)
        .await?;
    Ok(message(done))
}

pub async fn paste(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageBody>, ApiError> {
    shortcut(&state, &body, ActionKind::Paste, "Paste action executed").await
}

pub async fn send(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageBody>, ApiError> {
    shortcut(&state, &body, ActionKind::SendMessage, "Send action executed").await
}

pub async fn close(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageBody>, ApiError> {
    shortcut(&state, &body, ActionKind::CloseTab, "Close action executed").await
}

pub async fn mouse_position(State(state): State<AppState>) -> Result<Json<Position>, ApiError> {
    let (x, y) = actions::blocking(state.runner.injector(), |inj| inj.pointer_position()).await?;
    Ok(Json(Position { x, y }))
}

pub async fn screen_size(State(state): State<AppState>) -> Result<Json<ScreenSize>, ApiError> {
    let (width, height) =
        actions::blocking(state.runner.injector(), |inj| inj.screen_size()).await?;
    info!(target: "keypilot::server", width, height, "Screen size requested");
    Ok(Json(ScreenSize { width, height }))
}
