use super::state::AppState;
use crate::conversation::{MediaRef, Message, Sender};
use crate::error::SessionError;
use crate::session::{PlayOutcome, SessionHandle, SpeakOutcome, StopOutcome};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SetTextRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct AttachImageRequest {
    pub image_ref: String,
}

/// Message handed over by the transport
#[derive(Debug, Deserialize)]
pub struct ReceiveMessageRequest {
    /// Defaults to the assistant
    pub sender: Option<Sender>,
    pub text: Option<String>,
    pub image_ref: Option<String>,
    pub voice_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    pub voice_ref: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StopPlaybackRequest {
    /// Stop only this playback; omit to stop whatever is playing
    #[serde(default)]
    pub handle: Option<SessionHandle>,
}

/// Either literal text or the id of a logged message to read aloud
#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    pub text: Option<String>,
    pub message_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct PlayResponse {
    pub status: String,
    pub handle: Option<SessionHandle>,
}

#[derive(Debug, Serialize)]
pub struct StopRecordingResponse {
    pub status: String,
    pub voice_ref: Option<MediaRef>,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Text suitable for a transient user-facing notice
    pub notice: Option<String>,
}

fn command(status: &str) -> Response {
    (
        StatusCode::OK,
        Json(CommandResponse {
            status: status.to_string(),
        }),
    )
        .into_response()
}

fn error_response(err: SessionError) -> Response {
    let status = match &err {
        // Sending an empty draft is silently ignored
        SessionError::Empty => return StatusCode::NO_CONTENT.into_response(),
        SessionError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        SessionError::AlreadyActive(_) | SessionError::Busy(_) => StatusCode::CONFLICT,
        SessionError::ResourceFailure { .. } => StatusCode::BAD_GATEWAY,
        SessionError::NotFound(_) => StatusCode::NOT_FOUND,
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            notice: err.user_message(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /status
/// Snapshot of every session and the draft
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.coordinator.status().await)
}

/// GET /conversation/messages
pub async fn list_messages(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.coordinator.messages().await)
}

/// POST /conversation/messages
/// Append a message delivered by the transport
pub async fn receive_message(
    State(state): State<AppState>,
    Json(req): Json<ReceiveMessageRequest>,
) -> Response {
    let message = Message::new(
        req.sender.unwrap_or(Sender::Assistant),
        req.text,
        req.image_ref.map(MediaRef::from),
        req.voice_ref.map(MediaRef::from),
    );

    match message {
        Ok(message) => {
            state.coordinator.receive(message.clone()).await;
            (StatusCode::CREATED, Json(message)).into_response()
        }
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: e.to_string(),
                notice: None,
            }),
        )
            .into_response(),
    }
}

/// GET /conversation/composing
pub async fn get_composing(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.coordinator.composing().await)
}

/// PUT /conversation/composing/text
pub async fn set_text(
    State(state): State<AppState>,
    Json(req): Json<SetTextRequest>,
) -> impl IntoResponse {
    state.coordinator.set_text(req.text).await;
    Json(state.coordinator.composing().await)
}

/// POST /conversation/composing/image
pub async fn attach_image(
    State(state): State<AppState>,
    Json(req): Json<AttachImageRequest>,
) -> impl IntoResponse {
    state.coordinator.attach_image(MediaRef::from(req.image_ref)).await;
    Json(state.coordinator.composing().await)
}

/// DELETE /conversation/composing/image
pub async fn detach_image(State(state): State<AppState>) -> impl IntoResponse {
    state.coordinator.detach_image().await;
    Json(state.coordinator.composing().await)
}

/// DELETE /conversation/composing/voice
pub async fn detach_voice(State(state): State<AppState>) -> impl IntoResponse {
    state.coordinator.detach_voice().await;
    Json(state.coordinator.composing().await)
}

/// DELETE /conversation/composing
pub async fn clear_composing(State(state): State<AppState>) -> impl IntoResponse {
    state.coordinator.clear_composing().await;
    Json(state.coordinator.composing().await)
}

/// POST /conversation/send
/// Flush the draft; an empty draft yields 204 and changes nothing
pub async fn send_message(State(state): State<AppState>) -> Response {
    match state.coordinator.try_send().await {
        Ok(message) => (StatusCode::CREATED, Json(message)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /recording/start
pub async fn start_recording(State(state): State<AppState>) -> Response {
    info!("Start recording requested");
    match state.coordinator.start_recording().await {
        Ok(()) => command("recording"),
        Err(e) => error_response(e),
    }
}

/// POST /recording/stop
pub async fn stop_recording(State(state): State<AppState>) -> Response {
    info!("Stop recording requested");
    match state.coordinator.stop_recording().await {
        Ok(StopOutcome::Finalized(voice_ref)) => (
            StatusCode::OK,
            Json(StopRecordingResponse {
                status: "finalized".to_string(),
                voice_ref: Some(voice_ref),
            }),
        )
            .into_response(),
        Ok(StopOutcome::AlreadyFinalizing) => command("finalizing"),
        Ok(StopOutcome::NotRecording) => command("idle"),
        Err(e) => error_response(e),
    }
}

/// POST /recording/toggle
pub async fn toggle_recording(State(state): State<AppState>) -> Response {
    match state.coordinator.toggle_recording().await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /playback
/// Play a voice note, or stop it if it is already playing
pub async fn play(State(state): State<AppState>, Json(req): Json<PlayRequest>) -> Response {
    match state.coordinator.play(MediaRef::from(req.voice_ref)).await {
        Ok(PlayOutcome::Started(handle)) => (
            StatusCode::OK,
            Json(PlayResponse {
                status: "playing".to_string(),
                handle: Some(handle),
            }),
        )
            .into_response(),
        Ok(PlayOutcome::Stopped) => (
            StatusCode::OK,
            Json(PlayResponse {
                status: "stopped".to_string(),
                handle: None,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /playback/stop
pub async fn stop_playback(
    State(state): State<AppState>,
    Json(req): Json<StopPlaybackRequest>,
) -> Response {
    match state.coordinator.stop_playback(req.handle.as_ref()).await {
        Ok(true) => command("stopped"),
        Ok(false) => command("idle"),
        Err(e) => error_response(e),
    }
}

/// POST /speech
/// Read text or a logged message aloud; repeating the request stops it
pub async fn speak(State(state): State<AppState>, Json(req): Json<SpeakRequest>) -> Response {
    let result = match (req.message_id, req.text) {
        (Some(id), _) => state.coordinator.speak_message(id).await,
        (None, Some(text)) => state.coordinator.speak(&text).await,
        (None, None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Either text or message_id is required".to_string(),
                    notice: None,
                }),
            )
                .into_response()
        }
    };

    match result {
        Ok(SpeakOutcome::Started) => command("speaking"),
        Ok(SpeakOutcome::Stopped) => command("stopped"),
        Err(e) => error_response(e),
    }
}

/// POST /speech/stop
pub async fn stop_speech(State(state): State<AppState>) -> Response {
    match state.coordinator.stop_speech().await {
        Ok(true) => command("stopped"),
        Ok(false) => command("idle"),
        Err(e) => error_response(e),
    }
}
