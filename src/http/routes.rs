use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health and status
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::get_status))
        // Conversation
        .route(
            "/conversation/messages",
            get(handlers::list_messages).post(handlers::receive_message),
        )
        .route(
            "/conversation/composing",
            get(handlers::get_composing).delete(handlers::clear_composing),
        )
        .route("/conversation/composing/text", put(handlers::set_text))
        .route(
            "/conversation/composing/image",
            post(handlers::attach_image).delete(handlers::detach_image),
        )
        .route("/conversation/composing/voice", delete(handlers::detach_voice))
        .route("/conversation/send", post(handlers::send_message))
        // Recording control
        .route("/recording/start", post(handlers::start_recording))
        .route("/recording/stop", post(handlers::stop_recording))
        .route("/recording/toggle", post(handlers::toggle_recording))
        // Playback control
        .route("/playback", post(handlers::play))
        .route("/playback/stop", post(handlers::stop_playback))
        // Speech control
        .route("/speech", post(handlers::speak))
        .route("/speech/stop", post(handlers::stop_speech))
        // Request logging, and CORS for the companion app's web view
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
