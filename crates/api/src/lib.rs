pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod state;

use axum::{
    Router,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::any::Any;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::error::ApiError;
use crate::handlers::{
    chatbot, chatbot_method_not_allowed, get_history, get_metrics, health_check,
    prompt_method_not_allowed, prompt_view,
};
pub use crate::state::{AppState, build_state};

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/prompt_view",
            post(prompt_view).fallback(prompt_method_not_allowed),
        )
        .route("/chatbot", post(chatbot).fallback(chatbot_method_not_allowed))
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        .route("/history/:user_id", get(get_history))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "request handler panicked");

    ApiError::Internal("An unexpected error occurred.".to_string()).into_response()
}
