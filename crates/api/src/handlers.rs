use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
};
use extract::EntityMap;
use query::{DEFAULT_USER_ID, Turn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::cache::CacheStats;
use crate::error::ApiError;
use crate::metrics::{MetricsSnapshot, TimedOperation};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptResponse {
    pub response: String,
    pub relevance_score: f32,
    pub entities: EntityMap,
}

#[derive(Debug, Deserialize)]
pub struct ChatbotRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatbotResponse {
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub corpus_bytes: usize,
    pub conversations: usize,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub requests: MetricsSnapshot,
    pub cache: CacheStats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub user_id: String,
    pub turns: Vec<Turn>,
}

/// The body is parsed as JSON whatever the content type says.
pub async fn prompt_view(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<PromptResponse>, ApiError> {
    let timer = TimedOperation::start();

    let req: PromptRequest = serde_json::from_slice(&body).map_err(|e| {
        state.metrics.record_failure();
        ApiError::Internal(format!("An error occurred: {}", e))
    })?;

    let user_id = req.user_id.unwrap_or_else(|| DEFAULT_USER_ID.to_string());
    let prompt = req.prompt.unwrap_or_default();

    let result = match state.orchestrator.handle(&user_id, &prompt).await {
        Ok(result) => result,
        Err(e) => {
            state.metrics.record_rejected();
            return Err(e.into());
        }
    };

    state.metrics.record_response(
        timer.elapsed(),
        result.generation_time,
        result.relevance.is_relevant,
        result.source,
    );

    Ok(Json(PromptResponse {
        response: result.response,
        relevance_score: result.relevance.score,
        entities: result.entities,
    }))
}

pub async fn prompt_method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed("Invalid request method.".to_string())
}

pub async fn chatbot(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ChatbotResponse>, ApiError> {
    let req: ChatbotRequest =
        serde_json::from_slice(&body).map_err(|e| ApiError::Internal(e.to_string()))?;

    let message = req.message.unwrap_or_default();
    if message.is_empty() {
        return Err(ApiError::Internal("message is required".to_string()));
    }

    state.metrics.record_intent();

    let result = state.intents.detect(&message).await.map_err(|e| {
        warn!(error = %e, "intent detection failed");
        ApiError::Internal(e.to_string())
    })?;

    Ok(Json(ChatbotResponse {
        reply: result.fulfillment_text,
    }))
}

pub async fn chatbot_method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed("Invalid request method".to_string())
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        corpus_bytes: state.orchestrator.knowledge().len(),
        conversations: state.orchestrator.conversations().len(),
    })
}

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        requests: state.metrics.snapshot(),
        cache: state.cache.stats(),
    })
}

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<HistoryResponse> {
    let turns = state.orchestrator.conversations().history(&user_id).await;
    Json(HistoryResponse { user_id, turns })
}
