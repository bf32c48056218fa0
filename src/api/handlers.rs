use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::alerts::{AlertRule, ChannelOutcome, Dispatcher};
use crate::stats::{DeliveryStats, StatsSnapshot};
use crate::store::{MemoryRuleStore, NewRule, RuleStore, StoreError};

/// Application state shared across handlers
pub struct AppState {
    pub store: Arc<MemoryRuleStore>,
    pub stats: Arc<DeliveryStats>,
    pub dispatcher: Arc<Dispatcher>,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Stats
// ============================================================================

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}

// ============================================================================
// Rules
// ============================================================================

#[derive(Deserialize)]
pub struct ListParams {
    /// Include deactivated rules
    #[serde(default)]
    pub all: bool,
}

#[derive(Serialize)]
pub struct RulesResponse {
    pub rules: Vec<AlertRule>,
}

pub async fn list_rules(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<RulesResponse>, ApiError> {
    let rules = if params.all {
        state.store.list()
    } else {
        state.store.list_active_rules().await?
    };

    Ok(Json(RulesResponse { rules }))
}

#[derive(Serialize)]
pub struct CreateRuleResponse {
    pub success: bool,
    pub id: u64,
    pub rule: AlertRule,
}

pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewRule>, JsonRejection>,
) -> Result<Json<CreateRuleResponse>, ApiError> {
    let Json(request) = payload?;
    let rule = state.store.create(request)?;

    // Confirmation is best effort and must not delay the response
    let dispatcher = Arc::clone(&state.dispatcher);
    let confirm = rule.clone();
    tokio::spawn(async move {
        if let Some(outcome) = dispatcher.send_confirmation(&confirm).await {
            if !outcome.success {
                tracing::warn!(
                    rule_id = confirm.id,
                    error = outcome.error.as_deref().unwrap_or("-"),
                    "Confirmation e-mail could not be sent"
                );
            }
        }
    });

    Ok(Json(CreateRuleResponse {
        success: true,
        id: rule.id,
        rule,
    }))
}

pub async fn deactivate_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.store.deactivate(id)?;

    Ok(Json(serde_json::json!({ "success": true, "deactivated": id })))
}

#[derive(Serialize)]
pub struct TestResponse {
    pub rule_id: u64,
    pub outcomes: Vec<ChannelOutcome>,
}

pub async fn test_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<TestResponse>, ApiError> {
    let rule = state
        .store
        .get(id)
        .ok_or_else(|| ApiError::NotFound(format!("Rule {} not found", id)))?;

    let outcomes = state.dispatcher.send_test(&rule).await;

    Ok(Json(TestResponse {
        rule_id: id,
        outcomes,
    }))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let message = e.to_string();
        match e {
            StoreError::NotFound(_) => ApiError::NotFound(message),
            StoreError::Invalid(_) => ApiError::BadRequest(message),
            _ => ApiError::Internal(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "success": false,
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
