use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    core::{
        report::{build_report, dashboard_stats},
        store::AnalyticsStore,
    },
    models::{
        envelope::{AnalyticsData, DataResponse, MessageResponse, RecordRequest},
        error::{ApiError, ApiResult},
        input::{NewRecord, RecordKind},
        records::Snapshot,
    },
};

#[derive(Clone)]
pub struct AnalyticsState {
    pub store: Arc<AnalyticsStore>,
}

/// Reads never fail the request: an unreadable document is served as empty.
async fn load_or_empty(store: &AnalyticsStore) -> Snapshot {
    match store.load().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Failed to read analytics document, serving empty data: {}", e);
            Snapshot::empty(Utc::now())
        },
    }
}

pub async fn get_analytics(State(state): State<AnalyticsState>) -> ApiResult<impl IntoResponse> {
    let snapshot = load_or_empty(&state.store).await;
    let stats = dashboard_stats(&snapshot, Utc::now());

    let data = AnalyticsData {
        visitors: snapshot.visitors,
        chat_messages: snapshot.chat_messages,
        sessions: snapshot.sessions,
        stats,
    };

    Ok(Json(DataResponse::new(data)))
}

pub async fn get_report(State(state): State<AnalyticsState>) -> ApiResult<impl IntoResponse> {
    let snapshot = load_or_empty(&state.store).await;
    let report = build_report(&snapshot, Utc::now());

    Ok(Json(DataResponse::new(report)))
}

pub async fn record(
    State(state): State<AnalyticsState>,
    payload: Result<Json<RecordRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let kind = request
        .kind
        .as_deref()
        .and_then(RecordKind::parse)
        .ok_or_else(|| ApiError::UnsupportedOperation("Invalid data type".to_string()))?;

    let record = NewRecord::parse(kind, request.data)?;

    state
        .store
        .record(record)
        .await
        .map_err(|e| ApiError::storage("Failed to save data", e))?;

    info!("Saved {} record", kind);
    Ok(Json(MessageResponse::new("Data saved successfully")))
}

pub async fn clear(State(state): State<AnalyticsState>) -> ApiResult<impl IntoResponse> {
    state
        .store
        .clear()
        .await
        .map_err(|e| ApiError::storage("Failed to clear data", e))?;

    Ok(Json(MessageResponse::new("Data cleared successfully")))
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
