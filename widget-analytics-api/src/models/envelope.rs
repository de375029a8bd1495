//! The `{ success, ... }` envelopes every `/analytics` response is wrapped in.

use serde::{Deserialize, Serialize};

use crate::core::report::DashboardStats;
use crate::models::records::{ChatMessage, Session, Visitor};

#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Body of `GET /analytics`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsData {
    pub visitors: Vec<Visitor>,
    pub chat_messages: Vec<ChatMessage>,
    pub sessions: Vec<Session>,
    pub stats: DashboardStats,
}

/// Body of `POST /analytics`.
#[derive(Debug, Deserialize)]
pub struct RecordRequest {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}
