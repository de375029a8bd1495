//! Persisted record types.
//!
//! Field names follow the widget's camelCase wire format so the stored
//! document stays readable by existing dashboards. Every body struct carries
//! container-level defaults, which lets documents written by older widget
//! versions load even when they lack newer fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Location {
    pub country: String,
    pub city: String,
    pub region: String,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            country: "unknown".to_string(),
            city: "unknown".to_string(),
            region: "unknown".to_string(),
        }
    }
}

/// Everything the widget reports about a visitor, minus the fields the
/// store assigns itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisitorProfile {
    pub session_id: String,
    pub device_type: String,
    pub os: String,
    pub browser: String,
    pub location: Location,
    pub traffic_source: String,
    pub page_views: u64,
    /// Milliseconds.
    pub session_duration: u64,
    pub is_active: bool,
    pub referrer: String,
    pub user_agent: String,
    pub ip_address: String,
    pub created_at: DateTime<Utc>,
}

impl Default for VisitorProfile {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            device_type: "unknown".to_string(),
            os: "unknown".to_string(),
            browser: "unknown".to_string(),
            location: Location::default(),
            traffic_source: "direct".to_string(),
            page_views: 1,
            session_duration: 0,
            is_active: true,
            referrer: String::new(),
            user_agent: String::new(),
            ip_address: String::new(),
            created_at: DateTime::<Utc>::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visitor {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub profile: VisitorProfile,
    #[serde(default)]
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    #[default]
    User,
    Agent,
}

impl Sender {
    /// Unknown senders are treated as the visitor.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "agent" => Sender::Agent,
            _ => Sender::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatMessageBody {
    pub session_id: String,
    pub sender: Sender,
    pub message: String,
    pub message_type: String,
    pub is_read: bool,
    pub sentiment: String,
    /// Seconds.
    pub response_time: f64,
}

impl Default for ChatMessageBody {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            sender: Sender::User,
            message: String::new(),
            message_type: "text".to_string(),
            is_read: false,
            sentiment: "neutral".to_string(),
            response_time: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub body: ChatMessageBody,
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Ended,
    Abandoned,
}

impl SessionStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(SessionStatus::Active),
            "ended" => Some(SessionStatus::Ended),
            "abandoned" => Some(SessionStatus::Abandoned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionBody {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: u64,
    pub page_views: u64,
    pub message_count: u64,
    pub status: SessionStatus,
    pub exit_page: String,
    pub conversion_goal: bool,
}

impl Default for SessionBody {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            start_time: DateTime::<Utc>::default(),
            end_time: None,
            duration: 0,
            page_views: 1,
            message_count: 0,
            status: SessionStatus::Active,
            exit_page: String::new(),
            conversion_goal: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub body: SessionBody,
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
}

/// The whole persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub visitors: Vec<Visitor>,
    #[serde(default)]
    pub chat_messages: Vec<ChatMessage>,
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub last_updated: DateTime<Utc>,
}

impl Snapshot {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            visitors: Vec::new(),
            chat_messages: Vec::new(),
            sessions: Vec::new(),
            last_updated: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.visitors.is_empty() && self.chat_messages.is_empty() && self.sessions.is_empty()
    }
}
