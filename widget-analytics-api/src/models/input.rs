//! Inbound payloads from the widget.
//!
//! A payload goes through three steps before it touches the store:
//! [`validate`] checks that the identifying keys are present on the raw JSON,
//! deserialization coerces each field leniently into an `Option`, and the
//! `sanitize` methods fill every remaining gap with its canonical default.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::models::records::{
    ChatMessageBody, Location, Sender, SessionBody, SessionStatus, VisitorProfile,
};
use crate::utils::lenient;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required {kind} fields: {}", .fields.join(", "))]
    MissingFields {
        kind: RecordKind,
        fields: Vec<&'static str>,
    },

    #[error("{kind} data must be a JSON object")]
    NotAnObject { kind: RecordKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Visitor,
    Message,
    Session,
}

impl RecordKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "visitor" => Some(RecordKind::Visitor),
            "message" => Some(RecordKind::Message),
            "session" => Some(RecordKind::Session),
            _ => None,
        }
    }

    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            RecordKind::Visitor => &["sessionId", "deviceType", "os", "browser"],
            RecordKind::Message => &["sessionId", "sender", "message"],
            RecordKind::Session => &["sessionId", "startTime"],
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecordKind::Visitor => "visitor",
            RecordKind::Message => "message",
            RecordKind::Session => "session",
        };
        f.write_str(name)
    }
}

/// Rejects payloads whose identifying keys are absent or null.
pub fn validate(kind: RecordKind, data: &Value) -> Result<(), ValidationError> {
    let object = data
        .as_object()
        .ok_or(ValidationError::NotAnObject { kind })?;

    let missing: Vec<&'static str> = kind
        .required_fields()
        .iter()
        .copied()
        .filter(|field| object.get(*field).is_none_or(Value::is_null))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingFields {
            kind,
            fields: missing,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInput {
    #[serde(default, deserialize_with = "lenient::string")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorInput {
    #[serde(default, deserialize_with = "lenient::string")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub device_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub os: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub browser: Option<String>,
    #[serde(default, deserialize_with = "location")]
    pub location: Option<LocationInput>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub traffic_source: Option<String>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub page_views: Option<u64>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub session_duration: Option<u64>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub referrer: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub user_agent: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub ip_address: Option<String>,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

fn location<'de, D>(deserializer: D) -> Result<Option<LocationInput>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(None);
    }
    LocationInput::deserialize(value)
        .map(Some)
        .map_err(serde::de::Error::custom)
}

impl VisitorInput {
    pub fn sanitize(self, now: DateTime<Utc>) -> VisitorProfile {
        let defaults = VisitorProfile::default();
        let location = self.location.unwrap_or_default();
        let default_location = Location::default();

        VisitorProfile {
            session_id: self.session_id.unwrap_or(defaults.session_id),
            device_type: self.device_type.unwrap_or(defaults.device_type),
            os: self.os.unwrap_or(defaults.os),
            browser: self.browser.unwrap_or(defaults.browser),
            location: Location {
                country: location.country.unwrap_or(default_location.country),
                city: location.city.unwrap_or(default_location.city),
                region: location.region.unwrap_or(default_location.region),
            },
            traffic_source: self.traffic_source.unwrap_or(defaults.traffic_source),
            page_views: self.page_views.unwrap_or(defaults.page_views),
            session_duration: self.session_duration.unwrap_or(defaults.session_duration),
            is_active: self.is_active.unwrap_or(defaults.is_active),
            referrer: self.referrer.unwrap_or(defaults.referrer),
            user_agent: self.user_agent.unwrap_or(defaults.user_agent),
            ip_address: self.ip_address.unwrap_or(defaults.ip_address),
            created_at: self.created_at.unwrap_or(now),
        }
    }

    /// Overlays the supplied fields onto an existing profile. `createdAt` and
    /// `sessionId` are identity and stay as first recorded.
    pub fn merge_into(self, profile: &mut VisitorProfile) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        set(&mut profile.device_type, self.device_type);
        set(&mut profile.os, self.os);
        set(&mut profile.browser, self.browser);
        if let Some(location) = self.location {
            set(&mut profile.location.country, location.country);
            set(&mut profile.location.city, location.city);
            set(&mut profile.location.region, location.region);
        }
        set(&mut profile.traffic_source, self.traffic_source);
        set(&mut profile.page_views, self.page_views);
        set(&mut profile.session_duration, self.session_duration);
        set(&mut profile.is_active, self.is_active);
        set(&mut profile.referrer, self.referrer);
        set(&mut profile.user_agent, self.user_agent);
        set(&mut profile.ip_address, self.ip_address);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageInput {
    #[serde(default, deserialize_with = "lenient::string")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub sender: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub message_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_read: Option<bool>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub sentiment: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub response_time: Option<f64>,
}

impl ChatMessageInput {
    pub fn sanitize(self) -> ChatMessageBody {
        let defaults = ChatMessageBody::default();

        ChatMessageBody {
            session_id: self.session_id.unwrap_or(defaults.session_id),
            sender: self
                .sender
                .as_deref()
                .map(Sender::parse)
                .unwrap_or(defaults.sender),
            message: self.message.unwrap_or(defaults.message),
            message_type: self.message_type.unwrap_or(defaults.message_type),
            is_read: self.is_read.unwrap_or(defaults.is_read),
            sentiment: self.sentiment.unwrap_or(defaults.sentiment),
            response_time: self
                .response_time
                .filter(|seconds| *seconds > 0.0)
                .unwrap_or(defaults.response_time),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInput {
    #[serde(default, deserialize_with = "lenient::string")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub duration: Option<u64>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub page_views: Option<u64>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub message_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub exit_page: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub conversion_goal: Option<bool>,
}

impl SessionInput {
    pub fn sanitize(self, now: DateTime<Utc>) -> SessionBody {
        let defaults = SessionBody::default();

        SessionBody {
            session_id: self.session_id.unwrap_or(defaults.session_id),
            start_time: self.start_time.unwrap_or(now),
            end_time: self.end_time,
            duration: self.duration.unwrap_or(defaults.duration),
            page_views: self.page_views.unwrap_or(defaults.page_views),
            message_count: self.message_count.unwrap_or(defaults.message_count),
            status: self
                .status
                .as_deref()
                .and_then(SessionStatus::parse)
                .unwrap_or(defaults.status),
            exit_page: self.exit_page.unwrap_or(defaults.exit_page),
            conversion_goal: self.conversion_goal.unwrap_or(defaults.conversion_goal),
        }
    }
}

/// A validated, coerced payload ready to be applied to a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum NewRecord {
    Visitor(VisitorInput),
    Message(ChatMessageInput),
    Session(SessionInput),
}

impl NewRecord {
    pub fn parse(kind: RecordKind, data: Value) -> Result<Self, ValidationError> {
        validate(kind, &data)?;

        // Every field deserializer is infallible, so the only way to fail here
        // is a non-object payload, which `validate` has already rejected.
        let record = match kind {
            RecordKind::Visitor => serde_json::from_value(data).map(NewRecord::Visitor),
            RecordKind::Message => serde_json::from_value(data).map(NewRecord::Message),
            RecordKind::Session => serde_json::from_value(data).map(NewRecord::Session),
        };
        record.map_err(|_| ValidationError::NotAnObject { kind })
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            NewRecord::Visitor(_) => RecordKind::Visitor,
            NewRecord::Message(_) => RecordKind::Message,
            NewRecord::Session(_) => RecordKind::Session,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_visitor_requires_identity_fields() {
        let complete = json!({
            "sessionId": "s1",
            "deviceType": "Mobile",
            "os": "iOS",
            "browser": "Safari"
        });
        assert!(validate(RecordKind::Visitor, &complete).is_ok());

        for field in ["sessionId", "deviceType", "os", "browser"] {
            let mut partial = complete.clone();
            partial.as_object_mut().unwrap().remove(field);
            let err = validate(RecordKind::Visitor, &partial).unwrap_err();
            assert_eq!(
                err,
                ValidationError::MissingFields {
                    kind: RecordKind::Visitor,
                    fields: vec![field],
                }
            );
        }
    }

    #[test]
    fn test_validate_ignores_unrelated_fields() {
        let data = json!({
            "sessionId": "s1",
            "deviceType": "Desktop",
            "os": "Linux",
            "browser": "Firefox",
            "pageViews": "not a number",
            "location": 12
        });
        assert!(validate(RecordKind::Visitor, &data).is_ok());
    }

    #[test]
    fn test_validate_treats_null_as_missing() {
        let data = json!({ "sessionId": null, "startTime": "2024-05-01T10:00:00Z" });
        let err = validate(RecordKind::Session, &data).unwrap_err();
        assert!(err.to_string().contains("sessionId"));
    }

    #[test]
    fn test_validate_message_and_non_object() {
        let data = json!({ "sessionId": "s1" });
        let err = validate(RecordKind::Message, &data).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required message fields: sender, message"
        );

        let err = validate(RecordKind::Message, &json!("hello")).unwrap_err();
        assert_eq!(err, ValidationError::NotAnObject { kind: RecordKind::Message });
    }

    #[test]
    fn test_sanitize_empty_visitor() {
        let now = Utc::now();
        let profile = VisitorInput::default().sanitize(now);

        assert_eq!(profile.device_type, "unknown");
        assert_eq!(profile.traffic_source, "direct");
        assert_eq!(profile.page_views, 1);
        assert!(profile.is_active);
        assert_eq!(profile.location, Location::default());
        assert_eq!(profile.created_at, now);
    }

    #[test]
    fn test_sanitize_visitor_coerces_loose_types() {
        let input: VisitorInput = serde_json::from_value(json!({
            "sessionId": 1234,
            "deviceType": "Tablet",
            "pageViews": "4",
            "sessionDuration": -10,
            "isActive": false,
            "location": { "country": "FR", "city": "" },
            "trafficSource": ""
        }))
        .unwrap();

        let profile = input.sanitize(Utc::now());
        assert_eq!(profile.session_id, "1234");
        assert_eq!(profile.device_type, "Tablet");
        assert_eq!(profile.page_views, 4);
        assert_eq!(profile.session_duration, 0);
        assert!(!profile.is_active);
        assert_eq!(profile.location.country, "FR");
        assert_eq!(profile.location.city, "unknown");
        assert_eq!(profile.traffic_source, "direct");
    }

    #[test]
    fn test_merge_keeps_identity_and_unsupplied_fields() {
        let created = Utc::now() - chrono::Duration::days(2);
        let mut profile = VisitorInput {
            session_id: Some("s1".to_string()),
            device_type: Some("Mobile".to_string()),
            referrer: Some("https://news.example".to_string()),
            created_at: Some(created),
            ..Default::default()
        }
        .sanitize(Utc::now());

        VisitorInput {
            session_id: Some("other".to_string()),
            page_views: Some(5),
            created_at: Some(Utc::now()),
            location: Some(LocationInput {
                city: Some("Lyon".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
        .merge_into(&mut profile);

        assert_eq!(profile.session_id, "s1");
        assert_eq!(profile.created_at, created);
        assert_eq!(profile.page_views, 5);
        assert_eq!(profile.device_type, "Mobile");
        assert_eq!(profile.referrer, "https://news.example");
        assert_eq!(profile.location.city, "Lyon");
        assert_eq!(profile.location.country, "unknown");
    }

    #[test]
    fn test_sanitize_message_defaults() {
        let body = ChatMessageInput {
            session_id: Some("s1".to_string()),
            sender: Some("bot".to_string()),
            message: Some("Hi".to_string()),
            ..Default::default()
        }
        .sanitize();

        assert_eq!(body.sender, Sender::User);
        assert_eq!(body.message_type, "text");
        assert_eq!(body.sentiment, "neutral");
        assert!(!body.is_read);
        assert_eq!(body.response_time, 0.0);
    }

    #[test]
    fn test_sanitize_session_defaults() {
        let now = Utc::now();
        let body = SessionInput {
            session_id: Some("s1".to_string()),
            status: Some("closed".to_string()),
            ..Default::default()
        }
        .sanitize(now);

        assert_eq!(body.start_time, now);
        assert_eq!(body.end_time, None);
        assert_eq!(body.page_views, 1);
        assert_eq!(body.status, SessionStatus::Active);
        assert!(!body.conversion_goal);
    }

    #[test]
    fn test_new_record_parse() {
        let record = NewRecord::parse(
            RecordKind::Message,
            json!({ "sessionId": "s1", "sender": "agent", "message": "Hello!" }),
        )
        .unwrap();
        assert_eq!(record.kind(), RecordKind::Message);

        let err = NewRecord::parse(RecordKind::Session, json!({ "sessionId": "s1" })).unwrap_err();
        assert!(err.to_string().contains("startTime"));
    }
}
