//! Derived statistics over an analytics snapshot.
//!
//! Everything here is a pure function of its inputs and an explicit `now`,
//! which keeps the window arithmetic testable.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::models::records::{ChatMessage, Sender, Session, Snapshot, Visitor};

/// Visitors seen within this many minutes count as active.
pub const ACTIVE_WINDOW_MINUTES: i64 = 5;
pub const DEFAULT_TOP_SOURCES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCount {
    pub source: String,
    pub count: usize,
}

/// Headline numbers returned alongside the raw collections.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_visitors: usize,
    pub active_visitors: usize,
    pub total_messages: usize,
    pub avg_response_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub overview: Overview,
    #[serde(rename = "last24Hours")]
    pub last_24_hours: DayWindow,
    #[serde(rename = "last7Days")]
    pub last_7_days: WeekWindow,
    pub trends: Trends,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_visitors: usize,
    pub total_messages: usize,
    pub total_sessions: usize,
    pub active_visitors: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayWindow {
    pub visitors: usize,
    pub messages: usize,
    pub sessions: usize,
    pub avg_session_duration: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekWindow {
    pub visitors: usize,
    pub avg_response_time: i64,
    pub top_traffic_sources: Vec<SourceCount>,
    pub device_breakdown: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trends {
    pub visitor_growth: i64,
    pub message_volume: BTreeMap<u32, usize>,
    pub conversion_rate: u64,
}

/// Halves round toward positive infinity, so -12.5 becomes -12.
/// `f64::round` would give -13.
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

pub fn active_visitor_count(visitors: &[Visitor], now: DateTime<Utc>) -> usize {
    let window = Duration::minutes(ACTIVE_WINDOW_MINUTES);
    visitors
        .iter()
        .filter(|v| now - v.last_seen < window)
        .count()
}

/// Mean gap, in whole seconds, between a user message and the agent message
/// stored right after it.
///
/// Pairs are taken by position in the global sequence, not per session, so
/// interleaved conversations can pair across sessions.
pub fn average_response_time_seconds(messages: &[ChatMessage]) -> i64 {
    let samples: Vec<i64> = messages
        .windows(2)
        .filter(|pair| pair[0].body.sender == Sender::User && pair[1].body.sender == Sender::Agent)
        .map(|pair| (pair[1].timestamp - pair[0].timestamp).num_milliseconds())
        .collect();

    if samples.is_empty() {
        return 0;
    }

    let avg_ms = samples.iter().sum::<i64>() as f64 / samples.len() as f64;
    round_half_up(avg_ms / 1000.0) as i64
}

/// Sources ranked by visitor count; ties keep first-seen order.
pub fn top_traffic_sources(visitors: &[Visitor], limit: usize) -> Vec<SourceCount> {
    let mut ranked: Vec<SourceCount> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for visitor in visitors {
        let source = non_empty_or(&visitor.profile.traffic_source, "direct");
        match positions.get(source).copied() {
            Some(index) => ranked[index].count += 1,
            None => {
                positions.insert(source, ranked.len());
                ranked.push(SourceCount {
                    source: source.to_string(),
                    count: 1,
                });
            },
        }
    }

    // `sort_by` is stable, which is what preserves the tie order.
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

pub fn device_breakdown(visitors: &[Visitor]) -> BTreeMap<String, usize> {
    let mut devices = BTreeMap::new();
    for visitor in visitors {
        let device = non_empty_or(&visitor.profile.device_type, "unknown");
        *devices.entry(device.to_string()).or_insert(0) += 1;
    }
    devices
}

/// Percentage change in new visitors, last 30 days against the 30 before.
pub fn growth_rate(visitors: &[Visitor], now: DateTime<Utc>) -> i64 {
    let current_start = now - Duration::days(30);
    let previous_start = now - Duration::days(60);

    let current = visitors
        .iter()
        .filter(|v| v.profile.created_at > current_start)
        .count();
    let previous = visitors
        .iter()
        .filter(|v| v.profile.created_at > previous_start && v.profile.created_at <= current_start)
        .count();

    if previous == 0 {
        return if current > 0 { 100 } else { 0 };
    }

    let change = (current as f64 - previous as f64) / previous as f64 * 100.0;
    round_half_up(change) as i64
}

/// Message counts keyed by UTC hour of day.
///
/// Keys are the hours covered by the 24 hours before `now`, which is every
/// hour of the day. Each message lands in the bucket of its own hour
/// regardless of date, so same-hour messages from different days share a
/// bucket.
pub fn hourly_message_volume(messages: &[ChatMessage], now: DateTime<Utc>) -> BTreeMap<u32, usize> {
    let mut volume: BTreeMap<u32, usize> = (0..24)
        .map(|i| ((now - Duration::hours(i)).hour(), 0))
        .collect();

    for message in messages {
        if let Some(count) = volume.get_mut(&message.timestamp.hour()) {
            *count += 1;
        }
    }
    volume
}

pub fn conversion_rate(sessions: &[Session]) -> u64 {
    if sessions.is_empty() {
        return 0;
    }

    let conversions = sessions.iter().filter(|s| s.body.conversion_goal).count();
    round_half_up(conversions as f64 / sessions.len() as f64 * 100.0) as u64
}

pub fn average_session_duration(sessions: &[&Session]) -> u64 {
    if sessions.is_empty() {
        return 0;
    }

    let total: u64 = sessions.iter().map(|s| s.body.duration).sum();
    round_half_up(total as f64 / sessions.len() as f64) as u64
}

pub fn dashboard_stats(snapshot: &Snapshot, now: DateTime<Utc>) -> DashboardStats {
    DashboardStats {
        total_visitors: snapshot.visitors.len(),
        active_visitors: active_visitor_count(&snapshot.visitors, now),
        total_messages: snapshot.chat_messages.len(),
        avg_response_time: average_response_time_seconds(&snapshot.chat_messages),
    }
}

pub fn build_report(snapshot: &Snapshot, now: DateTime<Utc>) -> AnalyticsReport {
    let day_start = now - Duration::hours(24);
    let week_start = now - Duration::days(7);

    let visitors_24h = snapshot
        .visitors
        .iter()
        .filter(|v| v.profile.created_at > day_start)
        .count();
    let messages_24h = snapshot
        .chat_messages
        .iter()
        .filter(|m| m.timestamp > day_start)
        .count();
    let sessions_24h: Vec<&Session> = snapshot
        .sessions
        .iter()
        .filter(|s| s.body.start_time > day_start)
        .collect();
    let visitors_7d: Vec<Visitor> = snapshot
        .visitors
        .iter()
        .filter(|v| v.profile.created_at > week_start)
        .cloned()
        .collect();

    AnalyticsReport {
        overview: Overview {
            total_visitors: snapshot.visitors.len(),
            total_messages: snapshot.chat_messages.len(),
            total_sessions: snapshot.sessions.len(),
            active_visitors: active_visitor_count(&snapshot.visitors, now),
        },
        last_24_hours: DayWindow {
            visitors: visitors_24h,
            messages: messages_24h,
            sessions: sessions_24h.len(),
            avg_session_duration: average_session_duration(&sessions_24h),
        },
        last_7_days: WeekWindow {
            visitors: visitors_7d.len(),
            avg_response_time: average_response_time_seconds(&snapshot.chat_messages),
            top_traffic_sources: top_traffic_sources(&visitors_7d, DEFAULT_TOP_SOURCES),
            device_breakdown: device_breakdown(&visitors_7d),
        },
        trends: Trends {
            visitor_growth: growth_rate(&snapshot.visitors, now),
            message_volume: hourly_message_volume(&snapshot.chat_messages, now),
            conversion_rate: conversion_rate(&snapshot.sessions),
        },
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}
