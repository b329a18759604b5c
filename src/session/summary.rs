//! Session aggregation for reporting

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::record::{self, EventRecord, LogRecord, Verdict};

/// Aggregate statistics over a session's events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSummary {
    pub total_events: usize,
    /// Tool name to call count, in first-seen order
    pub tools_used: IndexMap<String, usize>,
    /// Distinct paths across all events
    pub files_touched: usize,
    pub warnings: usize,
    pub blocked: usize,
    pub duration_seconds: u64,
    pub ai_summary: Option<String>,
}

impl SessionSummary {
    pub fn from_events(events: &[EventRecord], start: Option<&str>, end: Option<&str>) -> Self {
        let mut tools_used: IndexMap<String, usize> = IndexMap::new();
        let mut files: HashSet<&str> = HashSet::new();
        let mut warnings = 0;
        let mut blocked = 0;

        for event in events {
            *tools_used.entry(event.tool_name.clone()).or_insert(0) += 1;
            files.extend(event.files_accessed.iter().map(|f| f.as_str()));
            match event.nova_verdict {
                Verdict::Warned => warnings += 1,
                Verdict::Blocked => blocked += 1,
                Verdict::Allowed | Verdict::ScanFailed => {}
            }
        }

        Self {
            total_events: events.len(),
            tools_used,
            files_touched: files.len(),
            warnings,
            blocked,
            duration_seconds: duration_between(start, end),
            ai_summary: None,
        }
    }
}

/// Whole-seconds between two timestamps, clamped at zero
fn duration_between(start: Option<&str>, end: Option<&str>) -> u64 {
    let (Some(start), Some(end)) = (start.and_then(record::parse_utc), end.and_then(record::parse_utc)) else {
        return 0;
    };
    (end - start).num_seconds().max(0) as u64
}

/// Everything the reporter needs about one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionData {
    pub session_id: String,
    pub session_start: Option<String>,
    pub session_end: Option<String>,
    pub platform: Option<String>,
    pub project_dir: Option<String>,
    pub nova_version: Option<String>,
    pub events: Vec<EventRecord>,
    pub summary: SessionSummary,
}

impl Default for SessionData {
    fn default() -> Self {
        Self {
            session_id: "unknown".to_string(),
            session_start: None,
            session_end: None,
            platform: None,
            project_dir: None,
            nova_version: None,
            events: Vec::new(),
            summary: SessionSummary::default(),
        }
    }
}

impl SessionData {
    /// Build the session object from log records.
    ///
    /// `fallback_id` is used when the log has no init record. `session_end`
    /// defaults to the last event's end time, then to now.
    pub fn from_records(records: Vec<LogRecord>, fallback_id: &str, session_end: Option<DateTime<Utc>>) -> Self {
        let mut data = Self {
            session_id: fallback_id.to_string(),
            ..Self::default()
        };

        for record in records {
            match record {
                LogRecord::Init(init) => {
                    if !init.session_id.is_empty() {
                        data.session_id = init.session_id;
                    }
                    data.session_start = init.session_start;
                    data.project_dir = init.project_dir;
                    data.platform = init.platform;
                    data.nova_version = init.nova_version;
                }
                LogRecord::Event(event) => data.events.push(event),
            }
        }

        if data.session_start.is_none() {
            data.session_start = data.events.first().and_then(|e| e.timestamp_start.clone());
        }

        data.session_end = Some(match session_end {
            Some(end) => record::format_utc(end),
            None => data
                .events
                .last()
                .and_then(|e| e.timestamp_end.clone())
                .unwrap_or_else(|| record::format_utc(Utc::now())),
        });

        data.summary = SessionSummary::from_events(
            &data.events,
            data.session_start.as_deref(),
            data.session_end.as_deref(),
        );
        data
    }
}
