//! Session log records
//!
//! A session log is JSON lines: one `init` record followed by `event`
//! records in append order. Every field defaults so older or hand-written
//! logs still load.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::capture;
use crate::scanner::{Detection, Severity};

/// Version stamped into init records and reports
pub const NOVA_VERSION: &str = env!("CARGO_PKG_VERSION");

/// One line of a session log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogRecord {
    Init(InitRecord),
    Event(EventRecord),
}

/// First line of every session log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitRecord {
    pub session_id: String,
    pub session_start: Option<String>,
    pub project_dir: Option<String>,
    pub platform: Option<String>,
    pub nova_version: Option<String>,
}

/// A single captured tool call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventRecord {
    pub id: u64,
    pub timestamp_start: Option<String>,
    pub timestamp_end: Option<String>,
    pub duration_ms: u64,
    pub tool_name: String,
    pub tool_input: serde_json::Value,
    pub tool_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_output_original_size: Option<usize>,
    pub working_dir: Option<String>,
    pub files_accessed: Vec<String>,
    pub nova_verdict: Verdict,
    pub nova_severity: Option<Severity>,
    pub nova_rules_matched: Vec<String>,
    pub nova_scan_time_ms: u64,
}

impl EventRecord {
    /// Record for a tool call spanning `start..end`, with touched files and cwd filled in
    pub fn for_tool(
        id: u64,
        tool_name: &str,
        tool_input: &serde_json::Value,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            timestamp_start: Some(format_utc(start)),
            timestamp_end: Some(format_utc(end)),
            duration_ms: (end - start).num_milliseconds().max(0) as u64,
            tool_name: tool_name.to_string(),
            tool_input: tool_input.clone(),
            working_dir: std::env::current_dir().ok().map(|p| p.display().to_string()),
            files_accessed: capture::extract_files_accessed(tool_name, tool_input),
            ..Self::default()
        }
    }

    pub fn apply(&mut self, assessment: Assessment) {
        self.nova_verdict = assessment.verdict;
        self.nova_severity = assessment.severity;
        self.nova_rules_matched = assessment.rules_matched;
    }
}

/// Outcome classification for one tool call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    #[default]
    Allowed,
    Warned,
    Blocked,
    ScanFailed,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Warned => "warned",
            Self::Blocked => "blocked",
            Self::ScanFailed => "scan_failed",
        }
    }

    /// Upper-case label for display
    pub fn label(&self) -> &'static str {
        match self {
            Self::Allowed => "ALLOWED",
            Self::Warned => "WARNED",
            Self::Blocked => "BLOCKED",
            Self::ScanFailed => "SCAN FAILED",
        }
    }

    /// Whether the record carries scanner findings worth showing
    pub fn is_flagged(&self) -> bool {
        matches!(self, Self::Warned | Self::Blocked)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The verdict fields derived from a scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assessment {
    pub verdict: Verdict,
    pub severity: Option<Severity>,
    pub rules_matched: Vec<String>,
}

impl Assessment {
    /// Highest severity wins: critical > high > medium > low.
    pub fn from_detections(detections: &[Detection]) -> Self {
        if detections.is_empty() {
            return Self::default();
        }

        let has = |level: Severity| detections.iter().any(|d| d.severity == level);
        let (verdict, severity) = if has(Severity::Critical) {
            (Verdict::Blocked, Severity::Critical)
        } else if has(Severity::High) {
            (Verdict::Blocked, Severity::High)
        } else if has(Severity::Medium) {
            (Verdict::Warned, Severity::Medium)
        } else {
            (Verdict::Warned, Severity::Low)
        };

        Self {
            verdict,
            severity: Some(severity),
            rules_matched: detections.iter().map(|d| d.rule_name.clone()).collect(),
        }
    }

    pub fn scan_failed() -> Self {
        Self {
            verdict: Verdict::ScanFailed,
            severity: None,
            rules_matched: Vec::new(),
        }
    }
}

/// RFC 3339 UTC timestamp with millisecond precision
pub fn format_utc(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 timestamp into UTC
pub fn parse_utc(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim()).ok().map(|dt| dt.with_timezone(&Utc))
}
