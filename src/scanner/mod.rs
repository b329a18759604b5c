//! Threat scanning
//!
//! A `Scanner` turns text into a list of rule detections. The only scanner
//! shipped here is the keyword/regex `RuleScanner`; heavier engines plug in
//! behind the same trait.

use eyre::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::config::Config;

pub mod rules;

pub use rules::RuleScanner;

/// Detection severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse a severity name. Unknown names count as `Medium`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Severities that veto a tool call
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// A rule that matched scanned text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub rule_name: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
}

/// Something that can scan text for threats
pub trait Scanner {
    fn scan(&self, text: &str) -> Result<Vec<Detection>>;
}

/// Keep detections at or above `min`
pub fn filter_by_severity(detections: Vec<Detection>, min: Severity) -> Vec<Detection> {
    detections.into_iter().filter(|d| d.severity >= min).collect()
}

/// Drop repeated rule names, keeping the first occurrence
pub fn dedup_by_rule(detections: Vec<Detection>) -> Vec<Detection> {
    let mut seen = HashSet::new();
    detections
        .into_iter()
        .filter(|d| seen.insert(d.rule_name.clone()))
        .collect()
}

/// Scan with the configured input cap, severity floor and rule dedup
pub fn scan_filtered(scanner: &dyn Scanner, text: &str, config: &Config) -> Result<Vec<Detection>> {
    let detections = scanner.scan(cap_scan_input(text, config.max_content_length))?;
    Ok(dedup_by_rule(filter_by_severity(detections, config.min_severity)))
}

/// Cap scanner input at `max_chars` characters
pub fn cap_scan_input(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(rule: &str, severity: Severity) -> Detection {
        Detection {
            rule_name: rule.to_string(),
            severity,
            description: String::new(),
            category: String::new(),
            matched_keywords: Vec::new(),
        }
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("HIGH"), Severity::High);
        assert_eq!(Severity::parse(" low "), Severity::Low);
        assert_eq!(Severity::parse("critical"), Severity::Critical);
        assert_eq!(Severity::parse("unknown"), Severity::Medium);
        assert_eq!(Severity::parse(""), Severity::Medium);
    }

    #[test]
    fn test_missing_severity_defaults_to_medium() {
        let d: Detection = serde_json::from_str(r#"{"rule_name": "NoSeverityRule"}"#).unwrap();
        assert_eq!(d.severity, Severity::Medium);
    }

    #[test]
    fn test_filters_low_minimum() {
        let all = vec![
            detection("a", Severity::Low),
            detection("b", Severity::Medium),
            detection("c", Severity::High),
        ];
        assert_eq!(filter_by_severity(all, Severity::Low).len(), 3);
    }

    #[test]
    fn test_filters_medium_minimum() {
        let all = vec![
            detection("a", Severity::Low),
            detection("b", Severity::Medium),
            detection("c", Severity::High),
        ];
        let kept = filter_by_severity(all, Severity::Medium);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|d| d.severity >= Severity::Medium));
    }

    #[test]
    fn test_filters_high_minimum() {
        let all = vec![
            detection("a", Severity::Low),
            detection("b", Severity::Medium),
            detection("c", Severity::High),
        ];
        let kept = filter_by_severity(all, Severity::High);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].rule_name, "c");
    }

    #[test]
    fn test_dedup_keeps_first() {
        let all = vec![
            detection("a", Severity::Low),
            detection("b", Severity::Medium),
            detection("a", Severity::High),
        ];
        let unique = dedup_by_rule(all);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].rule_name, "a");
        assert_eq!(unique[0].severity, Severity::Low);
    }

    struct Canned(Vec<Detection>);

    impl Scanner for Canned {
        fn scan(&self, _text: &str) -> Result<Vec<Detection>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_scan_filtered_applies_floor_and_dedup() {
        let scanner = Canned(vec![
            detection("a", Severity::Low),
            detection("b", Severity::High),
            detection("b", Severity::High),
        ]);
        let config = Config {
            min_severity: Severity::Medium,
            ..Config::default()
        };
        let found = scan_filtered(&scanner, "text", &config).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rule_name, "b");
    }

    #[test]
    fn test_cap_scan_input_is_char_safe() {
        let text = "\u{4e2d}\u{6587}abc";
        assert_eq!(cap_scan_input(text, 2), "\u{4e2d}\u{6587}");
        assert_eq!(cap_scan_input(text, 100), text);
    }
}
