//! Self-contained HTML session reports
//!
//! One file with inline CSS, JS and SVG icons; nothing is fetched when the
//! report is opened.

use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

pub mod icons;

pub use icons::tool_icon;

use crate::ai_summary::{format_duration, generate_ai_summary, generate_stats_summary};
use crate::config::Config;
use crate::session::{EventRecord, LogRecord, SessionData};

const STYLES: &str = include_str!("report.css");
const SCRIPT: &str = include_str!("report.js");

/// Displayed tool input/output cap, in characters
pub const MAX_DISPLAY_CHARS: usize = 10_000;

/// Assemble a session from its log records, attach the summary and render it
pub fn render_session(
    records: Vec<LogRecord>,
    session_id: &str,
    session_end: Option<DateTime<Utc>>,
    config: &Config,
    ai_enabled: bool,
) -> (SessionData, String) {
    let mut data = SessionData::from_records(records, session_id, session_end);
    data.summary.ai_summary = Some(generate_ai_summary(&data, ai_enabled, &config.model));
    let html = generate_html_report(&data);
    (data, html)
}

/// Render the full report document
pub fn generate_html_report(data: &SessionData) -> String {
    let mut html = String::with_capacity(32 * 1024);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"UTF-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    html.push_str(&format!(
        "<title>NOVA Session Report - {}</title>\n",
        html_escape(&data.session_id)
    ));
    html.push_str(&format!("<style>\n{}</style>\n", STYLES));
    html.push_str("</head>\n<body>\n<main>\n");

    html.push_str(&render_header(data));
    html.push_str(&render_summary(data));
    html.push_str(&render_stats(data));
    html.push_str(&render_metadata(data));
    html.push_str(&render_tools(data));

    if data.events.is_empty() {
        html.push_str("<section class=\"events\">\n<div class=\"empty-state\">No events recorded</div>\n</section>\n");
    } else {
        html.push_str(&render_timeline(&data.events));
        html.push_str(&render_events(&data.events));
    }

    html.push_str(&format!(
        "<footer>Generated by nova-tracer {}</footer>\n",
        html_escape(data.nova_version.as_deref().unwrap_or(crate::session::record::NOVA_VERSION))
    ));
    html.push_str("</main>\n");
    html.push_str(&format!(
        "<script>\nconst SESSION_DATA = {};\n{}</script>\n",
        embed_json(data),
        SCRIPT
    ));
    html.push_str("</body>\n</html>\n");
    html
}

/// Write `html` to `path`, creating parent directories. Failures are logged.
pub fn save_report(html: &str, path: &Path) -> bool {
    match write_report(html, path) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Failed to save report: {:#}", e);
            false
        }
    }
}

fn write_report(html: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, html).with_context(|| format!("Failed to write {}", path.display()))
}

/// `YYYY-MM-DD HH:MM:SS` in UTC; `N/A` when missing; unparseable input is shown as-is
pub fn format_timestamp(ts: Option<&str>) -> String {
    let Some(ts) = ts.map(str::trim).filter(|s| !s.is_empty()) else {
        return "N/A".to_string();
    };
    match crate::session::record::parse_utc(ts) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ts.chars().take(19).collect(),
    }
}

fn format_time(ts: Option<&str>) -> String {
    ts.and_then(crate::session::record::parse_utc)
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Display text for a JSON value, capped at `max_chars`. Returns whether it was cut.
pub fn format_content_for_display(content: &Value, max_chars: usize) -> (String, bool) {
    let text = match content {
        Value::Null => return (String::new(), false),
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };

    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (text[..idx].to_string(), true),
        None => (text, false),
    }
}

pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Session data as a JSON literal safe inside `<script>`
fn embed_json(data: &SessionData) -> String {
    serde_json::to_string(data)
        .unwrap_or_else(|_| "{}".to_string())
        .replace('<', "\\u003c")
}

fn render_header(data: &SessionData) -> String {
    let summary = &data.summary;
    let (status, label, subtitle) = if summary.blocked > 0 {
        (
            "blocked",
            "BLOCKED",
            Some(format!("{} blocked, {} warnings", summary.blocked, summary.warnings)),
        )
    } else if summary.warnings > 0 {
        ("warnings", "WARNINGS", Some(format!("{} warnings", summary.warnings)))
    } else {
        ("clean", "CLEAN", None)
    };

    let mut html = String::from("<header class=\"header\">\n");
    html.push_str(&format!(
        "<div><h1>NOVA Session Report</h1><div class=\"session-id\">{}</div></div>\n",
        html_escape(&data.session_id)
    ));
    html.push_str(&format!("<div class=\"health-badge-container\" data-status=\"{}\">", status));
    html.push_str(&format!("<div class=\"health-badge\">{}</div>", label));
    if let Some(subtitle) = subtitle {
        html.push_str(&format!("<div class=\"health-subtitle\">{}</div>", subtitle));
    }
    html.push_str("</div>\n</header>\n");
    html
}

fn render_summary(data: &SessionData) -> String {
    let text = match data.summary.ai_summary.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => generate_stats_summary(data),
    };
    format!(
        "<section class=\"summary\">\n<h2>Session Summary</h2>\n<p>{}</p>\n</section>\n",
        html_escape(&text)
    )
}

fn render_stats(data: &SessionData) -> String {
    let summary = &data.summary;
    let cards = [
        ("", summary.total_events.to_string(), "Total Events"),
        ("", summary.tools_used.len().to_string(), "Tools Used"),
        ("", summary.files_touched.to_string(), "Files Touched"),
        (" warned", summary.warnings.to_string(), "Warnings"),
        (" blocked", summary.blocked.to_string(), "Blocked"),
        ("", format_duration(summary.duration_seconds), "Duration"),
    ];

    let mut html = String::from("<section class=\"stats\">\n");
    for (modifier, value, label) in cards {
        html.push_str(&format!(
            "<div class=\"stat-card{}\"><div class=\"stat-value\">{}</div><div class=\"stat-label\">{}</div></div>\n",
            modifier, value, label
        ));
    }
    html.push_str("</section>\n");
    html
}

fn render_metadata(data: &SessionData) -> String {
    let rows = [
        ("Session ID", data.session_id.clone()),
        ("Session Start", format_timestamp(data.session_start.as_deref())),
        ("Session End", format_timestamp(data.session_end.as_deref())),
        ("Platform", data.platform.clone().unwrap_or_else(|| "N/A".to_string())),
        ("NOVA Version", data.nova_version.clone().unwrap_or_else(|| "N/A".to_string())),
        ("Project Directory", data.project_dir.clone().unwrap_or_else(|| "N/A".to_string())),
    ];

    let mut html = String::from("<section>\n<h2>Session Details</h2>\n<dl class=\"metadata\">\n");
    for (label, value) in rows {
        html.push_str(&format!("<dt>{}</dt><dd>{}</dd>\n", label, html_escape(&value)));
    }
    html.push_str("</dl>\n</section>\n");
    html
}

fn render_tools(data: &SessionData) -> String {
    if data.summary.tools_used.is_empty() {
        return String::new();
    }

    let mut html = String::from("<section>\n<h2>Tools Used</h2>\n<div class=\"tools-list\">\n");
    for (tool, count) in &data.summary.tools_used {
        html.push_str(&format!(
            "<div class=\"tool-item\">{}<span class=\"tool-name\">{}</span><span class=\"tool-count\">{}</span></div>\n",
            tool_icon(tool),
            html_escape(tool),
            count
        ));
    }
    html.push_str("</div>\n</section>\n");
    html
}

fn render_timeline(events: &[EventRecord]) -> String {
    if events.is_empty() {
        return String::new();
    }

    let mut html = String::from("<section class=\"timeline-container\">\n<h2>Timeline</h2>\n<div class=\"timeline\">\n");
    for (index, event) in events.iter().enumerate() {
        html.push_str(&format!(
            "<div class=\"timeline-node {verdict}\" data-event-id=\"{index}\" onclick=\"scrollToEvent({index})\" title=\"{tool} ({label})\"><span class=\"node-icon\">{icon}</span><span class=\"node-time\">{time}</span></div>\n",
            verdict = event.nova_verdict.as_str(),
            index = index,
            tool = html_escape(&event.tool_name),
            label = event.nova_verdict.label(),
            icon = tool_icon(&event.tool_name),
            time = format_time(event.timestamp_start.as_deref()),
        ));
    }
    html.push_str("</div>\n</section>\n");
    html
}

fn render_events(events: &[EventRecord]) -> String {
    let mut html = String::from("<section class=\"events\">\n<h2>Events</h2>\n");
    for (index, event) in events.iter().enumerate() {
        html.push_str(&render_event_card(index, event));
    }
    html.push_str("</section>\n");
    html
}

fn render_event_card(index: usize, event: &EventRecord) -> String {
    let verdict = event.nova_verdict;
    let mut html = format!(
        "<div class=\"event-card {}\" id=\"event-{}\" data-event-id=\"{}\">\n",
        verdict.as_str(),
        index,
        index
    );

    html.push_str(&format!(
        "<div class=\"event-header\" onclick=\"toggleEvent({})\"><span class=\"event-id\">#{}</span>{}<span class=\"event-tool\">{}</span><span class=\"event-time\">{}</span><span class=\"event-verdict {}\">{}</span><span class=\"expand-icon\">&#9660;</span></div>\n",
        index,
        event.id,
        tool_icon(&event.tool_name),
        html_escape(&event.tool_name),
        format_time(event.timestamp_start.as_deref()),
        verdict.as_str(),
        verdict.label()
    ));

    html.push_str(&format!(
        "<div class=\"event-details\" id=\"details-{}\" style=\"display: none;\">\n",
        index
    ));

    let (input_text, input_cut) = format_content_for_display(&event.tool_input, MAX_DISPLAY_CHARS);
    html.push_str(&detail_block("Tool Input", &input_text, input_cut.then(|| event.tool_input.to_string().len())));

    if let Some(output) = &event.tool_output {
        let (output_text, output_cut) = format_content_for_display(&Value::String(output.clone()), MAX_DISPLAY_CHARS);
        let original = event
            .tool_output_original_size
            .or_else(|| output_cut.then_some(output.len()));
        html.push_str(&detail_block("Tool Output", &output_text, original));
    }

    html.push_str("<div class=\"detail-meta\">");
    html.push_str(&format!("<span>Duration: {}ms</span>", event.duration_ms));
    if let Some(dir) = &event.working_dir {
        html.push_str(&format!("<span>Working Dir: {}</span>", html_escape(dir)));
    }
    html.push_str("</div>\n");

    if !event.files_accessed.is_empty() {
        html.push_str(&format!(
            "<div class=\"detail-section\"><div class=\"detail-label\">Files Accessed ({})</div><ul class=\"file-list\">",
            event.files_accessed.len()
        ));
        for file in &event.files_accessed {
            html.push_str(&format!("<li>{}</li>", html_escape(file)));
        }
        html.push_str("</ul></div>\n");
    }

    if verdict.is_flagged() {
        html.push_str(&render_nova_section(event));
    }

    html.push_str("</div>\n</div>\n");
    html
}

fn detail_block(label: &str, text: &str, original_bytes: Option<usize>) -> String {
    let mut html = format!(
        "<div class=\"detail-section\"><div class=\"detail-label\">{}</div><div class=\"detail-value\"><pre>{}</pre></div>",
        label,
        html_escape(text)
    );
    if let Some(bytes) = original_bytes {
        html.push_str(&format!(
            "<div class=\"truncation-indicator\">Content truncated (original size: {:.1} KB)</div>",
            bytes as f64 / 1024.0
        ));
    }
    html.push_str("</div>\n");
    html
}

fn render_nova_section(event: &EventRecord) -> String {
    let severity = event.nova_severity.map(|s| s.as_str()).unwrap_or("unknown");
    let rules = if event.nova_rules_matched.is_empty() {
        "none".to_string()
    } else {
        event
            .nova_rules_matched
            .iter()
            .map(|r| html_escape(r))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "<div class=\"nova-verdict-section\"><div class=\"detail-label\">NOVA Analysis</div><div><span class=\"nova-severity {severity}\">Severity: {severity}</span></div><div>Rules matched: {rules}</div><div>Scan time: {scan}ms</div></div>\n",
        severity = severity,
        rules = rules,
        scan = event.nova_scan_time_ms
    )
}
