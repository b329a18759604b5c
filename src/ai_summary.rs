//! Natural-language session summaries
//!
//! Asks the Anthropic Messages API for a two-sentence summary of a session.
//! Without an API key, or on any failure, a stats-only summary is used.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::SessionData;

pub const HAIKU_MODEL: &str = "claude-3-5-haiku-20241022";
pub const MAX_SUMMARY_TOKENS: u32 = 150;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROMPT_EVENT_LIMIT: usize = 10;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: String,
}

/// `45s`, `2m 5s`, `2h 1m`
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}

/// One-line summary built from the session statistics alone
pub fn generate_stats_summary(data: &SessionData) -> String {
    let summary = &data.summary;
    let mut text = format!(
        "Session completed: {} tool calls over {}.",
        summary.total_events,
        format_duration(summary.duration_seconds)
    );
    if summary.files_touched > 0 {
        text.push_str(&format!(" Modified {} files.", summary.files_touched));
    }
    text.push_str(&format!(
        " Security: {} warnings, {} blocked.",
        summary.warnings, summary.blocked
    ));
    text
}

pub fn build_summary_prompt(data: &SessionData) -> String {
    let summary = &data.summary;

    let duration = if summary.duration_seconds >= 3600 {
        format!("{:.1} hours", summary.duration_seconds as f64 / 3600.0)
    } else {
        format!("{} minutes", summary.duration_seconds / 60)
    };

    let tools = if summary.tools_used.is_empty() {
        "none".to_string()
    } else {
        summary
            .tools_used
            .iter()
            .map(|(tool, count)| format!("{}: {}", tool, count))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut timeline: Vec<String> = data
        .events
        .iter()
        .take(PROMPT_EVENT_LIMIT)
        .map(|e| format!("- {} ({})", e.tool_name, e.nova_verdict))
        .collect();
    if data.events.len() > PROMPT_EVENT_LIMIT {
        timeline.push(format!("... and {} more events", data.events.len() - PROMPT_EVENT_LIMIT));
    }

    format!(
        "Summarize this Claude Code session in 2-3 sentences. Focus on what was accomplished \
         and mention any security concerns.\n\n\
         Project: {}\n\
         Duration: {}\n\
         Total tool calls: {}\n\
         Tools used: {}\n\
         Files touched: {}\n\
         Security events: {} warnings, {} blocked\n\n\
         Event timeline:\n{}\n",
        data.project_dir.as_deref().unwrap_or("unknown"),
        duration,
        summary.total_events,
        tools,
        summary.files_touched,
        summary.warnings,
        summary.blocked,
        timeline.join("\n")
    )
}

/// Summary text for the report; falls back to the stats summary on any problem
pub fn generate_ai_summary(data: &SessionData, enabled: bool, model: &str) -> String {
    if !enabled {
        log::debug!("AI summary disabled, using stats summary");
        return generate_stats_summary(data);
    }

    let api_key = match std::env::var("ANTHROPIC_API_KEY") {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            log::debug!("ANTHROPIC_API_KEY not set, using stats summary");
            return generate_stats_summary(data);
        }
    };

    match request_summary(&build_summary_prompt(data), model, &api_key) {
        Ok(text) if !text.is_empty() => text,
        Ok(_) => {
            log::warn!("Empty AI summary, using stats summary");
            generate_stats_summary(data)
        }
        Err(e) => {
            log::warn!("AI summary failed, using stats summary: {:#}", e);
            generate_stats_summary(data)
        }
    }
}

fn request_summary(prompt: &str, model: &str, api_key: &str) -> Result<String> {
    let request = MessagesRequest {
        model,
        max_tokens: MAX_SUMMARY_TOKENS,
        messages: vec![Message {
            role: "user",
            content: prompt,
        }],
    };
    let request_body = serde_json::to_string(&request).context("Failed to serialize request")?;

    let mut response = ureq::post(MESSAGES_URL)
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .header("Content-Type", "application/json")
        .send(request_body.as_bytes())
        .context("Failed to call Anthropic API")?;

    let response_body = response
        .body_mut()
        .read_to_string()
        .context("Failed to read response")?;

    extract_summary_text(&response_body)
}

fn extract_summary_text(body: &str) -> Result<String> {
    let response: MessagesResponse = serde_json::from_str(body).context("Failed to parse Anthropic response")?;
    Ok(response
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .map(|block| block.text.as_str())
        .collect::<Vec<_>>()
        .join("")
        .trim()
        .to_string())
}
