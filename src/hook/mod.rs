//! Hook event handling
//!
//! Hooks are events fired by Claude Code around tool calls. Each
//! invocation is a single process: the payload arrives on stdin, the
//! registered handlers run, and the exit code tells the host whether to
//! proceed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::config::Config;

pub mod dispatch;
pub mod guard;
pub mod lifecycle;
pub mod scan;

pub use dispatch::dispatch;

/// Hook event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum HookEvent {
    PreToolUse,
    PostToolUse,
    Stop,
    SessionStart,
    SessionEnd,
    SubagentStop,
    Notification,
    UserPromptSubmit,
    PreCompact,
}

impl HookEvent {
    pub const ALL: [HookEvent; 9] = [
        Self::PreToolUse,
        Self::PostToolUse,
        Self::Stop,
        Self::SessionStart,
        Self::SessionEnd,
        Self::SubagentStop,
        Self::Notification,
        Self::UserPromptSubmit,
        Self::PreCompact,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "pretooluse" => Some(Self::PreToolUse),
            "posttooluse" => Some(Self::PostToolUse),
            "stop" => Some(Self::Stop),
            "sessionstart" => Some(Self::SessionStart),
            "sessionend" => Some(Self::SessionEnd),
            "subagentstop" => Some(Self::SubagentStop),
            "notification" => Some(Self::Notification),
            "userpromptsubmit" => Some(Self::UserPromptSubmit),
            "precompact" => Some(Self::PreCompact),
            _ => None,
        }
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Hook payload read from stdin. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HookInput {
    pub hook_event_name: Option<String>,
    pub session_id: Option<String>,
    pub cwd: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Value,
    pub tool_response: Value,
    pub tool_use_id: Option<String>,
    /// SessionStart trigger: startup, resume, clear, compact
    pub source: Option<String>,
    pub session_end_time: Option<String>,
}

impl HookInput {
    pub fn tool_name(&self) -> &str {
        self.tool_name.as_deref().unwrap_or("")
    }

    /// CLAUDE_PROJECT_DIR, then the payload's cwd, then the process cwd
    pub fn project_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var("CLAUDE_PROJECT_DIR")
            && !dir.trim().is_empty()
        {
            return PathBuf::from(dir);
        }
        if let Some(cwd) = self.cwd.as_deref()
            && !cwd.trim().is_empty()
        {
            return PathBuf::from(cwd);
        }
        Config::project_dir()
    }
}

/// Result of a hook handler
#[derive(Debug, Clone, PartialEq)]
pub enum HookResult {
    /// Allow the action to proceed
    Allow,
    /// Block the action (exit code 2)
    Block { reason: String },
    /// Allow, but hand `reason` back to the model
    Feedback { reason: String },
    /// Error occurred (logged but allows action)
    Error { message: String },
}

impl HookResult {
    pub fn exit_code(&self) -> i32 {
        match self {
            HookResult::Block { .. } => 2,
            HookResult::Allow | HookResult::Feedback { .. } | HookResult::Error { .. } => 0,
        }
    }

    /// Decision JSON for stdout, if the host should see one
    pub fn decision(&self) -> Option<Value> {
        match self {
            HookResult::Block { reason } | HookResult::Feedback { reason } => {
                Some(serde_json::json!({ "decision": "block", "reason": reason }))
            }
            HookResult::Allow | HookResult::Error { .. } => None,
        }
    }
}

/// A hook handler
pub trait HookHandler {
    fn name(&self) -> &'static str;
    fn handles(&self, event: HookEvent) -> bool;
    fn handle(&self, event: HookEvent, input: &HookInput) -> HookResult;
}

/// Every handler, in dispatch order, bound to one project directory
pub fn handlers(config: &Config, project_dir: &Path) -> Vec<Box<dyn HookHandler>> {
    vec![
        Box::new(lifecycle::SessionLifecycle::new(config.clone(), project_dir)),
        Box::new(guard::PreToolGuard::new(config.clone(), project_dir)),
        Box::new(scan::PostToolScanner::new(config.clone(), project_dir)),
    ]
}

/// Turn a handler's internal failure into a logged, non-blocking result
pub(crate) fn fail_open(handler: &str, result: eyre::Result<HookResult>) -> HookResult {
    result.unwrap_or_else(|e| HookResult::Error {
        message: format!("{}: {:#}", handler, e),
    })
}
