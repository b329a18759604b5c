//! Pre-tool guard
//!
//! Blocks dangerous tool calls before they execute: first against the
//! regex blocklist, then against the threat scanner for high-severity
//! detections.

use chrono::Utc;
use eyre::Result;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::{HookEvent, HookHandler, HookInput, HookResult, fail_open};
use crate::config::Config;
use crate::policy::Blocklist;
use crate::scanner::{Detection, RuleScanner, Severity, scan_filtered};
use crate::session::capture::extract_input_text;
use crate::session::{Assessment, EventRecord, SessionStore, Verdict};

/// Inputs shorter than this are not worth scanning
const MIN_SCAN_LENGTH: usize = 10;

/// Pre-tool guard hook handler
pub struct PreToolGuard {
    config: Config,
    project_dir: PathBuf,
}

impl PreToolGuard {
    pub fn new(config: Config, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            project_dir: project_dir.into(),
        }
    }

    fn evaluate(&self, input: &HookInput) -> Result<HookResult> {
        let project_dir = &self.project_dir;
        let tool_name = input.tool_name();

        let blocklist = Blocklist::load(project_dir);
        if let Some(hit) = blocklist.check(tool_name, &input.tool_input) {
            let assessment = Assessment {
                verdict: Verdict::Blocked,
                severity: Some(Severity::Critical),
                rules_matched: vec![hit.id],
            };
            self.record_block(project_dir, input, assessment, 0);
            return Ok(HookResult::Block {
                reason: format!("[NOVA] Blocked: {}", hit.reason),
            });
        }

        let text = extract_input_text(&input.tool_input);
        if text.chars().count() >= MIN_SCAN_LENGTH {
            let started = Instant::now();
            let scanned = RuleScanner::discover(&self.config, project_dir)
                .and_then(|scanner| scan_filtered(&scanner, &text, &self.config));
            let scan_ms = started.elapsed().as_millis() as u64;

            match scanned {
                Ok(detections) if detections.iter().any(|d| d.severity.is_blocking()) => {
                    let reason = format_block_reason(&detections);
                    self.record_block(project_dir, input, Assessment::from_detections(&detections), scan_ms);
                    return Ok(HookResult::Block { reason });
                }
                Ok(detections) => {
                    log::debug!("Pre-tool scan of {}: {} non-blocking detections", tool_name, detections.len());
                }
                Err(e) => log::warn!("Pre-tool scan failed, allowing {}: {:#}", tool_name, e),
            }
        }

        if self.config.hooks.capture_enabled {
            let store = SessionStore::new(project_dir);
            let session_id = store.active_or_init()?;
            store.record_tool_start(&session_id, input.tool_use_id.as_deref())?;
        }

        Ok(HookResult::Allow)
    }

    /// Log the vetoed call; the post-tool hook never sees it
    fn record_block(&self, project_dir: &Path, input: &HookInput, assessment: Assessment, scan_ms: u64) {
        if !self.config.hooks.capture_enabled {
            return;
        }

        let store = SessionStore::new(project_dir);
        let recorded = store.active_or_init().and_then(|session_id| {
            let now = Utc::now();
            let mut event = EventRecord::for_tool(
                store.next_event_id(&session_id),
                input.tool_name(),
                &input.tool_input,
                now,
                now,
            );
            event.apply(assessment);
            event.nova_scan_time_ms = scan_ms;
            store.append_event(&session_id, &event)
        });

        if let Err(e) = recorded {
            log::warn!("Failed to record blocked {} call: {:#}", input.tool_name(), e);
        }
    }
}

impl HookHandler for PreToolGuard {
    fn name(&self) -> &'static str {
        "pre-tool-guard"
    }

    fn handles(&self, event: HookEvent) -> bool {
        self.config.hooks.guard_enabled && event == HookEvent::PreToolUse
    }

    fn handle(&self, _event: HookEvent, input: &HookInput) -> HookResult {
        fail_open(self.name(), self.evaluate(input))
    }
}

/// Block reason naming the first high-severity rule
pub fn format_block_reason(detections: &[Detection]) -> String {
    match detections.iter().find(|d| d.severity.is_blocking()) {
        Some(d) if !d.description.is_empty() => format!("[NOVA] Blocked: {} - {}", d.rule_name, d.description),
        Some(d) => format!("[NOVA] Blocked: {}", d.rule_name),
        None => "[NOVA] Blocked: High-severity threat detected".to_string(),
    }
}
