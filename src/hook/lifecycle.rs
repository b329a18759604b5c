//! Session start and end
//!
//! SessionStart opens a fresh session log. SessionEnd renders the HTML
//! report and archives the log.

use eyre::Result;
use std::path::PathBuf;

use super::{HookEvent, HookHandler, HookInput, HookResult, fail_open};
use crate::config::Config;
use crate::report::{render_session, save_report};
use crate::session::{SessionStore, is_valid_session_id};
use crate::session::record::parse_utc;

/// Session lifecycle hook handler
pub struct SessionLifecycle {
    config: Config,
    project_dir: PathBuf,
}

impl SessionLifecycle {
    pub fn new(config: Config, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            project_dir: project_dir.into(),
        }
    }

    fn start(&self, input: &HookInput) -> Result<HookResult> {
        let store = SessionStore::new(&self.project_dir);

        if input.source.as_deref() == Some("resume")
            && let Some(active) = store.active_session()
        {
            log::info!("Resuming session {}", active);
            store.active_or_init()?;
            return Ok(HookResult::Allow);
        }

        let session_id = store.start_session()?;
        log::info!("Started session {} in {}", session_id, store.project_dir().display());
        Ok(HookResult::Allow)
    }

    fn end(&self, input: &HookInput) -> Result<HookResult> {
        let project_dir = &self.project_dir;
        let store = SessionStore::new(project_dir);

        let payload_id = input.session_id.clone().filter(|s| !s.trim().is_empty());
        let Some(session_id) = store.active_session().or(payload_id) else {
            log::warn!("No active session and no session_id in payload, nothing to finalize");
            return Ok(HookResult::Allow);
        };
        if !is_valid_session_id(&session_id) {
            log::warn!("Refusing to finalize session with unsafe id {:?}", session_id);
            return Ok(HookResult::Allow);
        }

        if self.config.hooks.report_enabled {
            let records = store.read_records(&session_id).unwrap_or_else(|e| {
                log::warn!("Reporting on empty session {}: {:#}", session_id, e);
                Vec::new()
            });
            let session_end = input.session_end_time.as_deref().and_then(parse_utc);
            let (_, html) = render_session(
                records,
                &session_id,
                session_end,
                &self.config,
                self.config.ai_summary_enabled,
            );

            let report_path = self
                .config
                .report_output_dir(project_dir)
                .join(format!("{}.html", session_id));
            if save_report(&html, &report_path) {
                log::info!("Report saved: {}", report_path.display());
            } else {
                log::warn!("Failed to save report to {}", report_path.display());
            }
        }

        store.finalize(&session_id)?;
        Ok(HookResult::Allow)
    }
}

impl HookHandler for SessionLifecycle {
    fn name(&self) -> &'static str {
        "session-lifecycle"
    }

    fn handles(&self, event: HookEvent) -> bool {
        match event {
            HookEvent::SessionStart => self.config.hooks.capture_enabled,
            HookEvent::SessionEnd => true,
            _ => false,
        }
    }

    fn handle(&self, event: HookEvent, input: &HookInput) -> HookResult {
        let result = match event {
            HookEvent::SessionStart => self.start(input),
            HookEvent::SessionEnd => self.end(input),
            _ => Ok(HookResult::Allow),
        };
        fail_open(self.name(), result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{EventRecord, Verdict};
    use std::fs;
    use tempfile::TempDir;

    fn input() -> HookInput {
        HookInput::default()
    }

    fn offline_config() -> Config {
        Config {
            ai_summary_enabled: false,
            ..Config::default()
        }
    }

    #[test]
    fn test_start_creates_active_session() {
        let temp = TempDir::new().unwrap();
        let handler = SessionLifecycle::new(offline_config(), temp.path());

        assert_eq!(handler.handle(HookEvent::SessionStart, &input()), HookResult::Allow);

        let store = SessionStore::new(temp.path());
        let session_id = store.active_session().unwrap();
        assert!(store.log_path(&session_id).exists());
    }

    #[test]
    fn test_resume_keeps_active_session() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path());
        let existing = store.start_session().unwrap();
        let handler = SessionLifecycle::new(offline_config(), temp.path());

        let mut resume = input();
        resume.source = Some("resume".to_string());
        handler.handle(HookEvent::SessionStart, &resume);
        assert_eq!(store.active_session(), Some(existing.clone()));

        let mut startup = input();
        startup.source = Some("startup".to_string());
        handler.handle(HookEvent::SessionStart, &startup);
        assert_ne!(store.active_session(), Some(existing));
    }

    #[test]
    fn test_end_writes_report_and_archives() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path());
        let session_id = store.start_session().unwrap();
        store
            .append_event(
                &session_id,
                &EventRecord {
                    id: 1,
                    tool_name: "Bash".to_string(),
                    nova_verdict: Verdict::Warned,
                    ..EventRecord::default()
                },
            )
            .unwrap();

        let handler = SessionLifecycle::new(offline_config(), temp.path());
        assert_eq!(handler.handle(HookEvent::SessionEnd, &input()), HookResult::Allow);

        let report = temp
            .path()
            .join(".nova-tracer")
            .join("reports")
            .join(format!("{}.html", session_id));
        let html = fs::read_to_string(report).unwrap();
        assert!(html.contains(">WARNINGS<"));
        assert!(html.contains("Session completed: 1 tool calls"));

        assert!(store.active_session().is_none());
        assert!(store.archive_path(&session_id).exists());
    }

    #[test]
    fn test_end_without_any_session_is_noop() {
        let temp = TempDir::new().unwrap();
        let handler = SessionLifecycle::new(offline_config(), temp.path());
        assert_eq!(handler.handle(HookEvent::SessionEnd, &input()), HookResult::Allow);
        assert!(!temp.path().join(".nova-tracer").join("reports").exists());
    }

    #[test]
    fn test_end_falls_back_to_payload_session_id() {
        let temp = TempDir::new().unwrap();
        let handler = SessionLifecycle::new(offline_config(), temp.path());
        let mut end = input();
        end.session_id = Some("host-session-1".to_string());

        assert_eq!(handler.handle(HookEvent::SessionEnd, &end), HookResult::Allow);
        assert!(
            temp.path()
                .join(".nova-tracer")
                .join("reports")
                .join("host-session-1.html")
                .exists()
        );
    }

    #[test]
    fn test_end_rejects_traversal_session_id() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("project");
        fs::create_dir_all(&project).unwrap();
        let handler = SessionLifecycle::new(offline_config(), &project);

        let mut end = input();
        end.session_id = Some("../../../escaped".to_string());

        assert_eq!(handler.handle(HookEvent::SessionEnd, &end), HookResult::Allow);
        assert!(!temp.path().join("escaped.html").exists());
        assert!(!project.join(".nova-tracer").join("reports").exists());
        assert!(!project.join(".nova-tracer").join("sessions").join("archive").exists());
    }
}
