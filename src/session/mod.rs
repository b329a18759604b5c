//! Per-project session logs
//!
//! Layout under `<project>/.nova-tracer/sessions/`:
//! - `<session_id>.jsonl` - init record followed by event records
//! - `.active` - id of the session currently being written
//! - `<session_id>.start` - pending tool-start marker left by the pre-tool hook
//! - `archive/` - finalized logs

use chrono::{DateTime, Local, Utc};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub mod capture;
pub mod record;
pub mod summary;

pub use record::{Assessment, EventRecord, InitRecord, LogRecord, Verdict};
pub use summary::SessionData;

use crate::config::PROJECT_STATE_DIR;

/// Stored tool output cap, in bytes
pub const MAX_OUTPUT_SIZE: usize = 10 * 1024;

const ACTIVE_MARKER: &str = ".active";
const ARCHIVE_DIR: &str = "archive";

/// New session id: local time plus a random 6 hex char suffix
pub fn generate_session_id() -> String {
    let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", stamp, &suffix[..6])
}

/// Whether `id` is safe to use as a file name under the sessions directory
pub fn is_valid_session_id(id: &str) -> bool {
    !id.trim().is_empty()
        && !id.contains(['/', '\\', '\0'])
        && !id.contains("..")
        && !Path::new(id).is_absolute()
}

/// Pending start of a tool call, written by the pre-tool hook
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolStart {
    pub tool_use_id: Option<String>,
    pub timestamp: String,
}

/// Session log store rooted at a project directory
#[derive(Debug, Clone)]
pub struct SessionStore {
    project_dir: PathBuf,
}

impl SessionStore {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.project_dir.join(PROJECT_STATE_DIR).join("sessions")
    }

    pub fn log_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir().join(format!("{}.jsonl", session_id))
    }

    pub fn archive_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir()
            .join(ARCHIVE_DIR)
            .join(format!("{}.jsonl", session_id))
    }

    fn active_path(&self) -> PathBuf {
        self.sessions_dir().join(ACTIVE_MARKER)
    }

    fn start_marker_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir().join(format!("{}.start", session_id))
    }

    /// Write the init record for `session_id` unless its log already exists
    pub fn init_session(&self, session_id: &str) -> Result<PathBuf> {
        let path = self.log_path(session_id);
        if path.exists() {
            log::debug!("Session log already exists: {}", path.display());
            return Ok(path);
        }

        let init = LogRecord::Init(InitRecord {
            session_id: session_id.to_string(),
            session_start: Some(record::format_utc(Utc::now())),
            project_dir: Some(self.project_dir.display().to_string()),
            platform: Some(std::env::consts::OS.to_string()),
            nova_version: Some(record::NOVA_VERSION.to_string()),
        });
        self.append_record(session_id, &init)?;

        log::info!("Initialized session {} at {}", session_id, path.display());
        Ok(path)
    }

    /// Mark `session_id` as the session new events go to
    pub fn set_active(&self, session_id: &str) -> Result<()> {
        let dir = self.sessions_dir();
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create sessions directory {}", dir.display()))?;
        fs::write(self.active_path(), session_id).context("Failed to write active session marker")?;
        Ok(())
    }

    /// Id of the active session, if any
    pub fn active_session(&self) -> Option<String> {
        fs::read_to_string(self.active_path())
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| {
                let valid = is_valid_session_id(s);
                if !valid && !s.is_empty() {
                    log::warn!("Ignoring invalid active session id {:?}", s);
                }
                valid
            })
    }

    /// Create a fresh session and make it active
    pub fn start_session(&self) -> Result<String> {
        let session_id = generate_session_id();
        self.init_session(&session_id)?;
        self.set_active(&session_id)?;
        Ok(session_id)
    }

    /// The active session, starting one when there is none
    pub fn active_or_init(&self) -> Result<String> {
        match self.active_session() {
            Some(session_id) => {
                if !self.log_path(&session_id).exists() {
                    self.init_session(&session_id)?;
                }
                Ok(session_id)
            }
            None => self.start_session(),
        }
    }

    /// Next event id: existing event lines plus one. Any read problem yields 1.
    pub fn next_event_id(&self, session_id: &str) -> u64 {
        let Ok(content) = fs::read_to_string(self.log_path(session_id)) else {
            return 1;
        };

        let events = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
            .filter(|value| value.get("type").and_then(|t| t.as_str()) == Some("event"))
            .count() as u64;

        events + 1
    }

    pub fn append_event(&self, session_id: &str, event: &EventRecord) -> Result<()> {
        self.append_record(session_id, &LogRecord::Event(event.clone()))
    }

    fn append_record(&self, session_id: &str, record: &LogRecord) -> Result<()> {
        let log_path = self.log_path(session_id);

        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent).context("Failed to create sessions directory")?;
        }

        let json_line = serde_json::to_string(record).context("Failed to serialize record")?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open session log: {}", log_path.display()))?;

        writeln!(file, "{}", json_line).context("Failed to write record")?;
        Ok(())
    }

    /// Parsed records of a session log
    pub fn read_records(&self, session_id: &str) -> Result<Vec<LogRecord>> {
        read_log_file(&self.log_path(session_id))
    }

    #[cfg(test)]
    pub fn read_events(&self, session_id: &str) -> Result<Vec<EventRecord>> {
        Ok(self
            .read_records(session_id)?
            .into_iter()
            .filter_map(|r| match r {
                LogRecord::Event(e) => Some(e),
                LogRecord::Init(_) => None,
            })
            .collect())
    }

    /// Remember that a tool call started now
    pub fn record_tool_start(&self, session_id: &str, tool_use_id: Option<&str>) -> Result<()> {
        let marker = ToolStart {
            tool_use_id: tool_use_id.map(|s| s.to_string()),
            timestamp: record::format_utc(Utc::now()),
        };
        let dir = self.sessions_dir();
        fs::create_dir_all(&dir).context("Failed to create sessions directory")?;
        let json = serde_json::to_string(&marker).context("Failed to serialize tool start")?;
        fs::write(self.start_marker_path(session_id), json).context("Failed to write tool start marker")?;
        Ok(())
    }

    /// Consume the start marker matching `tool_use_id`.
    ///
    /// A marker matches when both ids agree or either side has none; a marker
    /// for a different call is left in place.
    pub fn take_tool_start(&self, session_id: &str, tool_use_id: Option<&str>) -> Option<DateTime<Utc>> {
        let path = self.start_marker_path(session_id);
        let content = fs::read_to_string(&path).ok()?;
        let marker: ToolStart = match serde_json::from_str(&content) {
            Ok(marker) => marker,
            Err(e) => {
                log::warn!("Discarding unreadable tool start marker: {}", e);
                let _ = fs::remove_file(&path);
                return None;
            }
        };

        let matches = match (marker.tool_use_id.as_deref(), tool_use_id) {
            (Some(stored), Some(current)) => stored == current,
            _ => true,
        };
        if !matches {
            return None;
        }

        let _ = fs::remove_file(&path);
        record::parse_utc(&marker.timestamp)
    }

    /// Archive the session log and clear the active and start markers
    pub fn finalize(&self, session_id: &str) -> Result<()> {
        let log_path = self.log_path(session_id);
        if log_path.exists() {
            let archived = self.archive_path(session_id);
            if let Some(parent) = archived.parent() {
                fs::create_dir_all(parent).context("Failed to create archive directory")?;
            }
            fs::rename(&log_path, &archived)
                .with_context(|| format!("Failed to archive session log {}", log_path.display()))?;
            log::info!("Archived session {} to {}", session_id, archived.display());
        }

        let _ = fs::remove_file(self.start_marker_path(session_id));
        if self.active_session().as_deref() == Some(session_id) {
            fs::remove_file(self.active_path()).context("Failed to clear active session marker")?;
        }
        Ok(())
    }
}

/// Parse a session log file, skipping malformed lines
pub fn read_log_file(path: &Path) -> Result<Vec<LogRecord>> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read session log {}", path.display()))?;

    let mut records = Vec::new();
    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("Skipping malformed line {} in {}: {}", number + 1, path.display(), e),
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn event(id: u64, tool: &str) -> EventRecord {
        EventRecord {
            id,
            tool_name: tool.to_string(),
            ..EventRecord::default()
        }
    }

    #[test]
    fn test_session_id_format() {
        let id = generate_session_id();
        // YYYY-MM-DD_HH-MM-SS_xxxxxx
        assert_eq!(id.len(), 26);
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 10);
        assert_eq!(parts[1].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_session_id_validation() {
        assert!(is_valid_session_id(&generate_session_id()));
        assert!(is_valid_session_id("host-session-1"));
        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("   "));
        assert!(!is_valid_session_id("../../../escaped"));
        assert!(!is_valid_session_id("a/b"));
        assert!(!is_valid_session_id("a\\b"));
        assert!(!is_valid_session_id(".."));
        assert!(!is_valid_session_id("/tmp/x"));
    }

    #[test]
    fn test_active_session_rejects_traversal_marker() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path());
        fs::create_dir_all(store.sessions_dir()).unwrap();
        fs::write(store.sessions_dir().join(".active"), "../../outside").unwrap();

        assert!(store.active_session().is_none());
        let fresh = store.active_or_init().unwrap();
        assert!(is_valid_session_id(&fresh));
        assert!(store.log_path(&fresh).starts_with(store.sessions_dir()));
    }

    #[test]
    fn test_session_ids_differ() {
        assert_ne!(generate_session_id(), generate_session_id());
    }

    #[test]
    fn test_init_writes_single_init_record() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path());

        let path = store.init_session("s1").unwrap();
        store.init_session("s1").unwrap();

        assert!(path.exists());
        let records = store.read_records("s1").unwrap();
        assert_eq!(records.len(), 1);
        match &records[0] {
            LogRecord::Init(init) => {
                assert_eq!(init.session_id, "s1");
                assert!(init.session_start.is_some());
                assert_eq!(init.nova_version.as_deref(), Some(record::NOVA_VERSION));
            }
            other => panic!("expected init record, got {:?}", other),
        }
    }

    #[test]
    fn test_next_event_id_missing_log() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path());
        assert_eq!(store.next_event_id("nonexistent"), 1);
    }

    #[test]
    fn test_next_event_id_empty_log() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path());
        fs::create_dir_all(store.sessions_dir()).unwrap();
        fs::write(store.log_path("empty"), "").unwrap();
        assert_eq!(store.next_event_id("empty"), 1);
    }

    #[test]
    fn test_next_event_id_counts_only_events() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path());
        store.init_session("s1").unwrap();
        assert_eq!(store.next_event_id("s1"), 1);

        for tool in ["Read", "Edit", "Bash"] {
            let id = store.next_event_id("s1");
            store.append_event("s1", &event(id, tool)).unwrap();
        }

        assert_eq!(store.next_event_id("s1"), 4);
        let ids: Vec<u64> = store.read_events("s1").unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_next_event_id_ignores_malformed_lines() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path());
        store.init_session("s1").unwrap();
        store.append_event("s1", &event(1, "Read")).unwrap();

        let mut file = OpenOptions::new().append(true).open(store.log_path("s1")).unwrap();
        writeln!(file, "not json at all").unwrap();

        assert_eq!(store.next_event_id("s1"), 2);
        assert_eq!(store.read_events("s1").unwrap().len(), 1);
    }

    #[test]
    fn test_active_or_init_reuses_active() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path());
        assert!(store.active_session().is_none());

        let first = store.active_or_init().unwrap();
        let second = store.active_or_init().unwrap();
        assert_eq!(first, second);
        assert_eq!(store.active_session(), Some(first));
    }

    #[test]
    fn test_tool_start_roundtrip_matching_id() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path());
        store.record_tool_start("s1", Some("toolu_1")).unwrap();

        assert!(store.take_tool_start("s1", Some("toolu_2")).is_none());
        assert!(store.take_tool_start("s1", Some("toolu_1")).is_some());
        assert!(store.take_tool_start("s1", Some("toolu_1")).is_none());
    }

    #[test]
    fn test_tool_start_without_ids() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path());
        store.record_tool_start("s1", None).unwrap();
        assert!(store.take_tool_start("s1", Some("toolu_9")).is_some());
    }

    #[test]
    fn test_finalize_archives_and_clears_active() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path());
        let id = store.start_session().unwrap();
        store.append_event(&id, &event(1, "Read")).unwrap();

        store.finalize(&id).unwrap();

        assert!(!store.log_path(&id).exists());
        assert!(store.archive_path(&id).exists());
        assert!(store.active_session().is_none());
        assert_eq!(read_log_file(&store.archive_path(&id)).unwrap().len(), 2);
    }

    #[test]
    fn test_finalize_missing_session_is_ok() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path());
        assert!(store.finalize("ghost").is_ok());
    }
}
