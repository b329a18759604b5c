use colored::*;
use eyre::Result;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::report::{render_session, save_report};
use crate::session::read_log_file;

pub fn run(log: &Path, output: Option<PathBuf>, no_ai: bool, config: &Config) -> Result<()> {
    let records = read_log_file(log)?;

    let fallback_id = log
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let ai_enabled = config.ai_summary_enabled && !no_ai;
    let (data, html) = render_session(records, &fallback_id, None, config, ai_enabled);

    let output = output.unwrap_or_else(|| log.with_extension("html"));
    if !save_report(&html, &output) {
        eyre::bail!("Failed to write report to {}", output.display());
    }

    println!("{} Report written: {}", "✓".green(), output.display());
    println!(
        "  {} events, {} warnings, {} blocked",
        data.summary.total_events,
        data.summary.warnings.to_string().yellow(),
        data.summary.blocked.to_string().red()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn offline() -> Config {
        Config {
            ai_summary_enabled: false,
            ..Config::default()
        }
    }

    #[test]
    fn test_report_defaults_next_to_log() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("2026-01-01_10-00-00_abc123.jsonl");
        fs::write(
            &log,
            concat!(
                r#"{"type":"init","session_id":"2026-01-01_10-00-00_abc123","session_start":"2026-01-01T10:00:00Z","platform":"linux","project_dir":"/p"}"#,
                "\n",
                r#"{"type":"event","id":1,"tool_name":"Read","nova_verdict":"allowed"}"#,
                "\n"
            ),
        )
        .unwrap();

        run(&log, None, false, &offline()).unwrap();

        let html = fs::read_to_string(temp.path().join("2026-01-01_10-00-00_abc123.html")).unwrap();
        assert!(html.contains("2026-01-01_10-00-00_abc123"));
    }

    #[test]
    fn test_report_explicit_output() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("s.jsonl");
        fs::write(&log, "").unwrap();
        let out = temp.path().join("nested").join("out.html");

        run(&log, Some(out.clone()), true, &offline()).unwrap();
        assert!(out.exists());
    }

    #[test]
    fn test_report_missing_log_errors() {
        let temp = TempDir::new().unwrap();
        assert!(run(&temp.path().join("missing.jsonl"), None, true, &offline()).is_err());
    }
}
