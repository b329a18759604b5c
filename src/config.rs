use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::scanner::Severity;

/// Directory under the project root that holds sessions, reports and overrides
pub const PROJECT_STATE_DIR: &str = ".nova-tracer";

/// Main nova-tracer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub log_level: LogLevel,
    /// Mirror log output to stderr at debug level
    pub debug: bool,
    /// Detections below this severity are ignored
    pub min_severity: Severity,
    /// Scanner input cap, in characters
    pub max_content_length: usize,
    /// Stored tool output cap, in bytes
    pub max_output_bytes: usize,
    /// Explicit threat rules directory (overrides the search chain)
    pub rules_dir: Option<PathBuf>,
    /// Where session reports are written (defaults to <project>/.nova-tracer/reports)
    pub report_output_dir: Option<PathBuf>,
    pub ai_summary_enabled: bool,
    /// Model used for the session summary
    pub model: String,
    pub hooks: HooksConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HooksConfig {
    pub guard_enabled: bool,
    pub capture_enabled: bool,
    pub report_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn as_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Off => log::LevelFilter::Off,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            debug: false,
            min_severity: Severity::Low,
            max_content_length: 50_000,
            max_output_bytes: crate::session::MAX_OUTPUT_SIZE,
            rules_dir: None,
            report_output_dir: None,
            ai_summary_enabled: true,
            model: crate::ai_summary::HAIKU_MODEL.to_string(),
            hooks: HooksConfig::default(),
        }
    }
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            guard_enabled: true,
            capture_enabled: true,
            report_enabled: true,
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Check NOVA_TRACER_CONFIG env var
        if let Ok(env_path) = std::env::var("NOVA_TRACER_CONFIG") {
            let path = PathBuf::from(env_path);
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from NOVA_TRACER_CONFIG: {}", e);
                    }
                }
            }
        }

        let mut candidates = vec![Self::project_dir().join(PROJECT_STATE_DIR).join("config.yaml")];
        if let Some(home) = Self::install_dir() {
            candidates.push(home.join("config.yaml"));
        }
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("nova-tracer").join("config.yaml"));
        }

        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", path.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// The project the host is working in: CLAUDE_PROJECT_DIR, else the current directory
    pub fn project_dir() -> PathBuf {
        std::env::var("CLAUDE_PROJECT_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Installation directory holding shared rules and compliance config
    pub fn install_dir() -> Option<PathBuf> {
        std::env::var("NOVA_TRACER_HOME")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|s| Self::expand_path(Path::new(&s)))
    }

    /// Where the session report for `project_dir` should be written
    pub fn report_output_dir(&self, project_dir: &Path) -> PathBuf {
        match &self.report_output_dir {
            Some(dir) => {
                let expanded = Self::expand_path(dir);
                if expanded.is_absolute() {
                    expanded
                } else {
                    project_dir.join(expanded)
                }
            }
            None => project_dir.join(PROJECT_STATE_DIR).join("reports"),
        }
    }

    /// Expand a path that may contain ~ or env vars
    pub fn expand_path(path: &Path) -> PathBuf {
        let path_str = path.to_string_lossy();
        let expanded = shellexpand::full(&path_str).unwrap_or_else(|_| path_str.clone());
        PathBuf::from(expanded.as_ref())
    }
}
