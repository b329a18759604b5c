use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "nova-tracer",
    about = "Prompt-injection guard and session tracer for Claude Code hooks",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/nova-tracer/logs/nova-tracer.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config.yaml")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Hook event handling (called by Claude Code)
    Hook {
        #[command(subcommand)]
        action: HookAction,
    },

    /// Render an HTML report from a session log
    Report {
        /// Session log (.jsonl)
        log: PathBuf,

        /// Output file (defaults to the log path with .html)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the AI summary and use session statistics only
        #[arg(long)]
        no_ai: bool,
    },

    /// Inspect the blocklist and threat rules
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum HookAction {
    /// Dispatch a hook event to handlers
    Dispatch {
        /// Event type (pre-tool-use, post-tool-use, session-start, session-end, etc.)
        event: String,

        /// Event payload JSON (reads from stdin if not provided)
        #[arg(long)]
        payload: Option<String>,
    },

    /// List registered hook handlers
    List {
        /// Filter by event type
        #[arg(long)]
        event: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum RulesAction {
    /// Show the effective blocklist and loaded threat rules
    List,

    /// Show what the guard and scanner decide for some text
    Test {
        /// Text to evaluate
        text: String,

        /// Tool the text belongs to (Bash checks commands, Write checks file content)
        #[arg(long, default_value = "Bash")]
        tool: String,
    },
}
