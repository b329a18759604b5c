use colored::*;
use eyre::{Context, Result};
use std::io::{self, Read};

use crate::cli::HookAction;
use crate::config::Config;
use crate::hook::{self, HookEvent, HookInput, HookResult};

/// Exit codes for hook dispatch
/// These match Claude Code's expectations
pub const EXIT_ALLOW: i32 = 0;
pub const EXIT_BLOCK: i32 = 2;

pub fn run(action: HookAction, config: &Config) -> Result<()> {
    match action {
        HookAction::Dispatch { event, payload } => dispatch(&event, payload.as_deref(), config),
        HookAction::List { event } => list(event.as_deref(), config),
    }
}

fn dispatch(event: &str, payload: Option<&str>, config: &Config) -> Result<()> {
    let result = evaluate(event, payload, config);

    if let Some(decision) = result.decision() {
        println!("{}", decision);
    }

    let code = result.exit_code();
    if code == EXIT_BLOCK {
        log::warn!("Hook {} blocked the tool call", event);
    } else {
        log::info!("Hook {} finished with exit code {}", event, code);
    }
    std::process::exit(code);
}

/// Resolve a hook invocation to a result. Anything unreadable allows.
fn evaluate(event: &str, payload: Option<&str>, config: &Config) -> HookResult {
    let Some(hook_event) = HookEvent::from_str(event) else {
        log::warn!("Unknown hook event: {}", event);
        return HookResult::Allow;
    };

    let input = match read_payload(payload) {
        Ok(input) => input,
        Err(e) => {
            log::warn!("Ignoring {} with unreadable payload: {:#}", hook_event, e);
            return HookResult::Allow;
        }
    };

    log::info!("Dispatching hook event: {} (tool: {})", hook_event, input.tool_name());
    log::debug!("Payload: {:?}", input);

    let project_dir = input.project_dir();
    log::debug!("Project directory: {}", project_dir.display());
    hook::dispatch(hook_event, &input, &hook::handlers(config, &project_dir))
}

fn read_payload(payload: Option<&str>) -> Result<HookInput> {
    // Read payload from stdin if not provided
    let payload_str = match payload {
        Some(p) => p.to_string(),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read payload from stdin")?;
            buffer
        }
    };

    if payload_str.trim().is_empty() {
        eyre::bail!("Empty payload");
    }

    serde_json::from_str(&payload_str).context("Failed to parse payload JSON")
}

fn list(event_filter: Option<&str>, config: &Config) -> Result<()> {
    let events: Vec<HookEvent> = match event_filter {
        Some(name) => match HookEvent::from_str(name) {
            Some(event) => vec![event],
            None => eyre::bail!("Unknown hook event: {}", name),
        },
        None => HookEvent::ALL.to_vec(),
    };

    println!("{}", "Registered hook handlers:".bold());
    println!();

    let handlers = hook::handlers(config, &Config::project_dir());
    for event in events {
        let names: Vec<&str> = handlers
            .iter()
            .filter(|h| h.handles(event))
            .map(|h| h.name())
            .collect();

        if names.is_empty() {
            if event_filter.is_some() {
                println!("  {} {}", event.to_string().cyan(), "(no handlers)".dimmed());
            }
            continue;
        }

        println!("  {}", event.to_string().cyan());
        for name in names {
            println!("    {} {}", "•".green(), name);
        }
    }

    println!();
    println!(
        "  guard: {}  capture: {}  report: {}",
        on_off(config.hooks.guard_enabled),
        on_off(config.hooks.capture_enabled),
        on_off(config.hooks.report_enabled)
    );

    Ok(())
}

fn on_off(enabled: bool) -> ColoredString {
    if enabled { "on".green() } else { "off".yellow() }
}
