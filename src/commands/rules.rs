use colored::*;
use eyre::{Context, Result};
use serde_json::{Value, json};

use crate::cli::RulesAction;
use crate::config::Config;
use crate::hook::guard::format_block_reason;
use crate::policy::{Blocklist, RuleOrigin};
use crate::scanner::{RuleScanner, Severity, scan_filtered};

pub fn run(action: RulesAction, config: &Config) -> Result<()> {
    match action {
        RulesAction::List => list(config),
        RulesAction::Test { text, tool } => test(&text, &tool, config),
    }
}

fn list(config: &Config) -> Result<()> {
    let project_dir = Config::project_dir();
    let blocklist = Blocklist::load(&project_dir);

    println!("{}", "Blocklist".bold());
    match &blocklist.source {
        Some(path) => println!("  compliance: {}", path.display().to_string().dimmed()),
        None => println!("  compliance: {}", "(none)".dimmed()),
    }
    for (label, rules) in [("Bash", &blocklist.bash), ("Write/Edit", &blocklist.content)] {
        println!();
        println!("  {} ({})", label.cyan(), rules.len());
        for rule in rules.iter() {
            let origin = match rule.origin {
                RuleOrigin::Default => "default".dimmed(),
                RuleOrigin::Compliance => "compliance".magenta(),
            };
            println!("    {} {} [{}] {}", "•".green(), rule.id, origin, rule.reason.dimmed());
        }
    }

    let scanner = RuleScanner::discover(config, &project_dir).context("Failed to load threat rules")?;
    println!();
    println!("{}", "Threat rules".bold());
    match scanner.source() {
        Some(dir) => println!("  source: {}", dir.display().to_string().dimmed()),
        None => println!("  source: {}", "builtin".dimmed()),
    }
    println!("  minimum severity: {}", config.min_severity);
    println!();
    for rule in scanner.rules() {
        println!(
            "    {} {:<40} {:<8} {}",
            "•".green(),
            rule.name,
            severity_label(rule.severity),
            rule.description.dimmed()
        );
    }

    Ok(())
}

fn test(text: &str, tool: &str, config: &Config) -> Result<()> {
    let project_dir = Config::project_dir();
    let tool_input = tool_input_for(tool, text);

    println!("{} {}", "Tool:".bold(), tool);

    let blocklist = Blocklist::load(&project_dir);
    match blocklist.check(tool, &tool_input) {
        Some(hit) => println!("  {} blocklist: {} ({})", "✗".red(), hit.reason, hit.id.dimmed()),
        None => println!("  {} blocklist: no match", "✓".green()),
    }

    let scanner = RuleScanner::discover(config, &project_dir).context("Failed to load threat rules")?;
    let detections = scan_filtered(&scanner, text, config)?;
    if detections.is_empty() {
        println!("  {} scanner: clean", "✓".green());
        return Ok(());
    }

    for d in &detections {
        println!("  {} {} {}", severity_label(d.severity), d.rule_name, d.description.dimmed());
        if !d.matched_keywords.is_empty() {
            println!("      keywords: {}", d.matched_keywords.join(", "));
        }
    }

    if detections.iter().any(|d| d.severity.is_blocking()) {
        println!("  {} pre-tool: {}", "✗".red(), format_block_reason(&detections));
    } else {
        println!("  {} pre-tool: allowed, post-tool would warn", "!".yellow());
    }

    Ok(())
}

/// Shape `text` the way the named tool carries it
fn tool_input_for(tool: &str, text: &str) -> Value {
    match tool {
        "Bash" => json!({ "command": text }),
        "Write" => json!({ "file_path": "untitled", "content": text }),
        "Edit" | "MultiEdit" => json!({ "file_path": "untitled", "new_string": text }),
        _ => json!({ "prompt": text }),
    }
}

fn severity_label(severity: Severity) -> ColoredString {
    let label = severity.as_str().to_uppercase();
    match severity {
        Severity::Critical => label.red().bold(),
        Severity::High => label.red(),
        Severity::Medium => label.yellow(),
        Severity::Low => label.normal(),
    }
}
