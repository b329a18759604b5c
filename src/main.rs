use clap::Parser;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

mod ai_summary;
mod cli;
mod commands;
mod config;
mod hook;
mod policy;
mod report;
mod scanner;
mod session;

use cli::{Cli, Commands};
use config::{Config, LogLevel};

/// Log sink that mirrors every line to stderr
struct Tee {
    file: fs::File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = io::stderr().write_all(buf);
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stderr().flush();
        self.file.flush()
    }
}

fn setup_logging(log_level: &LogLevel, debug: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nova-tracer")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("nova-tracer.log");

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .context("Failed to open log file")?;

    // RUST_LOG env var takes precedence, otherwise use config log_level
    let mut builder = env_logger::Builder::new();

    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else if debug {
        builder.filter_level(log_level.as_filter().max(log::LevelFilter::Debug));
    } else {
        builder.filter_level(log_level.as_filter());
    }

    let target: Box<dyn Write + Send> = if debug { Box::new(Tee { file }) } else { Box::new(file) };
    builder.target(env_logger::Target::Pipe(target)).try_init()?;

    info!("Logging initialized, writing to: {}", log_file.display());
    info!(
        "Log level: {} (from {})",
        log_level.as_filter(),
        if std::env::var("RUST_LOG").is_ok() { "RUST_LOG env" } else { "config" }
    );
    Ok(())
}

fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Hook { action } => commands::hook::run(action, &config),
        Commands::Report { log, output, no_ai } => commands::report::run(&log, output, no_ai, &config),
        Commands::Rules { action } => commands::rules::run(action, &config),
        Commands::Completions { shell } => commands::completions::run(shell),
    }
}

fn main() -> Result<()> {
    // Parse CLI arguments first. Usage errors exit 2, which the host reads as
    // a block, so hook invocations allow instead.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let args: Vec<String> = std::env::args_os().map(|a| a.to_string_lossy().into_owned()).collect();
            if invoked_as_hook(&args) && e.use_stderr() {
                let _ = e.print();
                std::process::exit(commands::hook::EXIT_ALLOW);
            }
            e.exit();
        }
    };
    let hook_mode = matches!(cli.command, Commands::Hook { .. });

    // Load configuration (before logging, so log messages in Config::load are silent)
    let config = match Config::load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) if hook_mode => {
            let config = Config::default();
            let _ = setup_logging(&config.log_level, config.debug);
            log::warn!("Falling back to default config: {:#}", e);
            return run_hook(cli, config);
        }
        Err(e) => return Err(e).context("Failed to load configuration"),
    };

    if hook_mode {
        let _ = setup_logging(&config.log_level, config.debug);
        return run_hook(cli, config);
    }

    setup_logging(&config.log_level, config.debug).context("Failed to setup logging")?;

    info!("Starting nova-tracer with config from: {:?}", cli.config);

    // Run the command
    run(cli, config).context("Command failed")?;

    Ok(())
}

/// Whether the first subcommand in `args` is `hook`, skipping global options
fn invoked_as_hook(args: &[String]) -> bool {
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                rest.next();
            }
            a if a.starts_with('-') => {}
            a => return a == "hook",
        }
    }
    false
}

/// Hooks never fail the host: any error still exits 0
fn run_hook(cli: Cli, config: Config) -> Result<()> {
    if let Err(e) = run(cli, config) {
        log::error!("Hook failed: {:#}", e);
        std::process::exit(commands::hook::EXIT_ALLOW);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_invoked_as_hook() {
        assert!(invoked_as_hook(&args(&["nova-tracer", "hook", "dispatch"])));
        assert!(invoked_as_hook(&args(&["nova-tracer", "--config", "c.yaml", "hook"])));
        assert!(invoked_as_hook(&args(&["nova-tracer", "-c", "c.yaml", "hook", "dispatch", "--bogus"])));
        assert!(!invoked_as_hook(&args(&["nova-tracer", "report", "hook"])));
        assert!(!invoked_as_hook(&args(&["nova-tracer"])));
    }

    #[test]
    fn test_hook_usage_errors_are_stderr_errors() {
        let missing = Cli::try_parse_from(["nova-tracer", "hook", "dispatch"]).err().unwrap();
        assert!(missing.use_stderr());
        let unknown = Cli::try_parse_from(["nova-tracer", "hook", "dispatch", "PreToolUse", "--matcher", "Bash"])
            .err()
            .unwrap();
        assert!(unknown.use_stderr());
    }
}
