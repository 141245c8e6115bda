mod config;
mod error;
mod event;
mod history;
mod permission;
mod reload;
mod runner;
mod watch;

use crate::config::{ConfigSource, DEFAULT_CONFIG_FILE};
use crate::event::{Event, EventHandler, EventSink};
use crate::history::ExecutionLog;
use crate::permission::FsAccess;
use crate::reload::ConfigWatcher;
use crate::watch::session::{SessionState, WatchSession};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Run shell commands when watched files are saved")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Directory to watch, overriding the configured path
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Print each execution record as a JSON line
    #[arg(long)]
    json: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default configuration file
    Init,
    /// Validate a configuration file and show what would be watched
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match cli.command {
        Some(Command::Init) => {
            config::write_default(&cli.config)?;
            println!("Wrote {}", cli.config.display());
            Ok(())
        }
        Some(Command::Check) => check(&cli),
        None => run(&cli),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {e}"))
}

fn load(cli: &Cli) -> Result<ConfigSource> {
    let source = ConfigSource::load(&cli.config)?;
    Ok(match &cli.path {
        Some(path) => source.with_explicit_path(&absolute(path)?),
        None => source,
    })
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path {}", path.display()))
}

fn check(cli: &Cli) -> Result<()> {
    let source = load(cli)?;
    let config = &source.config;
    println!("config:   {}", source.path.display());
    println!("root:     {}", source.root().display());
    println!("debounce: {:.2}s", config.debounce_delay.as_secs_f64());
    println!("shell:    {}", config.shell().unwrap_or(runner::DEFAULT_SHELL));
    if !config.ignore_dirs.is_empty() {
        println!("ignore:   {}", config.ignore_dirs.join(", "));
    }
    for rule in &config.watchers {
        println!("- {} [{}]: {}", rule.name, rule.patterns.join(" "), rule.command);
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let source = load(cli)?;
    let events = EventHandler::new();

    let mut session = WatchSession::new(
        Arc::new(EventSink::new(events.tx())),
        Box::new(FsAccess),
    )
    .context("Failed to start event coordinator")?;
    let config_path = source.path.clone();
    restart(&mut session, source);

    // Without hot reload the watcher still works, it just needs a restart
    let _reload = match ConfigWatcher::new(&config_path, events.tx()) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!("config file changes will not be picked up: {e:#}");
            None
        }
    };
    if let Err(e) = event::spawn_quit_reader(io::BufReader::new(io::stdin()), events.tx()) {
        warn!("type-to-quit unavailable: {e}");
    }

    let mut log = ExecutionLog::new();
    loop {
        match events.next()? {
            Event::Record(record) => {
                log.append(record);
                report(&log, cli.json)?;
            }
            Event::ConfigChanged => match load(cli) {
                Ok(source) => restart(&mut session, source),
                Err(e) => warn!("keeping previous configuration: {e:#}"),
            },
            Event::Quit => break,
        }
    }

    session.stop();
    info!("stopped, {} of the last {} runs failed", log.failures(), log.len());
    Ok(())
}

fn restart(session: &mut WatchSession, source: ConfigSource) {
    let root = source.root();
    session.reconfigure(source.config, root);
    if session.state() != SessionState::Running {
        warn!("not watching until the configuration or root is fixed");
    }
}

fn report(log: &ExecutionLog, json: bool) -> Result<()> {
    let Some(record) = log.latest() else {
        return Ok(());
    };
    if json {
        println!("{}", serde_json::to_string(record)?);
        return Ok(());
    }

    let mark = if record.success { "ok" } else { "FAILED" };
    println!(
        "[{}] {} {} :: {}",
        record.timestamp.format("%H:%M:%S"),
        mark,
        record.file,
        record.command
    );
    for line in record.output.lines() {
        println!("    {line}");
    }
    let failures = log.failures();
    if !record.success && failures > 1 {
        info!("{failures} of the last {} runs failed", log.len());
    }
    Ok(())
}
