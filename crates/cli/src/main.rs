mod config;
mod error;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use persistence::{CrashReport, Event, EventKind, NoCorrelation, ReportPersistence, SessionId};
use retention::RetentionSettings;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{Error, Result};

const CONFIG_FILE: &str = "crashstore.toml";

#[derive(Parser)]
#[command(name = "crashstore")]
#[command(about = "Inspect and maintain an on-device crash report store", long_about = None)]
#[command(version)]
struct Cli {
    /// Report directory (overrides config file)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Config file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Retention settings file (overrides [retention] in the config)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List open sessions, oldest first
    Sessions,
    /// List finalized reports, most recent first
    Reports {
        /// Show only the first N reports
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Show the events of a finalized report
    Show {
        /// Session ID (prefix match supported)
        session: String,
    },
    /// Finalize every open session except the current one
    Finalize {
        /// Session to leave open
        #[arg(short, long)]
        current: Option<String>,
    },
    /// Delete one finalized report, or everything
    Purge {
        /// Session ID of the report to delete (prefix match supported)
        session: Option<String>,
        /// Delete every open session and finalized report
        #[arg(long, conflicts_with = "session")]
        all: bool,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let root = cli
        .root
        .or(config.root)
        .or_else(dirs_data_dir)
        .ok_or(Error::NoRoot)?;

    if !root.exists() {
        return Err(Error::RootNotFound { path: root });
    }
    tracing::debug!(root = %root.display(), "opening report store");
    let settings = match &cli.settings {
        Some(path) => RetentionSettings::load(path)?,
        None => config.retention,
    };
    let engine = ReportPersistence::open(&root, settings, NoCorrelation);

    match cli.command {
        Some(Commands::Sessions) | None => cmd_sessions(&engine),
        Some(Commands::Reports { limit }) => cmd_reports(&engine, limit),
        Some(Commands::Show { session }) => cmd_show(&engine, &session),
        Some(Commands::Finalize { current }) => cmd_finalize(&engine, current.map(SessionId::from)),
        Some(Commands::Purge { session, all }) => cmd_purge(&engine, session.as_deref(), all),
    }
}

fn cmd_sessions(engine: &ReportPersistence) -> Result<()> {
    let sessions = engine.get_open_session_ids();

    if sessions.is_empty() {
        println!("No open sessions.");
        return Ok(());
    }

    println!("{:<48}  STARTED", "SESSION ID");
    println!("{}", "-".repeat(72));

    for session_id in sessions {
        let started = engine
            .get_start_timestamp_millis(&session_id)
            .map_or_else(|| "unknown".to_string(), |ms| format_millis(ms, "%Y-%m-%d %H:%M"));
        println!("{session_id:<48}  {started}");
    }

    Ok(())
}

fn cmd_reports(engine: &ReportPersistence, limit: usize) -> Result<()> {
    let reports = engine.load_finalized_reports();

    if reports.is_empty() {
        println!("No finalized reports.");
        return Ok(());
    }

    println!(
        "{:<48}  {:<20}  {:<6}  PRIORITY",
        "SESSION ID", "ENDED", "EVENTS"
    );
    println!("{}", "-".repeat(96));

    for entry in reports.into_iter().take(limit) {
        let session = &entry.report.session;
        let ended = session
            .end_time_millis
            .map_or_else(|| "-".to_string(), |ms| format_millis(ms, "%Y-%m-%d %H:%M"));
        let priority = if entry.report.native_payload.is_some() {
            "native"
        } else if session.high_priority {
            "high"
        } else {
            "normal"
        };
        println!(
            "{:<48}  {:<20}  {:<6}  {priority}",
            entry.session_id,
            ended,
            entry.report.events.len()
        );
    }

    Ok(())
}

fn cmd_show(engine: &ReportPersistence, session_prefix: &str) -> Result<()> {
    let report = find_report(engine, session_prefix)?;
    let session = &report.session;

    println!("Session: {}", session.id);
    println!(
        "App: {} {} ({})",
        report.app.identifier, report.app.display_version, report.app.version
    );
    println!("Started: {}", format_millis(session.start_time_millis, "%Y-%m-%d %H:%M:%S"));
    if let Some(ended) = session.end_time_millis {
        println!("Ended: {}", format_millis(ended, "%Y-%m-%d %H:%M:%S"));
    }
    if let Some(user_id) = &session.user_id {
        println!("User: {user_id}");
    }
    if let Some(aqs) = &session.app_quality_session_id {
        println!("Correlation: {aqs}");
    }
    println!("Crashed: {}  High priority: {}", session.crashed, session.high_priority);
    if let Some(payload) = &report.native_payload {
        println!("Native files: {}", payload.files.len());
    }
    println!();

    if report.events.is_empty() {
        println!("No events.");
    }
    for event in &report.events {
        print_event(event);
    }

    Ok(())
}

fn cmd_finalize(engine: &ReportPersistence, current: Option<SessionId>) -> Result<()> {
    let now = Utc::now().timestamp_millis();
    let summary = engine.finalize_reports(current.as_ref(), now);

    println!(
        "Finalized {} session(s); evicted {}, empty {}, over open cap {}, failed {}.",
        summary.finalized, summary.evicted, summary.empty, summary.over_open_cap, summary.failed
    );
    Ok(())
}

fn cmd_purge(engine: &ReportPersistence, session_prefix: Option<&str>, all: bool) -> Result<()> {
    if all {
        engine.delete_all_reports();
        println!("Deleted all reports.");
        return Ok(());
    }

    let prefix = session_prefix.ok_or(Error::NothingToPurge)?;
    let report = find_report(engine, prefix)?;
    engine.delete_finalized_report(&report.session.id);
    println!("Deleted report {}.", report.session.id);
    Ok(())
}

/// Resolve a finalized report by session id prefix.
fn find_report(engine: &ReportPersistence, session_prefix: &str) -> Result<CrashReport> {
    let mut matching: Vec<_> = engine
        .load_finalized_reports()
        .into_iter()
        .filter(|r| r.session_id.as_str().starts_with(session_prefix))
        .collect();

    match matching.len() {
        0 => Err(Error::ReportNotFound {
            prefix: session_prefix.to_string(),
        }),
        1 => Ok(matching.remove(0).report),
        _ => Err(Error::AmbiguousReport {
            prefix: session_prefix.to_string(),
            matches: matching.iter().map(|r| r.session_id.to_string()).collect(),
        }),
    }
}

fn print_event(event: &Event) {
    let time = format_millis(event.timestamp_millis, "%H:%M:%S%.3f");

    match &event.kind {
        EventKind::Crash { exception } => {
            println!("[{time}] CRASH: {}: {}", exception.exception_type, exception.reason);
            for frame in &exception.frames {
                println!("    {:#018x} {}+{}", frame.pc, frame.symbol, frame.offset);
            }
        }
        EventKind::NonFatal { exception } => {
            println!("[{time}] NON-FATAL: {}: {}", exception.exception_type, exception.reason);
        }
        EventKind::Anr { reason } => {
            println!("[{time}] ANR: {reason}");
        }
        EventKind::Log { message } => {
            // Truncate long messages for display
            let display = match message.char_indices().nth(200) {
                Some((idx, _)) => format!("{}...", &message[..idx]),
                None => message.clone(),
            };
            println!("[{time}] LOG: {display}");
        }
        EventKind::NativeExit { exit_info } => {
            println!(
                "[{time}] NATIVE EXIT: pid {} ({}) reason {}",
                exit_info.pid, exit_info.process_name, exit_info.reason_code
            );
        }
    }
}

fn format_millis(millis: i64, fmt: &str) -> String {
    match DateTime::<Utc>::from_timestamp_millis(millis) {
        Some(utc) => utc.with_timezone(&Local).format(fmt).to_string(),
        None => millis.to_string(),
    }
}

fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Ok(Config::load(path)?)
    } else {
        Ok(Config::default_config())
    }
}

fn dirs_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share/crashstore"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
            .map(|p| p.join("crashstore"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|h| PathBuf::from(h).join("crashstore"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}
