//! Top-level CLI definition and dispatch.

use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, Local};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use serde::Serialize;

use crate::core::config::{CONFIG_ENV, DaemonConfig, FileConfigProvider, resolve_config_path};
use crate::core::errors::{OpsError, Result};
use crate::daemon::Supervisor;
use crate::gate::{CalendarPattern, parse_interval};
use crate::logger::{self, LogFormat};
use crate::worker::WorkerRegistry;

/// opswatch: runs condition producers and notification consumers behind a
/// priority-routed dispatcher.
#[derive(Parser)]
#[command(name = "opswatch", version, about)]
pub struct Cli {
    /// Configuration file.
    #[arg(long, short, global = true, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,
    /// JSON output (logs for `run`, reports for the other commands).
    #[arg(long, global = true)]
    pub json: bool,
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Run the daemon in the foreground. SIGHUP reloads, SIGTERM stops.
    Run,
    /// Validate the configuration and every worker section it names.
    CheckConfig,
    /// List the worker kinds this build can start.
    Workers,
    /// Print an interval expression (`30`, `10m`, `2h`, `1w`) in seconds.
    Interval {
        /// Interval expression.
        expr: String,
    },
    /// Test a calendar pattern (`minute;hour;day;month;weekday`).
    Calendar {
        /// Calendar pattern.
        pattern: String,
        /// RFC 3339 timestamp to test instead of the current local time.
        #[arg(long)]
        at: Option<String>,
    },
    /// Generate shell completions.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ──────────────────── check-config ────────────────────

/// Outcome for one worker section.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerCheck {
    /// Config section name.
    pub section: String,
    /// `producer` or `consumer`.
    pub role: &'static str,
    /// Resolved worker kind, if the section could be read.
    pub kind: Option<String>,
    /// Why the section was rejected.
    pub error: Option<String>,
}

/// Full `check-config` result.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    /// Configuration file that was checked.
    pub path: PathBuf,
    /// One entry per listed worker, producers first.
    pub workers: Vec<WorkerCheck>,
}

impl CheckReport {
    /// Whether every worker section passed.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.workers.iter().all(|w| w.error.is_none())
    }
}

/// Resolve and configure every listed worker without starting any thread.
#[must_use]
pub fn check_workers(config: &DaemonConfig, registry: &WorkerRegistry) -> Vec<WorkerCheck> {
    let mut checks = Vec::new();
    for section in &config.daemon.producers {
        let check = match config.worker_kind(section) {
            Ok(kind) => {
                let outcome = registry
                    .producer(section, &kind)
                    .and_then(|mut producer| producer.apply_config(section, config));
                worker_check(section, "producer", Some(kind), outcome)
            }
            Err(err) => worker_check(section, "producer", None, Err(err)),
        };
        checks.push(check);
    }
    for section in &config.daemon.consumers {
        let check = match config.worker_kind(section) {
            Ok(kind) => {
                let outcome = registry
                    .consumer(section, &kind)
                    .and_then(|mut consumer| consumer.apply_config(section, config));
                worker_check(section, "consumer", Some(kind), outcome)
            }
            Err(err) => worker_check(section, "consumer", None, Err(err)),
        };
        checks.push(check);
    }
    checks
}

fn worker_check(
    section: &str,
    role: &'static str,
    kind: Option<String>,
    outcome: Result<()>,
) -> WorkerCheck {
    WorkerCheck {
        section: section.to_string(),
        role,
        kind,
        error: outcome.err().map(|err| err.to_string()),
    }
}

/// Human-readable rendering of a [`CheckReport`].
#[must_use]
pub fn format_check_report(report: &CheckReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "config: {}", report.path.display());
    if report.workers.is_empty() {
        let _ = writeln!(out, "  (no workers listed)");
    }
    for worker in &report.workers {
        let kind = worker.kind.as_deref().unwrap_or("?");
        match &worker.error {
            None => {
                let _ = writeln!(
                    out,
                    "  {} {} {} ({kind})",
                    "OK".green().bold(),
                    worker.role,
                    worker.section
                );
            }
            Some(error) => {
                let _ = writeln!(
                    out,
                    "  {} {} {} ({kind}): {error}",
                    "FAIL".red().bold(),
                    worker.role,
                    worker.section
                );
            }
        }
    }
    out
}

// ──────────────────── dispatch ────────────────────

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_daemon(cli: &Cli) -> Result<()> {
    let path = resolve_config_path(cli.config.as_deref());
    let provider = FileConfigProvider::new(path.clone());
    let registry = WorkerRegistry::with_builtins();
    let mut supervisor = Supervisor::new(provider, registry)?;

    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Human
    };
    logger::init(format, supervisor.config().daemon.log_level.as_deref())?;
    tracing::info!(config = %path.display(), version = env!("CARGO_PKG_VERSION"), "opswatch starting");

    #[cfg(unix)]
    let _signals = crate::daemon::signals::install(&supervisor.control())?;

    supervisor.run()
}

fn check_config(cli: &Cli) -> Result<bool> {
    let path = resolve_config_path(cli.config.as_deref());
    let config = DaemonConfig::load(&path)?;
    let report = CheckReport {
        workers: check_workers(&config, &WorkerRegistry::with_builtins()),
        path,
    };
    if cli.json {
        print_json(&report)?;
    } else {
        print!("{}", format_check_report(&report));
    }
    Ok(report.is_ok())
}

fn list_workers(cli: &Cli) -> Result<()> {
    #[derive(Serialize)]
    struct Kinds<'a> {
        producers: Vec<&'a str>,
        consumers: Vec<&'a str>,
    }

    let registry = WorkerRegistry::with_builtins();
    let kinds = Kinds {
        producers: registry.producer_kinds().collect(),
        consumers: registry.consumer_kinds().collect(),
    };
    if cli.json {
        return print_json(&kinds);
    }
    println!("producers:");
    for kind in &kinds.producers {
        println!("  {kind}");
    }
    println!("consumers:");
    for kind in &kinds.consumers {
        println!("  {kind}");
    }
    Ok(())
}

fn calendar(pattern: &str, at: Option<&str>, json: bool) -> Result<bool> {
    let parsed: CalendarPattern = pattern.parse()?;
    let at: DateTime<FixedOffset> = match at {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map_err(|_| OpsError::invalid_value("--at", "RFC 3339 timestamp", raw))?,
        None => Local::now().fixed_offset(),
    };
    let matches = parsed.matches(&at);
    if json {
        print_json(&serde_json::json!({
            "pattern": pattern,
            "at": at.to_rfc3339(),
            "matches": matches,
        }))?;
    } else if matches {
        println!("{} {pattern} matches {}", "yes".green(), at.to_rfc3339());
    } else {
        println!("{} {pattern} does not match {}", "no".yellow(), at.to_rfc3339());
    }
    Ok(matches)
}

/// Dispatch CLI commands.
///
/// # Errors
/// Returns an error if the subcommand fails, including a failed
/// `check-config`.
pub fn run(cli: &Cli) -> std::result::Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Command::Run => run_daemon(cli)?,
        Command::CheckConfig => {
            if !check_config(cli)? {
                return Err("configuration has invalid worker sections".into());
            }
        }
        Command::Workers => list_workers(cli)?,
        Command::Interval { expr } => {
            let seconds = parse_interval(expr)?;
            if cli.json {
                print_json(&serde_json::json!({ "expr": expr, "seconds": seconds }))?;
            } else {
                println!("{seconds}");
            }
        }
        Command::Calendar { pattern, at } => {
            calendar(pattern, at.as_deref(), cli.json)?;
        }
        Command::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "opswatch", &mut io::stdout());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["opswatch", "interval", "1h", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Command::Interval { ref expr } if expr == "1h"));
    }

    #[test]
    fn check_workers_reports_each_section() {
        let config = DaemonConfig::from_toml_str(
            r#"
            [daemon]
            producers = ["beat", "mystery"]
            consumers = ["log"]

            [beat]
            kind = "heartbeat"
            priority = 1
            intervals = ["alive=1h"]

            [mystery]
            kind = "nope"
            "#,
        )
        .unwrap();
        let checks = check_workers(&config, &WorkerRegistry::with_builtins());
        assert_eq!(checks.len(), 3);
        assert!(checks[0].error.is_none());
        assert!(checks[1].error.as_deref().unwrap().contains("OPS-3001"));
        // `log` has no priority configured.
        assert!(checks[2].error.as_deref().unwrap().contains("OPS-1004"));

        let report = CheckReport {
            path: PathBuf::from("x.toml"),
            workers: checks,
        };
        assert!(!report.is_ok());
        let text = format_check_report(&report);
        assert!(text.contains("beat (heartbeat)"));
        assert!(text.contains("mystery (nope)"));
    }

    #[test]
    fn calendar_honours_explicit_timestamp() {
        assert!(calendar("30;14;*;*;*", Some("2024-06-03T14:30:00+02:00"), true).unwrap());
        assert!(!calendar("30;14;*;*;*", Some("2024-06-03T14:31:00+02:00"), true).unwrap());
        assert!(calendar("30;14;*;*;*", Some("yesterday"), true).is_err());
    }
}
