//! rpersonio - track attendance in Personio from the command line.
//!
//! Logs in with the web session flow, then reads the attendance calendar and
//! working time periods or writes attendance days. Results are printed as
//! JSON or YAML.

mod cli;
mod login;
mod output;

use std::io::{self, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rpersonio_core::auth::CredentialStore;
use rpersonio_core::cache::month_window;
use rpersonio_core::models::{AttendancePeriod, PeriodType};
use rpersonio_core::{ApiClient, AttendanceService, Config};

use cli::{Cli, Commands, OutputFormat, TimeRange};

/// Initialize the tracing subscriber for logging.
///
/// RUST_LOG wins over `-v`. With a log file the returned guard must live
/// until exit so buffered lines get flushed.
fn init_tracing(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr))
            .with(filter)
            .init();
        return Ok(None);
    };

    let file_name = path
        .file_name()
        .with_context(|| format!("Invalid log file path {}", path.display()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
    Ok(Some(guard))
}

/// Summary printed after a write.
#[derive(Debug, Serialize)]
struct WriteSummary {
    date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    day_id: Option<String>,
    periods: usize,
}

#[derive(Debug, Serialize)]
struct LogoutSummary {
    email: String,
    password_removed: bool,
    config_cleared: bool,
}

#[derive(Debug, Serialize)]
struct WorkingTimeSummary {
    from: chrono::DateTime<chrono::Utc>,
    to: chrono::DateTime<chrono::Utc>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.verbose, cli.log_file.as_deref())?;

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };
    let mut config = Config::load_from(&config_path)?;

    if let Commands::Logout = cli.command {
        let email = cli
            .email
            .clone()
            .or_else(|| config.email.clone())
            .context("No saved login. Pass --email to pick the keychain entry")?;
        let password_removed = CredentialStore::forget(&email)?;
        let config_cleared = forget_email(&mut config, &email);
        if config_cleared {
            config.save_to(&config_path)?;
        }
        info!(email = %email, password_removed, config_cleared, "Logged out");
        let summary = LogoutSummary {
            email,
            password_removed,
            config_cleared,
        };
        return output::print(&summary, output_format(&cli, &config));
    }

    let mut settings = config.clone();
    if cli.base_url.is_some() {
        settings.base_url = cli.base_url.clone();
    }
    let base_url = settings.require_base_url()?.to_string();
    let employee_id = cli.employee_id.or(config.employee_id);
    let format = output_format(&cli, &config);

    let interactive = login::interactive(&cli);
    let credentials = login::resolve_credentials(&cli, &config, interactive)?;

    let client = ApiClient::new(&base_url)?.with_employee_id(employee_id);
    let mut service = AttendanceService::from_client(client);
    login::login(&mut service, &credentials, interactive).await?;

    match cli.command {
        Commands::Login { remember } => {
            if remember {
                CredentialStore::store(&credentials.email, &credentials.password)?;
                config.email = Some(credentials.email.clone());
                config.base_url = Some(base_url.clone());
                config.save_to(&config_path)?;
                info!(path = %config_path.display(), "Saved login");
            }
            output::print(service.ensure_logged_in()?, format)?;
        }

        // Handled before login
        Commands::Logout => {}

        Commands::Calendar { from, to, employee } => {
            let (start, end) = date_range(&service, from, to);
            let calendar = match employee {
                Some(id) => service.get_calendar(id, start, end).await?,
                None => service.get_my_calendar(start, end).await?,
            };
            output::print(&calendar, format)?;
        }

        Commands::Periods { from, to } => {
            let (start, end) = date_range(&service, from, to);
            let periods = service.get_working_time_periods(start, end).await?;
            output::print(&periods, format)?;
        }

        Commands::SetAttendance {
            date,
            work,
            breaks,
            comment,
            project,
            file,
        } => {
            let date = date.unwrap_or_else(|| service.clock().today());
            let periods = match file {
                Some(path) => read_periods(&path)?,
                None => {
                    if work.is_empty() && breaks.is_empty() {
                        bail!("Nothing to write. Give --work/--break ranges or --file");
                    }
                    periods_from_ranges(date, &work, &breaks, comment.as_deref(), project)?
                }
            };

            service.set_attendance(date, &periods).await?;
            let day_id = service
                .day_ids()
                .get(date)
                .and_then(|entry| entry.id())
                .map(str::to_string);
            output::print(
                &WriteSummary {
                    date,
                    day_id,
                    periods: periods.len(),
                },
                format,
            )?;
        }

        Commands::SetWorkingTime { from, to } => {
            service.set_working_time_period(from, to).await?;
            output::print(&WorkingTimeSummary { from, to }, format)?;
        }
    }

    Ok(())
}

/// Drop the saved email when it is the one being logged out.
fn forget_email(config: &mut Config, email: &str) -> bool {
    if config.email.as_deref() == Some(email) {
        config.email = None;
        true
    } else {
        false
    }
}

fn output_format(cli: &Cli, config: &Config) -> OutputFormat {
    if let Some(format) = cli.output {
        return format;
    }
    match config.output.as_deref() {
        Some(name) => OutputFormat::from_str(name, true).unwrap_or_else(|_| {
            warn!(output = name, "Unknown output format in config, using json");
            OutputFormat::default()
        }),
        None => OutputFormat::default(),
    }
}

fn date_range(
    service: &AttendanceService,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> (NaiveDate, NaiveDate) {
    fill_date_range(from, to, service.clock().today())
}

/// Missing bounds default to the month of whichever bound is given, or of
/// `today` when neither is.
fn fill_date_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> (NaiveDate, NaiveDate) {
    let (first, last) = month_window(from.or(to).unwrap_or(today));
    (from.unwrap_or(first), to.unwrap_or(last))
}

/// Periods from `--work`/`--break` ranges, sorted by start.
fn periods_from_ranges(
    date: NaiveDate,
    work: &[TimeRange],
    breaks: &[TimeRange],
    comment: Option<&str>,
    project: Option<i64>,
) -> Result<Vec<AttendancePeriod>> {
    let ranges = work
        .iter()
        .map(|r| (r, PeriodType::Work))
        .chain(breaks.iter().map(|r| (r, PeriodType::Break)));

    let mut periods = Vec::new();
    for (range, period_type) in ranges {
        let (start, end) = range.on(date, &Local).map_err(anyhow::Error::msg)?;
        let mut period = AttendancePeriod::new(start, end).with_type(period_type);
        if let Some(comment) = comment {
            period = period.with_comment(comment);
        }
        if let Some(project) = project {
            period = period.with_project(project);
        }
        periods.push(period);
    }
    periods.sort_by_key(|p| p.start);
    Ok(periods)
}

/// JSON or YAML list of periods; `-` reads JSON from stdin.
fn read_periods(path: &Path) -> Result<Vec<AttendancePeriod>> {
    if path.as_os_str() == "-" {
        let mut contents = String::new();
        io::stdin().read_to_string(&mut contents)?;
        return serde_json::from_str(&contents).context("Failed to parse periods from stdin");
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    if is_yaml {
        serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    } else {
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }
}
