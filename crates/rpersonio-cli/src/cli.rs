//! CLI command definitions.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

/// Track attendance in Personio from the command line.
#[derive(Debug, Parser)]
#[command(name = "rpersonio", version)]
#[command(about = "Track attendance in Personio from the command line", long_about = None)]
pub struct Cli {
    /// Personio URL of your company, e.g. https://acme.personio.de
    #[arg(long, global = true, env = "PERSONIO_BASE_URL")]
    pub base_url: Option<String>,

    /// Login email address.
    #[arg(long, global = true, env = "PERSONIO_EMAIL")]
    pub email: Option<String>,

    /// Login password (falls back to the OS keychain, then a prompt).
    #[arg(long, global = true, env = "PERSONIO_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// CSRF token from a new-device challenge.
    #[arg(long, global = true, env = "PERSONIO_CSRF_TOKEN")]
    pub csrf_token: Option<String>,

    /// One-time token Personio emailed for a new-device challenge.
    #[arg(long, global = true, env = "PERSONIO_EMAIL_TOKEN", hide_env_values = true)]
    pub email_token: Option<String>,

    /// Employee ID, when it cannot be detected after login.
    #[arg(long, global = true, env = "PERSONIO_EMPLOYEE_ID")]
    pub employee_id: Option<i64>,

    /// Output format.
    #[arg(short, long, global = true, env = "PERSONIO_OUTPUT")]
    pub output: Option<OutputFormat>,

    /// Config file (default: ~/.config/rpersonio/config.json).
    #[arg(long, global = true, env = "PERSONIO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write logs to this file instead of stderr.
    #[arg(long, global = true, env = "PERSONIO_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Never prompt; fail when input is missing.
    #[arg(long, global = true)]
    pub no_input: bool,

    /// More logging (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log in and print the session.
    Login {
        /// Save the email in the config file and the password in the OS keychain.
        #[arg(long)]
        remember: bool,
    },
    /// Forget the saved email and the password stored in the OS keychain.
    Logout,
    /// Show the attendance calendar (default: current month).
    Calendar {
        /// First day (YYYY-MM-DD).
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day (YYYY-MM-DD).
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Another employee's calendar.
        #[arg(long)]
        employee: Option<i64>,
    },
    /// List working time periods (default: current month).
    Periods {
        /// First day (YYYY-MM-DD).
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day (YYYY-MM-DD).
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Replace the attendance periods of a day.
    SetAttendance {
        /// Day to write (YYYY-MM-DD, default: today).
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Work period in local time, repeatable.
        #[arg(long = "work", value_name = "HH:MM-HH:MM")]
        work: Vec<TimeRange>,
        /// Break period in local time, repeatable.
        #[arg(long = "break", value_name = "HH:MM-HH:MM")]
        breaks: Vec<TimeRange>,
        /// Comment for every period given with --work/--break.
        #[arg(long)]
        comment: Option<String>,
        /// Project ID for every period given with --work/--break.
        #[arg(long)]
        project: Option<i64>,
        /// JSON or YAML list of periods ("-" reads JSON from stdin).
        #[arg(long, value_name = "FILE", conflicts_with_all = ["work", "breaks"])]
        file: Option<PathBuf>,
    },
    /// Record one working time period.
    SetWorkingTime {
        /// Start, RFC 3339 or local "YYYY-MM-DD HH:MM".
        #[arg(long, value_parser = parse_instant)]
        from: DateTime<Utc>,
        /// End, RFC 3339 or local "YYYY-MM-DD HH:MM".
        #[arg(long, value_parser = parse_instant)]
        to: DateTime<Utc>,
    },
}

/// Local wall-clock range such as `09:00-12:30`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| format!("expected HH:MM-HH:MM, got {s:?}"))?;
        let start = parse_time(start)?;
        let end = parse_time(end)?;
        if start > end {
            return Err(format!("range {s:?} ends before it starts"));
        }
        Ok(Self { start, end })
    }
}

impl TimeRange {
    /// Instants of this range on `date` in the given zone.
    pub fn on<Tz: TimeZone>(&self, date: NaiveDate, tz: &Tz) -> Result<(DateTime<Utc>, DateTime<Utc>), String> {
        Ok((
            resolve_local(tz, date.and_time(self.start))?,
            resolve_local(tz, date.and_time(self.end))?,
        ))
    }
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| format!("invalid time {s:?}, expected HH:MM"))
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Result<DateTime<Utc>, String> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("{naive} does not exist in the local time zone"))
}

/// RFC 3339, or a local date and time.
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s.trim()) {
        return Ok(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s.trim(), fmt).ok())
        .ok_or_else(|| format!("invalid timestamp {s:?}, expected RFC 3339 or YYYY-MM-DD HH:MM"))
        .and_then(|naive| resolve_local(&Local, naive))
}
