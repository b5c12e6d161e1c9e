use std::env;

use chrono::Duration;

use crate::cli::Cli;
use crate::repository::MAX_SPAN_DAYS;

/// Upper bound for `SCAN_BATCH_LIMIT`.
const MAX_SCAN_BATCH: i64 = 10_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_port: u16,
    pub scan_interval_seconds: u64,
    pub reminders: ReminderPolicy,
    pub scan_batch_limit: i64,
    pub push_service_url: Option<String>,
    pub email_service_url: Option<String>,
}

/// Windows that decide when a reminder is generated and for how long an
/// existing reminder suppresses a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderPolicy {
    pub appointment_window: Duration,
    pub appointment_dedup: Duration,
    pub vaccination_window_days: i64,
    pub vaccination_dedup: Duration,
    pub retention: Duration,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            appointment_window: Duration::hours(24),
            appointment_dedup: Duration::hours(24),
            vaccination_window_days: 7,
            vaccination_dedup: Duration::days(7),
            retention: Duration::days(90),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup; `from_env` passes `std::env`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or("DATABASE_URL is required")?;

        let server_port = parse_or(&lookup, "SERVER_PORT", 3000u16)?;
        let scan_interval_seconds = parse_or(&lookup, "SCAN_INTERVAL_SECONDS", 60u64)?;
        if scan_interval_seconds == 0 {
            return Err("SCAN_INTERVAL_SECONDS must be greater than zero".into());
        }

        let defaults = ReminderPolicy::default();
        let reminders = ReminderPolicy {
            appointment_window: Duration::hours(bounded(
                &lookup,
                "APPOINTMENT_REMINDER_HOURS",
                defaults.appointment_window.num_hours(),
                MAX_SPAN_DAYS * 24,
            )?),
            appointment_dedup: Duration::hours(bounded(
                &lookup,
                "APPOINTMENT_REMINDER_DEDUP_HOURS",
                defaults.appointment_dedup.num_hours(),
                MAX_SPAN_DAYS * 24,
            )?),
            vaccination_window_days: bounded(
                &lookup,
                "VACCINATION_REMINDER_DAYS",
                defaults.vaccination_window_days,
                MAX_SPAN_DAYS,
            )?,
            vaccination_dedup: Duration::days(bounded(
                &lookup,
                "VACCINATION_REMINDER_DEDUP_DAYS",
                defaults.vaccination_dedup.num_days(),
                MAX_SPAN_DAYS,
            )?),
            retention: Duration::days(bounded(
                &lookup,
                "NOTIFICATION_RETENTION_DAYS",
                defaults.retention.num_days(),
                MAX_SPAN_DAYS,
            )?),
        };

        let scan_batch_limit = bounded(&lookup, "SCAN_BATCH_LIMIT", 200, MAX_SCAN_BATCH)?;

        Ok(Self {
            database_url,
            server_port,
            scan_interval_seconds,
            reminders,
            scan_batch_limit,
            push_service_url: optional(&lookup, "PUSH_SERVICE_URL"),
            email_service_url: optional(&lookup, "EMAIL_SERVICE_URL"),
        })
    }

    /// Command-line flags take precedence over the environment.
    pub fn apply_cli(mut self, cli: &Cli) -> Result<Self, String> {
        if let Some(url) = &cli.database_url {
            self.database_url = url.clone();
        }
        if let Some(port) = cli.port {
            self.server_port = port;
        }
        if let Some(interval) = cli.scan_interval {
            if interval == 0 {
                return Err("--scan-interval must be greater than zero".into());
            }
            self.scan_interval_seconds = interval;
        }
        if let Some(url) = &cli.push_url {
            self.push_service_url = Some(url.clone());
        }
        if let Some(url) = &cli.email_url {
            self.email_service_url = Some(url.clone());
        }
        Ok(self)
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}

/// Parse a count that must fall in `1..=max`.
fn bounded<F>(lookup: &F, key: &str, default: i64, max: i64) -> Result<i64, String>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(lookup, key, default)?;
    if !(1..=max).contains(&value) {
        return Err(format!("{} must be between 1 and {}, got {}", key, max, value));
    }
    Ok(value)
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}
