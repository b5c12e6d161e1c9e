//! Row types for the notification store and the reminder scans.
//!
//! Timestamps are persisted as UTC RFC 3339 strings with second precision
//! and a `Z` suffix (see [`format_timestamp`]). The scan predicates compare
//! these strings directly in SQL, which is only sound because the format is
//! fixed-width and therefore sorts in chronological order.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Kinds of notification a user can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    AppointmentReminder,
    AppointmentConfirmed,
    AppointmentCancelled,
    VaccinationDue,
    MedicationReminder,
    General,
}

impl NotificationType {
    pub const ALL: [NotificationType; 6] = [
        NotificationType::AppointmentReminder,
        NotificationType::AppointmentConfirmed,
        NotificationType::AppointmentCancelled,
        NotificationType::VaccinationDue,
        NotificationType::MedicationReminder,
        NotificationType::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::AppointmentReminder => "appointment_reminder",
            NotificationType::AppointmentConfirmed => "appointment_confirmed",
            NotificationType::AppointmentCancelled => "appointment_cancelled",
            NotificationType::VaccinationDue => "vaccination_due",
            NotificationType::MedicationReminder => "medication_reminder",
            NotificationType::General => "general",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown notification type '{}'", s))
    }
}

/// A persisted notification row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub related_appointment_id: Option<i64>,
    pub related_pet_id: Option<i64>,
    pub related_vaccination_id: Option<i64>,
    pub is_read: bool,
    pub is_sent: bool,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let type_raw: String = row.try_get("notification_type")?;
        let notification_type = type_raw
            .parse::<NotificationType>()
            .map_err(|e| decode_error("notification_type", e))?;

        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            notification_type,
            title: row.try_get("title")?,
            message: row.try_get("message")?,
            related_appointment_id: row.try_get("related_appointment_id")?,
            related_pet_id: row.try_get("related_pet_id")?,
            related_vaccination_id: row.try_get("related_vaccination_id")?,
            is_read: row.try_get::<i64, _>("is_read")? != 0,
            is_sent: row.try_get::<i64, _>("is_sent")? != 0,
            scheduled_for: optional_timestamp(row, "scheduled_for")?,
            sent_at: optional_timestamp(row, "sent_at")?,
            created_at: required_timestamp(row, "created_at")?,
        })
    }

    /// `true` while the row is waiting for its scheduled time.
    pub fn is_pending_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_sent && self.scheduled_for.is_some_and(|at| at > now)
    }
}

/// Input for creating a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: i64,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub related_appointment_id: Option<i64>,
    pub related_pet_id: Option<i64>,
    pub related_vaccination_id: Option<i64>,
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl NewNotification {
    pub fn new(
        user_id: i64,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            notification_type,
            title: title.into(),
            message: message.into(),
            related_appointment_id: None,
            related_pet_id: None,
            related_vaccination_id: None,
            scheduled_for: None,
        }
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    pub fn for_appointment(mut self, appointment_id: i64) -> Self {
        self.related_appointment_id = Some(appointment_id);
        self
    }

    pub fn for_pet(mut self, pet_id: i64) -> Self {
        self.related_pet_id = Some(pet_id);
        self
    }

    pub fn for_vaccination(mut self, vaccination_id: i64) -> Self {
        self.related_vaccination_id = Some(vaccination_id);
        self
    }
}

/// An upcoming appointment that still needs a reminder.
#[derive(Debug, Clone, PartialEq)]
pub struct DueAppointment {
    pub appointment_id: i64,
    pub owner_id: i64,
    pub pet_id: i64,
    pub pet_name: String,
    pub starts_at: NaiveDateTime,
    pub reason: Option<String>,
}

/// A vaccination whose next dose falls inside the reminder window.
#[derive(Debug, Clone, PartialEq)]
pub struct DueVaccination {
    pub vaccination_id: i64,
    pub owner_id: i64,
    pub pet_id: i64,
    pub pet_name: String,
    pub vaccine_name: String,
    pub next_due_date: NaiveDate,
}

/// Addressing details for a notification's recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    pub user_id: i64,
    pub email: String,
    pub first_name: String,
    pub push_token: Option<String>,
}

/// Canonical storage form for UTC timestamps.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn required_timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    parse_timestamp(&raw).map_err(|e| decode_error(column, e.to_string()))
}

fn optional_timestamp(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|r| parse_timestamp(&r).map_err(|e| decode_error(column, e.to_string())))
        .transpose()
}

pub(crate) fn decode_error(column: &str, message: String) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: message.into(),
    }
}
