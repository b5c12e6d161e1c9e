//! Database repository for notifications and the reminder scans.
//!
//! All SQL the notification subsystem runs lives here. The scheduler calls
//! [`NotificationRepository::fetch_due_scheduled`],
//! [`NotificationRepository::appointments_needing_reminder`] and
//! [`NotificationRepository::vaccinations_needing_reminder`] on every tick,
//! then [`NotificationRepository::prune_read_older_than`] to keep the table
//! bounded.
//!
//! Inbox operations that mutate a row take the acting user's id and match
//! on it, so a user can never read-mark or delete someone else's row.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::models::{
    decode_error, format_timestamp, DueAppointment, DueVaccination, NewNotification,
    Notification, Recipient, DATETIME_FORMAT, DATE_FORMAT,
};

/// Maximum rows returned by one inbox page.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Longest look-ahead or dedup span the scans accept, in days.
pub const MAX_SPAN_DAYS: i64 = 3650;

fn clamp_span(span: Duration) -> Duration {
    span.clamp(Duration::zero(), Duration::days(MAX_SPAN_DAYS))
}

const NOTIFICATION_COLUMNS: &str = "id, user_id, notification_type, title, message,
    related_appointment_id, related_pet_id, related_vaccination_id,
    is_read, is_sent, scheduled_for, sent_at, created_at";

/// Scheduled rows stay out of the inbox until they have been sent.
const VISIBLE_IN_INBOX: &str = "(scheduled_for IS NULL OR is_sent = 1)";

/// Repository for reading and writing notification data.
#[derive(Clone)]
pub struct NotificationRepository {
    pool: SqlitePool,
}

impl NotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ---- Notification rows ----

    /// Insert a notification. Returns the new row id.
    pub async fn insert_notification(
        &self,
        new: &NewNotification,
        created_at: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO notifications
             (user_id, notification_type, title, message,
              related_appointment_id, related_pet_id, related_vaccination_id,
              scheduled_for, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new.user_id)
        .bind(new.notification_type.as_str())
        .bind(&new.title)
        .bind(&new.message)
        .bind(new.related_appointment_id)
        .bind(new.related_pet_id)
        .bind(new.related_vaccination_id)
        .bind(new.scheduled_for.map(format_timestamp))
        .bind(format_timestamp(created_at))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_notification(&self, id: i64) -> Result<Option<Notification>, sqlx::Error> {
        let sql = format!("SELECT {} FROM notifications WHERE id = ?", NOTIFICATION_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(Notification::from_row).transpose()
    }

    /// A user's inbox, newest first. `limit` is clamped to 1..=100.
    pub async fn list_for_user(
        &self,
        user_id: i64,
        limit: i64,
        unread_only: bool,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let unread = if unread_only { " AND is_read = 0" } else { "" };

        let sql = format!(
            "SELECT {} FROM notifications
             WHERE user_id = ? AND {}{}
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
            NOTIFICATION_COLUMNS, VISIBLE_IN_INBOX, unread
        );

        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Notification::from_row).collect()
    }

    pub async fn unread_count(&self, user_id: i64) -> Result<i64, sqlx::Error> {
        let sql = format!(
            "SELECT COUNT(*) AS cnt FROM notifications
             WHERE user_id = ? AND is_read = 0 AND {}",
            VISIBLE_IN_INBOX
        );
        let row = sqlx::query(&sql).bind(user_id).fetch_one(&self.pool).await?;
        row.try_get("cnt")
    }

    /// Returns `false` when the row does not exist or belongs to another user.
    pub async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark every unread row of `user_id` as read. Returns rows changed.
    pub async fn mark_all_read(&self, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Returns `false` when the row does not exist or belongs to another user.
    pub async fn delete_notification(&self, id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ---- Delivery bookkeeping ----

    /// Unsent rows whose scheduled time has arrived, oldest schedule first.
    pub async fn fetch_due_scheduled(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM notifications
             WHERE is_sent = 0
               AND scheduled_for IS NOT NULL
               AND scheduled_for <= ?
             ORDER BY scheduled_for ASC, id ASC
             LIMIT ?",
            NOTIFICATION_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(format_timestamp(now))
            .bind(limit.max(1))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Notification::from_row).collect()
    }

    /// Flip an unsent row to sent. Returns `false` if it was already sent.
    pub async fn mark_sent(&self, id: i64, at: DateTime<Utc>) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_sent = 1, sent_at = ? WHERE id = ? AND is_sent = 0",
        )
        .bind(format_timestamp(at))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn fetch_recipient(&self, user_id: i64) -> Result<Option<Recipient>, sqlx::Error> {
        let row = sqlx::query("SELECT id, email, first_name, push_token FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| -> Result<Recipient, sqlx::Error> {
            Ok(Recipient {
                user_id: row.try_get("id")?,
                email: row.try_get("email")?,
                first_name: row.try_get("first_name")?,
                push_token: row.try_get("push_token")?,
            })
        })
        .transpose()
    }

    /// Delete read, sent rows created before `cutoff`. Returns rows deleted.
    pub async fn prune_read_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM notifications WHERE is_read = 1 AND is_sent = 1 AND created_at < ?",
        )
        .bind(format_timestamp(cutoff))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // ---- Reminder scans ----

    /// Appointments starting within `[now, now + window]` that have no
    /// reminder created during the last `dedup` period.
    ///
    /// Appointment date/time columns are clinic wall-clock values; they are
    /// compared against `now` taken as naive UTC.
    pub async fn appointments_needing_reminder(
        &self,
        now: DateTime<Utc>,
        window: Duration,
        dedup: Duration,
        limit: i64,
    ) -> Result<Vec<DueAppointment>, sqlx::Error> {
        let from = now.naive_utc().format(DATETIME_FORMAT).to_string();
        let until = (now + clamp_span(window))
            .naive_utc()
            .format(DATETIME_FORMAT)
            .to_string();
        let reminded_since = format_timestamp(now - clamp_span(dedup));

        let rows = sqlx::query(
            "SELECT a.id, a.owner_id, a.pet_id, p.name AS pet_name, a.reason,
                    datetime(a.appointment_date || ' ' || a.appointment_time) AS starts_at
             FROM appointments a
             JOIN pets p ON p.id = a.pet_id
             WHERE a.status IN ('scheduled', 'confirmed')
               AND p.deleted_at IS NULL
               AND datetime(a.appointment_date || ' ' || a.appointment_time) >= ?
               AND datetime(a.appointment_date || ' ' || a.appointment_time) <= ?
               AND NOT EXISTS (
                   SELECT 1 FROM notifications n
                   WHERE n.related_appointment_id = a.id
                     AND n.notification_type = 'appointment_reminder'
                     AND n.created_at >= ?
               )
             ORDER BY starts_at ASC, a.id ASC
             LIMIT ?",
        )
        .bind(&from)
        .bind(&until)
        .bind(&reminded_since)
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<DueAppointment, sqlx::Error> {
                let starts_raw: String = row.try_get("starts_at")?;
                let starts_at = NaiveDateTime::parse_from_str(&starts_raw, DATETIME_FORMAT)
                    .map_err(|e| decode_error("starts_at", e.to_string()))?;

                Ok(DueAppointment {
                    appointment_id: row.try_get("id")?,
                    owner_id: row.try_get("owner_id")?,
                    pet_id: row.try_get("pet_id")?,
                    pet_name: row.try_get("pet_name")?,
                    starts_at,
                    reason: row.try_get("reason")?,
                })
            })
            .collect()
    }

    /// Vaccinations due between today and `today + window_days` (inclusive)
    /// with no due-reminder created during the last `dedup` period.
    pub async fn vaccinations_needing_reminder(
        &self,
        now: DateTime<Utc>,
        window_days: i64,
        dedup: Duration,
        limit: i64,
    ) -> Result<Vec<DueVaccination>, sqlx::Error> {
        let today = now.date_naive();
        let from = today.format(DATE_FORMAT).to_string();
        let until = (today + Duration::days(window_days.clamp(0, MAX_SPAN_DAYS)))
            .format(DATE_FORMAT)
            .to_string();
        let reminded_since = format_timestamp(now - clamp_span(dedup));

        let rows = sqlx::query(
            "SELECT v.id, p.owner_id, v.pet_id, p.name AS pet_name, v.vaccine_name,
                    date(v.next_due_date) AS due_date
             FROM vaccinations v
             JOIN pets p ON p.id = v.pet_id
             WHERE v.next_due_date IS NOT NULL
               AND p.deleted_at IS NULL
               AND date(v.next_due_date) >= ?
               AND date(v.next_due_date) <= ?
               AND NOT EXISTS (
                   SELECT 1 FROM notifications n
                   WHERE n.related_vaccination_id = v.id
                     AND n.notification_type = 'vaccination_due'
                     AND n.created_at >= ?
               )
             ORDER BY due_date ASC, v.id ASC
             LIMIT ?",
        )
        .bind(&from)
        .bind(&until)
        .bind(&reminded_since)
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<DueVaccination, sqlx::Error> {
                let due_raw: String = row.try_get("due_date")?;
                let next_due_date = NaiveDate::parse_from_str(&due_raw, DATE_FORMAT)
                    .map_err(|e| decode_error("due_date", e.to_string()))?;

                Ok(DueVaccination {
                    vaccination_id: row.try_get("id")?,
                    owner_id: row.try_get("owner_id")?,
                    pet_id: row.try_get("pet_id")?,
                    pet_name: row.try_get("pet_name")?,
                    vaccine_name: row.try_get("vaccine_name")?,
                    next_due_date,
                })
            })
            .collect()
    }
}
