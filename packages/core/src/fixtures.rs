//! Seed helpers shared by the unit tests.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::SqlitePool;

use crate::db::create_pool;
use crate::models::{format_timestamp, DATE_FORMAT};

pub async fn memory_pool() -> SqlitePool {
    create_pool("sqlite::memory:").await.unwrap()
}

/// A fixed "current time" so window arithmetic is deterministic.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 10, 8, 0, 0).unwrap()
}

pub async fn insert_user(pool: &SqlitePool, email: &str, push_token: Option<&str>) -> i64 {
    sqlx::query(
        "INSERT INTO users (email, password_hash, first_name, push_token)
         VALUES (?, 'x', 'Sam', ?)",
    )
    .bind(email)
    .bind(push_token)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub async fn insert_pet(pool: &SqlitePool, owner_id: i64, name: &str) -> i64 {
    sqlx::query("INSERT INTO pets (owner_id, name, species) VALUES (?, ?, 'dog')")
        .bind(owner_id)
        .bind(name)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn soft_delete_pet(pool: &SqlitePool, pet_id: i64) {
    sqlx::query("UPDATE pets SET deleted_at = ? WHERE id = ?")
        .bind(format_timestamp(fixed_now()))
        .bind(pet_id)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn insert_appointment(
    pool: &SqlitePool,
    pet_id: i64,
    owner_id: i64,
    starts_at: NaiveDateTime,
    status: &str,
) -> i64 {
    sqlx::query(
        "INSERT INTO appointments (pet_id, owner_id, appointment_date, appointment_time, reason, status)
         VALUES (?, ?, ?, ?, 'Annual checkup', ?)",
    )
    .bind(pet_id)
    .bind(owner_id)
    .bind(starts_at.format(DATE_FORMAT).to_string())
    .bind(starts_at.format("%H:%M:%S").to_string())
    .bind(status)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub async fn insert_vaccination(
    pool: &SqlitePool,
    pet_id: i64,
    vaccine_name: &str,
    next_due_date: Option<NaiveDate>,
) -> i64 {
    sqlx::query(
        "INSERT INTO vaccinations (pet_id, vaccine_name, administered_date, next_due_date)
         VALUES (?, ?, '2025-05-01', ?)",
    )
    .bind(pet_id)
    .bind(vaccine_name)
    .bind(next_due_date.map(|d| d.format(DATE_FORMAT).to_string()))
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub fn naive(at: DateTime<Utc>) -> NaiveDateTime {
    at.naive_utc()
}
