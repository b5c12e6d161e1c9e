//! Reminder content for the scanned appointment and vaccination rows.
//!
//! Reminders are stamped `scheduled_for = now` so a row whose first
//! delivery errors out is still due on the next scan.

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{DueAppointment, DueVaccination, NewNotification, NotificationType};

pub const APPOINTMENT_REMINDER_TITLE: &str = "Upcoming appointment";
pub const VACCINATION_REMINDER_TITLE: &str = "Vaccination due";

/// "today", "tomorrow" or "on Friday, May 15".
fn relative_day(date: NaiveDate, today: NaiveDate) -> String {
    match (date - today).num_days() {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        _ => format!("on {}", date.format("%A, %B %-d")),
    }
}

pub fn appointment_reminder(due: &DueAppointment, now: DateTime<Utc>) -> NewNotification {
    let when = relative_day(due.starts_at.date(), now.date_naive());
    let mut message = format!(
        "{} has an appointment {} at {}",
        due.pet_name,
        when,
        due.starts_at.format("%H:%M")
    );
    if let Some(reason) = due.reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        message.push_str(&format!(" ({})", reason));
    }
    message.push('.');

    NewNotification::new(
        due.owner_id,
        NotificationType::AppointmentReminder,
        APPOINTMENT_REMINDER_TITLE,
        message,
    )
    .for_appointment(due.appointment_id)
    .for_pet(due.pet_id)
    .scheduled_for(now)
}

pub fn vaccination_reminder(due: &DueVaccination, now: DateTime<Utc>) -> NewNotification {
    let message = format!(
        "{}'s {} vaccination is due {}.",
        due.pet_name,
        due.vaccine_name,
        relative_day(due.next_due_date, now.date_naive())
    );

    NewNotification::new(
        due.owner_id,
        NotificationType::VaccinationDue,
        VACCINATION_REMINDER_TITLE,
        message,
    )
    .for_vaccination(due.vaccination_id)
    .for_pet(due.pet_id)
    .scheduled_for(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDateTime, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 14, 8, 0, 0).unwrap()
    }

    fn appointment(starts_at: &str, reason: Option<&str>) -> DueAppointment {
        DueAppointment {
            appointment_id: 3,
            owner_id: 7,
            pet_id: 5,
            pet_name: "Rex".into(),
            starts_at: NaiveDateTime::parse_from_str(starts_at, "%Y-%m-%d %H:%M:%S").unwrap(),
            reason: reason.map(str::to_string),
        }
    }

    #[test]
    fn appointment_reminder_links_appointment_and_pet() {
        let n = appointment_reminder(&appointment("2026-05-14 15:30:00", None), now());
        assert_eq!(n.user_id, 7);
        assert_eq!(n.notification_type, NotificationType::AppointmentReminder);
        assert_eq!(n.related_appointment_id, Some(3));
        assert_eq!(n.related_pet_id, Some(5));
        assert_eq!(n.scheduled_for, Some(now()));
        assert_eq!(n.message, "Rex has an appointment today at 15:30.");
    }

    #[test]
    fn appointment_reminder_mentions_reason_and_tomorrow() {
        let n = appointment_reminder(
            &appointment("2026-05-15 09:05:00", Some("Dental cleaning")),
            now(),
        );
        assert_eq!(
            n.message,
            "Rex has an appointment tomorrow at 09:05 (Dental cleaning)."
        );
    }

    #[test]
    fn blank_reason_is_omitted() {
        let n = appointment_reminder(&appointment("2026-05-15 09:05:00", Some("  ")), now());
        assert_eq!(n.message, "Rex has an appointment tomorrow at 09:05.");
    }

    #[test]
    fn vaccination_reminder_uses_weekday_for_later_dates() {
        let due = DueVaccination {
            vaccination_id: 9,
            owner_id: 7,
            pet_id: 5,
            pet_name: "Rex".into(),
            vaccine_name: "Rabies".into(),
            next_due_date: NaiveDate::from_ymd_opt(2026, 5, 19).unwrap(),
        };
        let n = vaccination_reminder(&due, now());
        assert_eq!(n.notification_type, NotificationType::VaccinationDue);
        assert_eq!(n.related_vaccination_id, Some(9));
        assert_eq!(n.message, "Rex's Rabies vaccination is due on Tuesday, May 19.");
    }
}
