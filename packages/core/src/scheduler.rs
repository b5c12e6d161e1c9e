//! Reminder scan scheduler.
//!
//! Drives the periodic scan loop: each tick sends scheduled notifications
//! whose time has arrived, creates appointment and vaccination reminders
//! that are due and not yet sent, and prunes old read notifications.
//!
//! Scans run inline in the loop, so a slow cycle delays the next tick
//! instead of overlapping with it.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::time::{self, MissedTickBehavior};

use crate::config::ReminderPolicy;
use crate::error::AppError;
use crate::metrics::AppMetrics;
use crate::notify::NotificationDispatcher;
use crate::reminders::{appointment_reminder, vaccination_reminder};

/// Counts from one scan cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub scheduled_sent: usize,
    pub appointment_reminders: usize,
    pub vaccination_reminders: usize,
    pub pruned: u64,
    pub errors: usize,
}

impl ScanSummary {
    pub fn is_idle(&self) -> bool {
        self.scheduled_sent == 0
            && self.appointment_reminders == 0
            && self.vaccination_reminders == 0
            && self.pruned == 0
            && self.errors == 0
    }
}

pub struct ReminderScanner {
    dispatcher: Arc<NotificationDispatcher>,
    policy: ReminderPolicy,
    batch_limit: i64,
    metrics: Arc<AppMetrics>,
}

impl ReminderScanner {
    pub fn new(
        dispatcher: Arc<NotificationDispatcher>,
        policy: ReminderPolicy,
        batch_limit: i64,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            dispatcher,
            policy,
            batch_limit: batch_limit.max(1),
            metrics,
        }
    }

    /// Run every scan once against `now`.
    ///
    /// A failing scan is logged and counted; the remaining scans still run.
    pub async fn scan_once(&self, now: DateTime<Utc>) -> ScanSummary {
        let started = Instant::now();
        let mut summary = ScanSummary::default();

        match self.send_due_scheduled(now, &mut summary).await {
            Ok(sent) => summary.scheduled_sent = sent,
            Err(err) => self.scan_failed("scheduled", err, &mut summary),
        }

        match self.remind_appointments(now, &mut summary).await {
            Ok(created) => summary.appointment_reminders = created,
            Err(err) => self.scan_failed("appointments", err, &mut summary),
        }

        match self.remind_vaccinations(now, &mut summary).await {
            Ok(created) => summary.vaccination_reminders = created,
            Err(err) => self.scan_failed("vaccinations", err, &mut summary),
        }

        match self.prune(now).await {
            Ok(pruned) => summary.pruned = pruned,
            Err(err) => self.scan_failed("prune", err, &mut summary),
        }

        self.metrics.scans_total.inc();
        self.metrics
            .last_scan_duration_seconds
            .set(started.elapsed().as_secs_f64());

        if summary.is_idle() {
            tracing::debug!("Reminder scan found nothing to do");
        } else {
            tracing::info!(
                "Reminder scan: {} scheduled sent, {} appointment reminders, {} vaccination reminders, {} pruned, {} errors",
                summary.scheduled_sent,
                summary.appointment_reminders,
                summary.vaccination_reminders,
                summary.pruned,
                summary.errors,
            );
        }

        summary
    }

    async fn send_due_scheduled(
        &self,
        now: DateTime<Utc>,
        summary: &mut ScanSummary,
    ) -> Result<usize, AppError> {
        let due = self
            .dispatcher
            .repository()
            .fetch_due_scheduled(now, self.batch_limit)
            .await?;

        let mut sent = 0;
        for notification in &due {
            match self.dispatcher.deliver(notification, now).await {
                Ok(report) if report.marked_sent => sent += 1,
                Ok(_) => {}
                Err(err) => {
                    summary.errors += 1;
                    tracing::error!(
                        "Failed to deliver scheduled notification {}: {}",
                        notification.id,
                        err
                    );
                }
            }
        }
        Ok(sent)
    }

    async fn remind_appointments(
        &self,
        now: DateTime<Utc>,
        summary: &mut ScanSummary,
    ) -> Result<usize, AppError> {
        let due = self
            .dispatcher
            .repository()
            .appointments_needing_reminder(
                now,
                self.policy.appointment_window,
                self.policy.appointment_dedup,
                self.batch_limit,
            )
            .await?;

        let mut created = 0;
        for appointment in &due {
            let reminder = appointment_reminder(appointment, now);
            match self.dispatcher.create(&reminder, now).await {
                Ok(_) => created += 1,
                Err(err) => {
                    summary.errors += 1;
                    tracing::error!(
                        "Failed to create reminder for appointment {}: {}",
                        appointment.appointment_id,
                        err
                    );
                }
            }
        }
        Ok(created)
    }

    async fn remind_vaccinations(
        &self,
        now: DateTime<Utc>,
        summary: &mut ScanSummary,
    ) -> Result<usize, AppError> {
        let due = self
            .dispatcher
            .repository()
            .vaccinations_needing_reminder(
                now,
                self.policy.vaccination_window_days,
                self.policy.vaccination_dedup,
                self.batch_limit,
            )
            .await?;

        let mut created = 0;
        for vaccination in &due {
            let reminder = vaccination_reminder(vaccination, now);
            match self.dispatcher.create(&reminder, now).await {
                Ok(_) => created += 1,
                Err(err) => {
                    summary.errors += 1;
                    tracing::error!(
                        "Failed to create reminder for vaccination {}: {}",
                        vaccination.vaccination_id,
                        err
                    );
                }
            }
        }
        Ok(created)
    }

    async fn prune(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let cutoff = now - self.policy.retention;
        let pruned = self
            .dispatcher
            .repository()
            .prune_read_older_than(cutoff)
            .await?;
        self.metrics.notifications_pruned_total.inc_by(pruned as f64);
        Ok(pruned)
    }

    fn scan_failed(&self, scan: &str, err: AppError, summary: &mut ScanSummary) {
        summary.errors += 1;
        self.metrics
            .scan_errors_total
            .with_label_values(&[scan])
            .inc();
        tracing::error!("Reminder scan '{}' failed, continuing: {}", scan, err);
    }
}

/// Run the reminder scan loop until `shutdown` resolves.
///
/// The first scan runs immediately. Errors inside a cycle never stop the
/// loop.
pub async fn run_reminder_scheduler<F>(
    scanner: Arc<ReminderScanner>,
    scan_interval_seconds: u64,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    let mut interval = time::interval(Duration::from_secs(scan_interval_seconds.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    tracing::info!(
        "Reminder scheduler started (interval: {}s)",
        scan_interval_seconds
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                scanner.scan_once(Utc::now()).await;
            }

            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received. Stopping reminder scans.");
                break;
            }
        }
    }

    tracing::info!("Reminder scheduler stopped cleanly");
}
