//! Notification creation and delivery.
//!
//! [`NotificationDispatcher::create`] persists a row and, unless it is
//! scheduled for later, delivers it right away. The reminder scanner calls
//! [`NotificationDispatcher::deliver`] for rows whose time has come.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::metrics::AppMetrics;
use crate::models::{NewNotification, Notification};
use crate::repository::NotificationRepository;

use super::channel::{DeliveryChannel, DeliveryOutcome};
use super::hub::NotificationHub;

/// What happened to one notification during delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Live hub subscribers the notification reached.
    pub realtime_receivers: usize,
    pub recipient_missing: bool,
    /// `false` when the row had already been marked sent by someone else.
    pub marked_sent: bool,
}

pub struct NotificationDispatcher {
    repository: Arc<NotificationRepository>,
    channels: Vec<Arc<dyn DeliveryChannel>>,
    hub: NotificationHub,
    metrics: Arc<AppMetrics>,
}

impl NotificationDispatcher {
    pub fn new(
        repository: Arc<NotificationRepository>,
        hub: NotificationHub,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            repository,
            channels: Vec::new(),
            hub,
            metrics,
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn DeliveryChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn repository(&self) -> &Arc<NotificationRepository> {
        &self.repository
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Persist `new`; deliver it now unless it is scheduled for later.
    ///
    /// Returns the stored row as it stands after any delivery.
    pub async fn create(
        &self,
        new: &NewNotification,
        now: DateTime<Utc>,
    ) -> Result<Notification, AppError> {
        let id = self.repository.insert_notification(new, now).await?;
        self.metrics
            .notifications_created_total
            .with_label_values(&[new.notification_type.as_str()])
            .inc();

        let stored = self.load(id).await?;
        if stored.is_pending_at(now) {
            tracing::debug!(
                "Notification {} scheduled for {:?}",
                id,
                stored.scheduled_for
            );
            return Ok(stored);
        }

        self.deliver(&stored, now).await?;
        self.load(id).await
    }

    /// Claim the row, then publish to realtime subscribers and attempt
    /// every channel once. Channel failures are logged, never retried.
    ///
    /// A row that is already sent is left alone: nothing is published and
    /// `marked_sent` comes back `false`. A lookup error leaves the row
    /// unsent so the next scan picks it up again.
    pub async fn deliver(
        &self,
        notification: &Notification,
        now: DateTime<Utc>,
    ) -> Result<DispatchReport, AppError> {
        let mut report = DispatchReport::default();

        let recipient = self.repository.fetch_recipient(notification.user_id).await?;

        report.marked_sent = self.repository.mark_sent(notification.id, now).await?;
        if !report.marked_sent {
            tracing::debug!("Notification {} already sent; skipping", notification.id);
            return Ok(report);
        }

        let Some(recipient) = recipient else {
            tracing::warn!(
                "Notification {} targets unknown user {}; marked sent without delivery",
                notification.id,
                notification.user_id
            );
            report.recipient_missing = true;
            return Ok(report);
        };

        let sent = Notification {
            is_sent: true,
            sent_at: Some(now),
            ..notification.clone()
        };
        report.realtime_receivers = self.hub.publish(&sent);

        for channel in &self.channels {
            match channel.deliver(&recipient, &sent).await {
                Ok(DeliveryOutcome::Delivered) => {
                    report.delivered += 1;
                    self.metrics
                        .deliveries_total
                        .with_label_values(&[channel.name()])
                        .inc();
                }
                Ok(DeliveryOutcome::Skipped) => {
                    report.skipped += 1;
                    tracing::debug!(
                        "{} delivery skipped for notification {} (no address)",
                        channel.name(),
                        sent.id
                    );
                }
                Err(err) => {
                    report.failed += 1;
                    self.metrics
                        .delivery_failures_total
                        .with_label_values(&[channel.name()])
                        .inc();
                    tracing::warn!(
                        "{} delivery failed for notification {}: {}",
                        channel.name(),
                        sent.id,
                        err
                    );
                }
            }
        }

        Ok(report)
    }

    async fn load(&self, id: i64) -> Result<Notification, AppError> {
        self.repository
            .get_notification(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("notification {}", id)))
    }
}
