//! In-process real-time fan-out.
//!
//! Every delivered notification is broadcast to all live subscribers; a
//! [`UserSubscription`] filters the stream down to one user. Publishing
//! with nobody listening is the normal case and is not an error.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::models::Notification;

pub const DEFAULT_HUB_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Broadcast `notification`. Returns how many subscribers received it.
    pub fn publish(&self, notification: &Notification) -> usize {
        self.sender.send(notification.clone()).unwrap_or(0)
    }

    pub fn subscribe(&self, user_id: i64) -> UserSubscription {
        UserSubscription {
            user_id,
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(DEFAULT_HUB_CAPACITY)
    }
}

/// One user's view of the hub.
pub struct UserSubscription {
    user_id: i64,
    receiver: broadcast::Receiver<Notification>,
}

impl UserSubscription {
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Next notification for this user, or `None` once the hub is gone.
    ///
    /// A subscriber that falls behind loses the overflowed events; it keeps
    /// receiving from the oldest retained one.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.receiver.recv().await {
                Ok(notification) if notification.user_id == self.user_id => {
                    return Some(notification)
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        "Realtime subscriber for user {} lagged, {} events dropped",
                        self.user_id,
                        skipped
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
