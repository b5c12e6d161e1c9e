//! Notification delivery.
//!
//! A notification row is delivered by the [`NotificationDispatcher`]: it is
//! published to the in-process [`NotificationHub`] for real-time listeners
//! and handed once to every configured [`DeliveryChannel`]. Channel
//! failures are logged and counted; they are never retried.

pub mod channel;
pub mod dispatcher;
pub mod hub;

pub use channel::{DeliveryChannel, DeliveryOutcome, EmailChannel, PushChannel};
pub use dispatcher::{DispatchReport, NotificationDispatcher};
pub use hub::{NotificationHub, UserSubscription};
