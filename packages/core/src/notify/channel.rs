//! Outbound delivery channels.
//!
//! Both channels are thin JSON-over-HTTP clients for relay services the
//! clinic configures by URL. A recipient lacking the address a channel
//! needs (no push token, for instance) is reported as
//! [`DeliveryOutcome::Skipped`] rather than an error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::AppError;
use crate::models::{Notification, Recipient};

/// Upper bound on a single relay call. A slow relay must not stall a scan.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Skipped,
}

/// A best-effort side channel a notification is sent through.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Short label used in logs and metrics.
    fn name(&self) -> &str;

    async fn deliver(
        &self,
        recipient: &Recipient,
        notification: &Notification,
    ) -> Result<DeliveryOutcome, AppError>;
}

fn http_client() -> Client {
    Client::builder()
        .timeout(DELIVERY_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

async fn post_json<T: Serialize + ?Sized>(
    http: &Client,
    endpoint: &str,
    body: &T,
) -> Result<(), AppError> {
    let response = http
        .post(endpoint)
        .json(body)
        .send()
        .await
        .map_err(|err| AppError::Network(err.to_string()))?;

    if !response.status().is_success() {
        return Err(AppError::Network(format!(
            "{} returned HTTP {}",
            endpoint,
            response.status()
        )));
    }

    Ok(())
}

// ---- Push ----

#[derive(Debug, Serialize)]
pub struct PushMessage<'a> {
    pub to: &'a str,
    pub title: &'a str,
    pub body: &'a str,
    pub data: PushData,
}

#[derive(Debug, Serialize)]
pub struct PushData {
    pub notification_id: i64,
    pub notification_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pet_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vaccination_id: Option<i64>,
}

/// Mobile push through a push-service relay, addressed by device token.
#[derive(Clone)]
pub struct PushChannel {
    endpoint: String,
    http: Client,
}

impl PushChannel {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            http: http_client(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DeliveryChannel for PushChannel {
    fn name(&self) -> &str {
        "push"
    }

    async fn deliver(
        &self,
        recipient: &Recipient,
        notification: &Notification,
    ) -> Result<DeliveryOutcome, AppError> {
        let Some(token) = recipient.push_token.as_deref() else {
            return Ok(DeliveryOutcome::Skipped);
        };

        let message = PushMessage {
            to: token,
            title: &notification.title,
            body: &notification.message,
            data: PushData {
                notification_id: notification.id,
                notification_type: notification.notification_type.to_string(),
                appointment_id: notification.related_appointment_id,
                pet_id: notification.related_pet_id,
                vaccination_id: notification.related_vaccination_id,
            },
        };

        post_json(&self.http, &self.endpoint, &message).await?;
        Ok(DeliveryOutcome::Delivered)
    }
}

// ---- Email ----

#[derive(Debug, Serialize)]
pub struct EmailMessage<'a> {
    pub to: &'a str,
    pub subject: &'a str,
    pub text: String,
}

/// Email through an HTTP mail relay, addressed by the account email.
#[derive(Clone)]
pub struct EmailChannel {
    endpoint: String,
    http: Client,
}

impl EmailChannel {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            http: http_client(),
        }
    }
}

#[async_trait]
impl DeliveryChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn deliver(
        &self,
        recipient: &Recipient,
        notification: &Notification,
    ) -> Result<DeliveryOutcome, AppError> {
        if recipient.email.trim().is_empty() {
            return Ok(DeliveryOutcome::Skipped);
        }

        let greeting = if recipient.first_name.is_empty() {
            "Hello".to_string()
        } else {
            format!("Hi {}", recipient.first_name)
        };

        let message = EmailMessage {
            to: &recipient.email,
            subject: &notification.title,
            text: format!("{},\n\n{}\n", greeting, notification.message),
        };

        post_json(&self.http, &self.endpoint, &message).await?;
        Ok(DeliveryOutcome::Delivered)
    }
}
