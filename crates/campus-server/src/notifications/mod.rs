//! Outbound notifications (OTP codes, ticket and registration updates).
//!
//! Workflows hand a [`Notification`] to a [`NotificationDispatcher`] and
//! record the [`DeliveryOutcome`]. Dispatchers never fail the caller: a
//! transport error becomes `delivered = false` with the error in `response`.
//!
//! - [`TracingDispatcher`] logs instead of sending (development)
//! - [`MemoryDispatcher`] records deliveries in memory (tests, dry runs)
//! - [`ChannelRouter`] sends SMS and email through different dispatchers
//! - `KavenegarClient` sends SMS through the Kavenegar HTTP API
//!   (`sms-gateway` feature)

#[cfg(feature = "sms-gateway")]
pub mod kavenegar;
pub mod log;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

#[cfg(feature = "sms-gateway")]
pub use kavenegar::KavenegarClient;
pub use log::TracingDispatcher;
pub use memory::{MemoryDispatcher, SentNotification};

/// Errors raised inside a dispatcher before they are folded into a
/// [`DeliveryOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// HTTP request to the provider failed.
    #[error("request error: {0}")]
    Request(String),

    /// The provider answered with a non-success status code.
    #[error("provider error (status {status}): {body}")]
    ApiError { status: u16, body: String },

    /// The dispatcher cannot deliver on this channel.
    #[error("unsupported channel: {0:?}")]
    UnsupportedChannel(Channel),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sms,
    Email,
}

/// What to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A one-time login code.
    OtpCode { code: String },
    /// Free-form text with a subject line.
    Message { subject: String, body: String },
}

impl Notification {
    pub fn message(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Message {
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOutcome {
    pub delivered: bool,
    /// Provider response, or an error description.
    pub response: serde_json::Value,
}

impl DeliveryOutcome {
    pub const fn delivered(response: serde_json::Value) -> Self {
        Self {
            delivered: true,
            response,
        }
    }

    pub fn failed(error: &NotificationError) -> Self {
        Self {
            delivered: false,
            response: serde_json::json!({ "error": error.to_string() }),
        }
    }
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        channel: Channel,
        notification: &Notification,
    ) -> DeliveryOutcome;
}

/// Routes each channel to its own dispatcher.
pub struct ChannelRouter {
    sms: Arc<dyn NotificationDispatcher>,
    email: Arc<dyn NotificationDispatcher>,
}

impl ChannelRouter {
    pub fn new(sms: Arc<dyn NotificationDispatcher>, email: Arc<dyn NotificationDispatcher>) -> Self {
        Self { sms, email }
    }
}

#[async_trait]
impl NotificationDispatcher for ChannelRouter {
    async fn send(
        &self,
        recipient: &str,
        channel: Channel,
        notification: &Notification,
    ) -> DeliveryOutcome {
        match channel {
            Channel::Sms => self.sms.send(recipient, channel, notification).await,
            Channel::Email => self.email.send(recipient, channel, notification).await,
        }
    }
}
