//! In-memory dispatcher that records every delivery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{Channel, DeliveryOutcome, Notification, NotificationDispatcher};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub recipient: String,
    pub channel: Channel,
    pub notification: Notification,
}

/// Records deliveries. When set to fail, still records but reports
/// `delivered = false`.
#[derive(Debug, Default)]
pub struct MemoryDispatcher {
    sent: Mutex<Vec<SentNotification>>,
    failing: AtomicBool,
}

impl MemoryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent OTP code sent to `recipient`.
    pub fn last_code_for(&self, recipient: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|s| match s.notification {
            Notification::OtpCode { code } if s.recipient == recipient => Some(code),
            _ => None,
        })
    }
}

#[async_trait]
impl NotificationDispatcher for MemoryDispatcher {
    async fn send(
        &self,
        recipient: &str,
        channel: Channel,
        notification: &Notification,
    ) -> DeliveryOutcome {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentNotification {
                recipient: recipient.to_string(),
                channel,
                notification: notification.clone(),
            });

        if self.failing.load(Ordering::SeqCst) {
            DeliveryOutcome {
                delivered: false,
                response: serde_json::json!({ "error": "simulated failure" }),
            }
        } else {
            DeliveryOutcome::delivered(serde_json::json!({ "dispatcher": "memory" }))
        }
    }
}
