//! Development dispatcher that logs instead of sending.

use async_trait::async_trait;
use tracing::info;

use super::{Channel, DeliveryOutcome, Notification, NotificationDispatcher};

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDispatcher;

#[async_trait]
impl NotificationDispatcher for TracingDispatcher {
    async fn send(
        &self,
        recipient: &str,
        channel: Channel,
        notification: &Notification,
    ) -> DeliveryOutcome {
        match notification {
            // Codes stay out of the log.
            Notification::OtpCode { .. } => {
                info!(recipient, ?channel, "OTP code dispatched (log only)");
            }
            Notification::Message { subject, .. } => {
                info!(recipient, ?channel, subject = %subject, "Notification dispatched (log only)");
            }
        }
        DeliveryOutcome::delivered(serde_json::json!({ "dispatcher": "log" }))
    }
}
