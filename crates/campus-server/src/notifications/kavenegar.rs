//! Kavenegar SMS client.
//!
//! OTP codes go through the verify-lookup endpoint with a pre-registered
//! template; free-form messages go through the plain send endpoint.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Channel, DeliveryOutcome, Notification, NotificationDispatcher, NotificationError};

const API_BASE: &str = "https://api.kavenegar.com/v1";

#[derive(Debug)]
pub struct KavenegarClient {
    http: reqwest::Client,
    api_key: String,
    template: String,
    base_url: String,
}

impl KavenegarClient {
    /// Build a client with the `ring` crypto provider installed.
    pub fn new(api_key: &str, template: &str) -> Result<Self, NotificationError> {
        // No-op if a provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| NotificationError::Request(e.to_string()))?;

        Ok(Self::from_parts(http, api_key, template, API_BASE))
    }

    pub fn from_parts(http: reqwest::Client, api_key: &str, template: &str, base_url: &str) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            template: template.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Endpoint URL and query parameters for a notification.
    fn request_for(
        &self,
        recipient: &str,
        notification: &Notification,
    ) -> Result<reqwest::Url, NotificationError> {
        let (path, params): (&str, Vec<(&str, &str)>) = match notification {
            Notification::OtpCode { code } => (
                "verify/lookup.json",
                vec![
                    ("receptor", recipient),
                    ("template", self.template.as_str()),
                    ("token", code.as_str()),
                    ("type", "sms"),
                ],
            ),
            Notification::Message { body, .. } => (
                "sms/send.json",
                vec![("receptor", recipient), ("message", body.as_str())],
            ),
        };

        let url = format!("{}/{}/{path}", self.base_url, self.api_key);
        reqwest::Url::parse_with_params(&url, &params)
            .map_err(|e| NotificationError::Request(e.to_string()))
    }

    async fn post(&self, url: reqwest::Url) -> Result<serde_json::Value, NotificationError> {
        let response = self
            .http
            .post(url)
            .send()
            .await
            .map_err(|e| NotificationError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read body>".to_string());

        if status.is_success() {
            debug!("Kavenegar accepted message");
            Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)))
        } else {
            let status_code = status.as_u16();
            warn!(status = status_code, body = %body, "Kavenegar API returned error");
            Err(NotificationError::ApiError {
                status: status_code,
                body,
            })
        }
    }
}

#[async_trait]
impl NotificationDispatcher for KavenegarClient {
    async fn send(
        &self,
        recipient: &str,
        channel: Channel,
        notification: &Notification,
    ) -> DeliveryOutcome {
        if channel != Channel::Sms {
            return DeliveryOutcome::failed(&NotificationError::UnsupportedChannel(channel));
        }

        let result = match self.request_for(recipient, notification) {
            Ok(url) => self.post(url).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => DeliveryOutcome::delivered(response),
            Err(e) => {
                warn!(recipient, error = %e, "SMS delivery failed");
                DeliveryOutcome::failed(&e)
            }
        }
    }
}
