//! Configuration resolution for Campus.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/campus/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::otp::OtpPolicy;

/// Complete Campus configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub otp: OtpPolicy,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub database_path: Option<PathBuf>,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret-change-me".to_string(),
            access_ttl_secs: 3600,
            refresh_ttl_secs: 7 * 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Smallest invoice amount accepted (toman).
    pub min_invoice_amount: i64,
    /// Name reported by the simulated online gateway.
    pub gateway_name: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            min_invoice_amount: 1000,
            gateway_name: "zarinpal".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// SMS gateway API key. Without one, notifications are only logged.
    pub sms_api_key: Option<String>,
    /// SMS gateway verify-lookup template name.
    pub sms_template: String,
    /// Where new-ticket alerts go.
    pub support_recipient: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sms_api_key: None,
            sms_template: "verify".to_string(),
            support_recipient: "support@localhost".to_string(),
        }
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            config = load_config_file(&global_path)?;
        }
    }

    if let Some(path) = explicit {
        // An explicit file replaces the global one wholesale; missing sections
        // fall back to defaults through #[serde(default)].
        config = load_config_file(path)?;
    }

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("campus").join("settings.json"))
}

fn config_dir() -> Option<PathBuf> {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
}

pub fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(val) = std::env::var("CAMPUS_DB_PATH") {
        config.server.database_path = Some(PathBuf::from(val));
    }
    if let Ok(val) = std::env::var("CAMPUS_LOG_LEVEL") {
        config.server.log_level = val;
    }
    if let Ok(val) = std::env::var("CAMPUS_JWT_SECRET") {
        config.auth.jwt_secret = val;
    }
    if let Ok(val) = std::env::var("CAMPUS_SMS_API_KEY") {
        config.notifications.sms_api_key = Some(val);
    }
    if let Ok(val) = std::env::var("CAMPUS_SUPPORT_RECIPIENT") {
        config.notifications.support_recipient = val;
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_otp_windows() {
        let config = Config::default();
        assert_eq!(config.otp.code_ttl_secs, 300);
        assert_eq!(config.otp.resend_cooldown_secs, 120);
        assert_eq!(config.otp.max_retries, 5);
        assert_eq!(config.otp.lockout_secs, 1800);
        assert_eq!(config.billing.min_invoice_amount, 1000);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{ "billing": { "min_invoice_amount": 5000, "gateway_name": "test" } }"#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.billing.min_invoice_amount, 5000);
        assert_eq!(config.otp, OtpPolicy::default());
        assert_eq!(config.auth.access_ttl_secs, 3600);
    }

    #[test]
    fn unreadable_file_is_config_error() {
        let err = load_config_file(Path::new("/nonexistent/campus.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_config_file(&path), Err(Error::Config(_))));
    }
}
