//! OTP issuance policy.
//!
//! Two independent gates guard issuance: a burst cap (`max_retries` codes,
//! then a lockout counted from the last send) and a per-request cooldown.
//! The lockout only resets the burst counter; it never shortens the cooldown.
//! Both gates are pure functions over an [`OtpState`] snapshot so the server
//! can evaluate them and then persist with a compare-and-set on that snapshot.

use rand::RngExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OtpPolicy {
    /// Lifetime of an issued code (seconds).
    pub code_ttl_secs: i64,
    /// Minimum spacing between two issuances (seconds).
    pub resend_cooldown_secs: i64,
    /// Issuances allowed before the lockout applies.
    pub max_retries: i64,
    /// Lockout window after the burst cap is hit (seconds).
    pub lockout_secs: i64,
    /// Number of digits in a code.
    pub code_length: u32,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            code_ttl_secs: 5 * 60,
            resend_cooldown_secs: 2 * 60,
            max_retries: 5,
            lockout_secs: 30 * 60,
            code_length: 6,
        }
    }
}

/// The OTP fields of a user row, as read before an issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OtpState {
    pub retry_count: i64,
    pub last_sent: Option<i64>,
}

/// What a successful gate evaluation allows the caller to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Issuance {
    pub expires_at: i64,
    pub retry_count: i64,
    pub sent_at: i64,
}

impl OtpPolicy {
    /// Run both rate gates in order and compute the fields to persist.
    pub fn evaluate(&self, state: OtpState, now: i64) -> Result<Issuance> {
        let mut retry_count = state.retry_count;

        if retry_count >= self.max_retries {
            // A burst-capped row always has a last_sent; treat a missing one as expired.
            let unlock_at = state.last_sent.map_or(now, |t| t + self.lockout_secs);
            if now < unlock_at {
                return Err(Error::RateLimited {
                    retry_after_secs: unlock_at - now,
                });
            }
            retry_count = 0;
        }

        if let Some(last_sent) = state.last_sent {
            let resend_at = last_sent + self.resend_cooldown_secs;
            if now < resend_at {
                return Err(Error::ResendTooSoon {
                    retry_after_secs: resend_at - now,
                });
            }
        }

        Ok(Issuance {
            expires_at: now + self.code_ttl_secs,
            retry_count: retry_count + 1,
            sent_at: now,
        })
    }
}

/// Check a submitted code against the stored one.
///
/// Exact string comparison, no trimming. A code is rejected as invalid before
/// expiry is considered, so a wrong code never reveals whether one is pending.
pub fn check_code(
    stored: Option<&str>,
    expires_at: Option<i64>,
    submitted: &str,
    now: i64,
) -> Result<()> {
    match stored {
        Some(code) if code == submitted => {}
        _ => return Err(Error::InvalidCode),
    }
    match expires_at {
        Some(exp) if exp < now => Err(Error::Expired),
        Some(_) => Ok(()),
        // otp and otp_expiry are set together; a code without expiry is unusable.
        None => Err(Error::InvalidCode),
    }
}

/// Source of one-time codes.
pub trait CodeSource: Send + Sync {
    fn generate(&self, length: u32) -> String;
}

/// Uniform numeric codes from the thread-local CSPRNG, leading zeros kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeSource;

impl CodeSource for RandomCodeSource {
    fn generate(&self, length: u32) -> String {
        let mut rng = rand::rng();
        (0..length)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect()
    }
}
