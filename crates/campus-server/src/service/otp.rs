//! OTP login: issue a code by SMS, verify it for a session.
//!
//! Gate evaluation is pure ([`OtpPolicy::evaluate`]); persistence is a
//! compare-and-set on the counters that were evaluated, so two concurrent
//! issuances for one user cannot both pass the cooldown.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use campus_core::otp::{self, CodeSource, OtpPolicy};
use campus_core::{Clock, Error, Result};

use super::account::{issue_tokens, Session};
use crate::auth::JwtManager;
use crate::notifications::{Channel, Notification, NotificationDispatcher};
use crate::storage::{CampusDatabase, OtpWrite, SmsLog};

/// Compare-and-set attempts before giving up on a contended row.
const MAX_CAS_ATTEMPTS: usize = 3;

/// A code was generated, stored and handed to the SMS dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OtpIssued {
    pub expires_at: i64,
    /// Earliest time the next code may be requested.
    pub resend_after: i64,
}

pub struct OtpService {
    db: CampusDatabase,
    jwt: Arc<JwtManager>,
    clock: Arc<dyn Clock>,
    codes: Arc<dyn CodeSource>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    policy: OtpPolicy,
}

impl OtpService {
    pub fn new(
        db: CampusDatabase,
        jwt: Arc<JwtManager>,
        clock: Arc<dyn Clock>,
        codes: Arc<dyn CodeSource>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        policy: OtpPolicy,
    ) -> Self {
        Self {
            db,
            jwt,
            clock,
            codes,
            dispatcher,
            policy,
        }
    }

    /// Issue a fresh code to the user holding `phone`.
    ///
    /// The code and counters are persisted before delivery. A failed delivery
    /// is logged and reported as [`Error::DeliveryFailed`] without undoing
    /// the issuance. A deactivated account gets no code and its counters
    /// are left alone.
    #[instrument(skip(self), fields(op = "otp_issue"))]
    pub async fn issue(&self, phone: &str) -> Result<OtpIssued> {
        let mut user = self.db.get_user_by_phone(phone).await?;
        if !user.is_active {
            return Err(Error::AccountInactive);
        }
        let mut attempts = 0;

        let (issuance, code) = loop {
            let now = self.clock.now();
            let snapshot = user.otp_state();
            let issuance = self.policy.evaluate(snapshot, now)?;
            let code = self.codes.generate(self.policy.code_length);

            let stored = self
                .db
                .store_otp(
                    user.id,
                    snapshot,
                    &OtpWrite {
                        code: &code,
                        expires_at: issuance.expires_at,
                        retry_count: issuance.retry_count,
                        sent_at: issuance.sent_at,
                    },
                )
                .await?;
            if stored {
                break (issuance, code);
            }

            // Another issuance won; its fresh counters decide our outcome.
            attempts += 1;
            debug!(user_id = user.id, attempts, "OTP compare-and-set lost, re-reading");
            user = self.db.get_user(user.id).await?;
            if attempts >= MAX_CAS_ATTEMPTS {
                let now = self.clock.now();
                self.policy.evaluate(user.otp_state(), now)?;
                return Err(Error::ResendTooSoon {
                    retry_after_secs: self.policy.resend_cooldown_secs,
                });
            }
        };

        info!(
            user_id = user.id,
            retry_count = issuance.retry_count,
            expires_at = issuance.expires_at,
            "OTP issued"
        );

        let outcome = self
            .dispatcher
            .send(&user.phone, Channel::Sms, &Notification::OtpCode { code: code.clone() })
            .await;
        self.db
            .insert_sms_log(
                user.id,
                &user.phone,
                &code,
                outcome.delivered,
                &outcome.response,
                issuance.sent_at,
            )
            .await?;

        if !outcome.delivered {
            warn!(user_id = user.id, "OTP delivery failed");
            return Err(Error::DeliveryFailed(outcome.response.to_string()));
        }

        Ok(OtpIssued {
            expires_at: issuance.expires_at,
            resend_after: issuance.sent_at + self.policy.resend_cooldown_secs,
        })
    }

    /// Check `code` for the user holding `phone` and open a session.
    /// A code is consumed on success and cannot be used twice. A
    /// deactivated account is rejected before its code is touched.
    #[instrument(skip(self, code), fields(op = "otp_verify"))]
    pub async fn verify(&self, phone: &str, code: &str) -> Result<Session> {
        let user = self.db.get_user_by_phone(phone).await?;
        if !user.is_active {
            return Err(Error::AccountInactive);
        }
        let now = self.clock.now();
        otp::check_code(user.otp.as_deref(), user.otp_expiry, code, now)?;

        // A concurrent verify may have consumed it first.
        if !self.db.consume_otp(user.id, code, now).await? {
            return Err(Error::InvalidCode);
        }

        let user = self.db.get_user(user.id).await?;
        let tokens = issue_tokens(&self.db, &self.jwt, &user).await?;
        info!(user_id = user.id, "OTP verified");
        Ok(Session { user, tokens })
    }

    pub async fn sms_logs(&self, user_id: i64) -> Result<Vec<SmsLog>> {
        Ok(self.db.list_sms_logs(user_id).await?)
    }

    pub const fn policy(&self) -> &OtpPolicy {
        &self.policy
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
#[path = "otp_tests.rs"]
mod tests;
