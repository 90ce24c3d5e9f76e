//! User, token and SMS log queries.

use campus_core::Role;
use campus_core::db::unix_timestamp;
use campus_core::otp::OtpState;

use super::db::{CampusDatabase, DatabaseError};
use super::models::{Gender, SmsLog, Token, User};

/// Fields required to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub phone: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub national_id: &'a str,
    pub gender: Gender,
    pub role: Role,
}

/// OTP fields written by one issuance.
#[derive(Debug, Clone)]
pub struct OtpWrite<'a> {
    pub code: &'a str,
    pub expires_at: i64,
    pub retry_count: i64,
    pub sent_at: i64,
}

impl CampusDatabase {
    // =========================================================================
    // User queries
    // =========================================================================

    pub async fn create_user(&self, new: &NewUser<'_>) -> Result<User, DatabaseError> {
        let now = unix_timestamp();

        let id = sqlx::query(
            "INSERT INTO users (phone, password_hash, first_name, last_name, national_id, gender, role, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new.phone)
        .bind(new.password_hash)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.national_id)
        .bind(new.gender)
        .bind(new.role)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        self.get_user(id).await
    }

    pub async fn get_user(&self, id: i64) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User {id}")))
    }

    pub async fn get_user_by_phone(&self, phone: &str) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE phone = ?")
            .bind(phone)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User with phone {phone}")))
    }

    pub async fn update_profile(
        &self,
        id: i64,
        first_name: &str,
        last_name: &str,
        gender: Gender,
    ) -> Result<User, DatabaseError> {
        let result = sqlx::query(
            "UPDATE users SET first_name = ?, last_name = ?, gender = ?, updated_at = ? WHERE id = ?",
        )
        .bind(first_name)
        .bind(last_name)
        .bind(gender)
        .bind(unix_timestamp())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("User {id}")));
        }
        self.get_user(id).await
    }

    pub async fn set_user_active(&self, id: i64, active: bool) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(unix_timestamp())
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // OTP queries
    // =========================================================================

    /// Persist a freshly issued code, but only if the row still holds the
    /// `expected` counters. Returns `false` when a concurrent issuance won.
    pub async fn store_otp(
        &self,
        user_id: i64,
        expected: OtpState,
        write: &OtpWrite<'_>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE users SET otp = ?, otp_expiry = ?, otp_retry_count = ?, otp_last_sent = ?, updated_at = ? \
             WHERE id = ? AND otp_retry_count = ? AND otp_last_sent IS ?",
        )
        .bind(write.code)
        .bind(write.expires_at)
        .bind(write.retry_count)
        .bind(write.sent_at)
        .bind(write.sent_at)
        .bind(user_id)
        .bind(expected.retry_count)
        .bind(expected.last_sent)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Clear the stored code if it still equals `code`. Retry counters are kept.
    /// Returns `false` when the code was already consumed or replaced.
    pub async fn consume_otp(
        &self,
        user_id: i64,
        code: &str,
        now: i64,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE users SET otp = NULL, otp_expiry = NULL, updated_at = ? WHERE id = ? AND otp = ?",
        )
        .bind(now)
        .bind(user_id)
        .bind(code)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn insert_sms_log(
        &self,
        user_id: i64,
        phone: &str,
        code: &str,
        delivered: bool,
        response: &serde_json::Value,
        now: i64,
    ) -> Result<SmsLog, DatabaseError> {
        let status = if delivered { "success" } else { "failed" };

        let id = sqlx::query(
            "INSERT INTO sms_logs (user_id, phone, code, status, response, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(phone)
        .bind(code)
        .bind(status)
        .bind(response.to_string())
        .bind(now)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        sqlx::query_as::<_, SmsLog>("SELECT * FROM sms_logs WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(Into::into)
    }

    pub async fn list_sms_logs(&self, user_id: i64) -> Result<Vec<SmsLog>, DatabaseError> {
        let logs = sqlx::query_as::<_, SmsLog>(
            "SELECT * FROM sms_logs WHERE user_id = ? ORDER BY id ASC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(logs)
    }

    // =========================================================================
    // Token queries
    // =========================================================================

    /// Store a refresh token hash.
    pub async fn create_token(
        &self,
        id: &str,
        user_id: i64,
        token_hash: &str,
        expires_at: i64,
    ) -> Result<Token, DatabaseError> {
        sqlx::query(
            "INSERT INTO tokens (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;

        sqlx::query_as::<_, Token>("SELECT * FROM tokens WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Token {id}")))
    }

    /// Find a live (non-revoked, non-expired) token by hash.
    pub async fn get_token_by_hash(
        &self,
        token_hash: &str,
        now: i64,
    ) -> Result<Option<Token>, DatabaseError> {
        let token = sqlx::query_as::<_, Token>(
            "SELECT * FROM tokens WHERE token_hash = ? AND revoked = 0 AND expires_at > ?",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(self.pool())
        .await?;

        Ok(token)
    }

    /// Revoke a token. Returns `false` if it was already revoked, which lets
    /// two racing refreshes of the same token resolve to one winner.
    pub async fn revoke_token(&self, id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE tokens SET revoked = 1 WHERE id = ? AND revoked = 0")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn revoke_user_tokens(&self, user_id: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("UPDATE tokens SET revoked = 1 WHERE user_id = ? AND revoked = 0")
            .bind(user_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }
}
