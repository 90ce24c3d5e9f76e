//! JWT claims carried by Campus access and refresh tokens.

use serde::{Deserialize, Serialize};

use campus_core::{Actor, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims embedded in every token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// JWT ID (unique per token).
    pub jti: String,
    /// Subject (user ID, decimal).
    pub sub: String,
    pub phone: String,
    pub role: Role,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

impl Claims {
    pub fn is_access(&self) -> bool {
        self.token_type == TokenType::Access
    }

    pub fn is_refresh(&self) -> bool {
        self.token_type == TokenType::Refresh
    }

    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }

    /// The caller these claims authenticate, if the subject is well formed.
    pub fn actor(&self) -> Option<Actor> {
        self.user_id().map(|id| Actor::new(id, self.role))
    }
}
