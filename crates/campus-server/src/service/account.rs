//! Account workflows: registration, password login, token rotation, profile.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use campus_core::{Action, Actor, Error, Result, Role};

use super::validate;
use crate::auth::password::{self, MIN_PASSWORD_LEN};
use crate::auth::JwtManager;
use crate::storage::{CampusDatabase, Gender, NewUser, User};

/// Access and refresh tokens handed to an authenticated user.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub access_expires_at: i64,
    pub refresh_token: String,
    pub refresh_expires_at: i64,
}

/// An authenticated user and their tokens.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user: User,
    pub tokens: TokenPair,
}

/// Registration form.
#[derive(Debug, Clone)]
pub struct NewAccount<'a> {
    pub phone: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub national_id: &'a str,
    pub gender: Gender,
}

pub struct AccountService {
    db: CampusDatabase,
    jwt: Arc<JwtManager>,
}

impl AccountService {
    pub fn new(db: CampusDatabase, jwt: Arc<JwtManager>) -> Self {
        Self { db, jwt }
    }

    /// Self-service signup. New accounts are always `Normal`.
    #[instrument(skip(self, form), fields(op = "register"))]
    pub async fn register(&self, form: &NewAccount<'_>) -> Result<Session> {
        let user = self.create_user_with_role(form, Role::Normal).await?;
        let tokens = issue_tokens(&self.db, &self.jwt, &user).await?;
        Ok(Session { user, tokens })
    }

    /// Create an account with an explicit role (operator path).
    #[instrument(skip(self, form), fields(op = "create_user", role = %role))]
    pub async fn create_user_with_role(&self, form: &NewAccount<'_>, role: Role) -> Result<User> {
        validate::phone(form.phone)?;
        validate::national_id(form.national_id)?;
        validate::non_empty("first name", form.first_name)?;
        validate::non_empty("last name", form.last_name)?;
        if form.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let hash = password::hash_password(form.password)
            .map_err(|e| Error::PasswordHash(e.to_string()))?;

        let user = self
            .db
            .create_user(&NewUser {
                phone: form.phone,
                password_hash: &hash,
                first_name: form.first_name,
                last_name: form.last_name,
                national_id: form.national_id,
                gender: form.gender,
                role,
            })
            .await
            .map_err(|e| match Error::from(e) {
                Error::Conflict(_) => {
                    Error::Conflict("phone or national id is already registered".into())
                }
                other => other,
            })?;

        info!(user_id = user.id, role = %user.role, "User created");
        Ok(user)
    }

    #[instrument(skip(self, password), fields(op = "login"))]
    pub async fn login(&self, phone: &str, password: &str) -> Result<Session> {
        let user = match self.db.get_user_by_phone(phone).await {
            Ok(user) => user,
            Err(crate::storage::DatabaseError::NotFound(_)) => {
                return Err(Error::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        let valid = password::verify_password(password, &user.password_hash)
            .map_err(|e| Error::PasswordHash(e.to_string()))?;
        if !valid {
            warn!(user_id = user.id, "Failed login attempt");
            return Err(Error::InvalidCredentials);
        }
        if !user.is_active {
            return Err(Error::AccountInactive);
        }

        let tokens = issue_tokens(&self.db, &self.jwt, &user).await?;
        info!(user_id = user.id, "User logged in");
        Ok(Session { user, tokens })
    }

    /// Rotate a refresh token: the presented one is revoked and a new pair issued.
    #[instrument(skip(self, refresh_token), fields(op = "refresh"))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let claims = self
            .jwt
            .validate(refresh_token)
            .map_err(|e| Error::Token(e.to_string()))?;
        if !claims.is_refresh() {
            return Err(Error::Token("not a refresh token".into()));
        }

        let hash = JwtManager::hash_token(refresh_token);
        let stored = self
            .db
            .get_token_by_hash(&hash, campus_core::db::unix_timestamp())
            .await?
            .ok_or_else(|| Error::Token("refresh token revoked or expired".into()))?;

        // Two racing refreshes of one token: only the revoker proceeds.
        if !self.db.revoke_token(&stored.id).await? {
            return Err(Error::Token("refresh token revoked or expired".into()));
        }

        let user = self.db.get_user(stored.user_id).await?;
        if !user.is_active {
            return Err(Error::AccountInactive);
        }
        issue_tokens(&self.db, &self.jwt, &user).await
    }

    #[instrument(skip(self, refresh_token), fields(op = "revoke"))]
    pub async fn revoke(&self, refresh_token: &str) -> Result<()> {
        let hash = JwtManager::hash_token(refresh_token);
        let stored = self
            .db
            .get_token_by_hash(&hash, campus_core::db::unix_timestamp())
            .await?
            .ok_or_else(|| Error::Token("refresh token revoked or expired".into()))?;
        self.db.revoke_token(&stored.id).await?;
        info!(user_id = stored.user_id, "Refresh token revoked");
        Ok(())
    }

    /// Resolve an access token to the calling actor. The role is re-read so a
    /// demotion takes effect before the token expires.
    pub async fn authenticate(&self, access_token: &str) -> Result<Actor> {
        let claims = self
            .jwt
            .validate(access_token)
            .map_err(|e| Error::Token(e.to_string()))?;
        if !claims.is_access() {
            return Err(Error::Token("not an access token".into()));
        }
        let user_id = claims
            .user_id()
            .ok_or_else(|| Error::Token("malformed subject".into()))?;
        let user = self.db.get_user(user_id).await?;
        if !user.is_active {
            return Err(Error::AccountInactive);
        }
        Ok(Actor::new(user.id, user.role))
    }

    pub async fn profile(&self, actor: &Actor, user_id: i64) -> Result<User> {
        actor.authorize(Action::ViewResource, Some(user_id))?;
        Ok(self.db.get_user(user_id).await?)
    }

    pub async fn update_profile(
        &self,
        actor: &Actor,
        first_name: &str,
        last_name: &str,
        gender: Gender,
    ) -> Result<User> {
        validate::non_empty("first name", first_name)?;
        validate::non_empty("last name", last_name)?;
        Ok(self
            .db
            .update_profile(actor.user_id, first_name, last_name, gender)
            .await?)
    }

    /// Enable or disable an account. Disabling also revokes its refresh tokens.
    #[instrument(skip(self), fields(op = "set_active"))]
    pub async fn set_active(&self, actor: &Actor, user_id: i64, active: bool) -> Result<()> {
        actor.authorize(Action::ManageUsers, None)?;
        if !self.db.set_user_active(user_id, active).await? {
            return Err(Error::NotFound(format!("User {user_id}")));
        }
        if !active {
            self.db.revoke_user_tokens(user_id).await?;
        }
        info!(user_id, active, "Account activity changed");
        Ok(())
    }
}

/// Issue a token pair for `user` and store the refresh token hash.
pub(crate) async fn issue_tokens(
    db: &CampusDatabase,
    jwt: &JwtManager,
    user: &User,
) -> Result<TokenPair> {
    let access = jwt
        .issue_access_token(user.id, &user.phone, user.role)
        .map_err(|e| Error::Token(e.to_string()))?;
    let refresh = jwt
        .issue_refresh_token(user.id, &user.phone, user.role)
        .map_err(|e| Error::Token(e.to_string()))?;

    db.create_token(
        &refresh.jti,
        user.id,
        &JwtManager::hash_token(&refresh.token),
        refresh.expires_at,
    )
    .await?;

    Ok(TokenPair {
        access_token: access.token,
        access_expires_at: access.expires_at,
        refresh_token: refresh.token,
        refresh_expires_at: refresh.expires_at,
    })
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
#[path = "account_tests.rs"]
mod tests;
