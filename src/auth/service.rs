//! Authentication Service

use chrono::{Duration, Utc};

use crate::domain::{AuthenticatedUser, Balance, UserId};
use crate::store::{StoreError, UserDirectory};

use super::password::{generate_token, hash_password, hash_token, verify_password};

const MAX_USERNAME_LEN: usize = 64;

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Password must not be empty")]
    EmptyPassword,

    #[error("Missing or invalid bearer token")]
    InvalidToken,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Registration and session settings
#[derive(Debug, Clone, Copy)]
pub struct AuthSettings {
    pub initial_coins: Balance,
    pub session_ttl: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            initial_coins: Balance::new(1000).unwrap_or_else(|_| Balance::zero()),
            session_ttl: Duration::hours(1),
        }
    }
}

/// Bearer token handed back on login
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub user: AuthenticatedUser,
}

/// Authentication Service
#[derive(Debug, Clone)]
pub struct AuthService<D> {
    directory: D,
    settings: AuthSettings,
}

impl<D: UserDirectory> AuthService<D> {
    pub fn new(directory: D, settings: AuthSettings) -> Self {
        Self {
            directory,
            settings,
        }
    }

    /// Create a user with the configured starting balance
    pub async fn register(&self, username: &str, password: &str) -> Result<UserId, AuthError> {
        validate_username(username)?;
        if password.is_empty() {
            return Err(AuthError::EmptyPassword);
        }

        let password_hash = hash_password(password);
        let user_id = self
            .directory
            .create_user(username, &password_hash, self.settings.initial_coins)
            .await?
            .ok_or_else(|| AuthError::UsernameTaken(username.to_string()))?;

        tracing::info!(
            user_id = %user_id,
            username = %username,
            coins = self.settings.initial_coins.value(),
            "User registered"
        );

        Ok(user_id)
    }

    /// Verify a password and open a new session
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<IssuedToken, AuthError> {
        let credentials = self
            .directory
            .find_credentials(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &credentials.password_hash) {
            tracing::debug!(username = %username, "Password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let token = generate_token();
        let expires_at = Utc::now() + self.settings.session_ttl;
        self.directory
            .insert_session(&hash_token(&token), credentials.id, expires_at)
            .await?;

        tracing::info!(user_id = %credentials.id, expires_at = %expires_at, "Session opened");

        Ok(IssuedToken {
            token,
            user: AuthenticatedUser::new(credentials.id, credentials.username),
        })
    }

    /// Map a bearer token to its user
    pub async fn resolve_token(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        if token.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        self.directory
            .find_session(&hash_token(token), Utc::now())
            .await?
            .ok_or(AuthError::InvalidToken)
    }
}

fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
        return Err(AuthError::InvalidUsername(format!(
            "must be 1-{} characters",
            MAX_USERNAME_LEN
        )));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(AuthError::InvalidUsername(
            "must not contain whitespace".to_string(),
        ));
    }
    Ok(())
}
