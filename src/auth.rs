//! Owner authentication for admin operations.
//!
//! Listing, creating, and deleting galleries requires a signed-in owner.
//! [`AuthProvider`] is the seam to a hosted identity service; [`LocalAuth`]
//! checks a single owner account against the SHA-256 hash in `studio.toml`.
//!
//! Sign-in state is observable: [`AuthProvider::subscribe`] returns a
//! `tokio::sync::watch` receiver that sees every sign-in and sign-out.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::watch;

use crate::config::AuthConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Sign in required")]
    NotSignedIn,
    #[error("No owner password is configured")]
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub email: String,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    fn current_user(&self) -> Option<User>;

    /// Receiver that observes every change of the current user.
    fn subscribe(&self) -> watch::Receiver<Option<User>>;
}

/// Hex SHA-256 of a password, as stored in `auth.password_sha256`.
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

/// The signed-in owner, or [`AuthError::NotSignedIn`].
pub fn require_owner(auth: &dyn AuthProvider) -> Result<User, AuthError> {
    auth.current_user().ok_or(AuthError::NotSignedIn)
}

/// Single-owner provider backed by the config file.
pub struct LocalAuth {
    owner_email: String,
    password_sha256: Option<String>,
    current: watch::Sender<Option<User>>,
}

impl LocalAuth {
    pub fn new(owner_email: impl Into<String>, password_sha256: Option<String>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            owner_email: owner_email.into(),
            password_sha256: password_sha256.map(|h| h.to_ascii_lowercase()),
            current,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.owner_email.clone(), config.password_sha256.clone())
    }

    /// False when no password hash is configured and admin access is open.
    pub fn requires_password(&self) -> bool {
        self.password_sha256.is_some()
    }

    pub fn owner_email(&self) -> &str {
        &self.owner_email
    }
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let expected = self.password_sha256.as_deref().ok_or(AuthError::NotConfigured)?;
        if !email.trim().eq_ignore_ascii_case(&self.owner_email) || hash_password(password) != expected {
            tracing::warn!(email, "Rejected sign-in");
            return Err(AuthError::InvalidCredentials);
        }
        let user = User {
            email: self.owner_email.clone(),
        };
        self.current.send_replace(Some(user.clone()));
        tracing::info!(email = %user.email, "Owner signed in");
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.current.send_replace(None);
        Ok(())
    }

    fn current_user(&self) -> Option<User> {
        self.current.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.current.subscribe()
    }
}
