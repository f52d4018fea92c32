//! Session tracking for the single active user.
//!
//! The persisted value is a signed, expiring token rather than the user record:
//!
//! ```text
//! token = hex(json(claims)) "." hex(hmac_sha256(secret, json(claims)))
//! ```
//!
//! Restoring a session re-checks the signature and the expiry, and that the
//! claims still describe the stored account: same creation time, same session
//! generation. The role is always taken from the credential store.

use crate::error::{DashboardError, Result};
use crate::kv::KeyValueStore;
use crate::user_models::{Role, User};
use crate::user_storage::CredentialStore;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Key under which the session token is persisted.
pub const SESSION_KEY: &str = "current_session";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub username: String,
    pub role: Role,
    pub account_created_at: DateTime<Utc>,
    pub generation: u32,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionClaims {
    /// Whether these claims were issued for this exact account record.
    ///
    /// A username that was deleted and re-created, or an account whose
    /// password changed since issue, no longer matches.
    pub fn is_for(&self, user: &User) -> bool {
        self.username == user.username
            && self.account_created_at == user.created_at
            && self.generation == user.session_generation
    }

    /// Looks up the account the claims were issued for.
    pub fn resolve<'a>(&self, users: &'a CredentialStore) -> Result<&'a User> {
        users
            .get(&self.username)
            .filter(|user| self.is_for(user))
            .ok_or_else(|| DashboardError::SessionInvalid("account changed since login".to_string()))
    }
}

#[derive(Clone)]
pub struct SessionSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl SessionSigner {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| DashboardError::SessionInvalid("invalid signing key".to_string()))
    }

    pub fn issue(&self, user: &User) -> Result<String> {
        self.issue_at(user, Utc::now())
    }

    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<String> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| DashboardError::SessionInvalid("session lifetime out of range".to_string()))?;
        let claims = SessionClaims {
            username: user.username.clone(),
            role: user.role,
            account_created_at: user.created_at,
            generation: user.session_generation,
            issued_at: now,
            expires_at,
        };
        let payload = serde_json::to_vec(&claims)?;

        let mut mac = self.mac()?;
        mac.update(&payload);
        let signature = mac.finalize().into_bytes();

        Ok(format!("{}.{}", hex::encode(payload), hex::encode(signature)))
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims> {
        let (payload_hex, signature_hex) = token
            .trim()
            .split_once('.')
            .ok_or_else(|| DashboardError::SessionInvalid("malformed token".to_string()))?;

        let payload = hex::decode(payload_hex)
            .map_err(|_| DashboardError::SessionInvalid("malformed token payload".to_string()))?;
        let signature = hex::decode(signature_hex)
            .map_err(|_| DashboardError::SessionInvalid("malformed token signature".to_string()))?;

        let mut mac = self.mac()?;
        mac.update(&payload);
        mac.verify_slice(&signature)
            .map_err(|_| DashboardError::SessionInvalid("signature mismatch".to_string()))?;

        let claims: SessionClaims = serde_json::from_slice(&payload)
            .map_err(|_| DashboardError::SessionInvalid("unreadable claims".to_string()))?;

        if claims.expires_at <= now {
            return Err(DashboardError::SessionInvalid("session expired".to_string()));
        }
        Ok(claims)
    }
}

/// Tracks the active user and mirrors it into a [`KeyValueStore`].
#[derive(Debug)]
pub struct SessionManager<S> {
    store: S,
    signer: SessionSigner,
    current: Option<User>,
}

impl<S: KeyValueStore> SessionManager<S> {
    pub fn new(store: S, signer: SessionSigner) -> Self {
        Self {
            store,
            signer,
            current: None,
        }
    }

    pub fn login(&mut self, users: &CredentialStore, username: &str, password: &str) -> Result<User> {
        let user = users.authenticate(username, password).ok_or_else(|| {
            warn!(username, "login rejected");
            DashboardError::InvalidCredentials
        })?;

        let token = self.signer.issue(&user)?;
        self.store.set(SESSION_KEY, &token)?;
        self.current = Some(user.clone());

        info!(username, role = %user.role, "logged in");
        Ok(user)
    }

    /// Resumes a persisted session without prompting for credentials.
    ///
    /// Tokens that fail verification are removed from the store.
    pub fn restore(&mut self, users: &CredentialStore) -> Result<Option<User>> {
        let Some(token) = self.store.get(SESSION_KEY)? else {
            return Ok(None);
        };

        let claims = match self.signer.verify(&token) {
            Ok(claims) => claims,
            Err(err) => {
                warn!(error = %err, "discarding persisted session");
                self.store.remove(SESSION_KEY)?;
                self.current = None;
                return Ok(None);
            }
        };

        let user = match claims.resolve(users) {
            Ok(user) => user.clone(),
            Err(err) => {
                warn!(username = %claims.username, error = %err, "discarding persisted session");
                self.store.remove(SESSION_KEY)?;
                self.current = None;
                return Ok(None);
            }
        };

        self.current = Some(user.clone());
        Ok(Some(user))
    }

    pub fn logout(&mut self) -> Result<()> {
        if let Some(user) = self.current.take() {
            info!(username = %user.username, "logged out");
        }
        self.store.remove(SESSION_KEY)
    }

    /// Re-reads the current user after account changes.
    ///
    /// Clears the session if the account is gone or was re-created. A password
    /// changed by the current user re-issues the persisted token so the session
    /// survives it.
    pub fn refresh(&mut self, users: &CredentialStore) -> Result<Option<&User>> {
        let Some((username, created_at, generation)) = self
            .current
            .as_ref()
            .map(|u| (u.username.clone(), u.created_at, u.session_generation))
        else {
            return Ok(None);
        };

        let user = match users.get(&username) {
            Some(user) if user.created_at == created_at => user.clone(),
            _ => {
                self.logout()?;
                return Ok(None);
            }
        };

        if user.session_generation != generation {
            let token = self.signer.issue(&user)?;
            self.store.set(SESSION_KEY, &token)?;
        }
        self.current = Some(user);
        Ok(self.current.as_ref())
    }

    pub fn current(&self) -> Option<&User> {
        self.current.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
