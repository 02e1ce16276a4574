//! Explicit session context.
//!
//! Holds the bearer token and the signed-in user's role and division. It is
//! built once, handed to `ApiClient` by `Arc`, populated at login and wiped at
//! logout or on any authentication failure.
//!
//! Key properties:
//! - Token bytes are zeroed when the session is cleared or dropped
//! - A missing or locally-expired token never leaves the process
//! - Clearing always reaches the persistent store, not just memory

pub mod jwt;
pub mod store;

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::config::ConfigError;

pub use store::{FileSessionStore, MemorySessionStore, SessionStore, StoredSession};

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session file is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The three authentication failures the backend signals with a 401.
/// Every one of them ends the local session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthFailure {
    Expired,
    Invalid,
    Required,
}

impl AuthFailure {
    pub fn code(self) -> &'static str {
        match self {
            Self::Expired => "TOKEN_EXPIRED",
            Self::Invalid => "TOKEN_INVALID",
            Self::Required => "TOKEN_REQUIRED",
        }
    }

    /// User-facing message, as the dashboard shows it.
    pub fn message(self) -> &'static str {
        match self {
            Self::Expired => "Sesión expirada",
            Self::Invalid => "Token inválido",
            Self::Required => "Token requerido",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "TOKEN_EXPIRED" => Some(Self::Expired),
            "TOKEN_INVALID" => Some(Self::Invalid),
            "TOKEN_REQUIRED" => Some(Self::Required),
            _ => None,
        }
    }

    /// Classify free-text error messages from older backend routes.
    pub fn from_message(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        if lower.contains("token expirado") || lower.contains("jwt expired") {
            Some(Self::Expired)
        } else if lower.contains("token inválido") || lower.contains("invalid signature") {
            Some(Self::Invalid)
        } else if lower.contains("token requerido") {
            Some(Self::Required)
        } else {
            None
        }
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

// ═══════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════

/// Who is signed in. Role and division scope what the backend returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<i64>,
    #[serde(default)]
    pub division: Option<i64>,
}

#[derive(Zeroize)]
#[zeroize(drop)]
struct SessionToken {
    value: String,
}

struct Session {
    token: SessionToken,
    user: UserProfile,
}

impl Session {
    fn stored(&self) -> StoredSession {
        StoredSession {
            token: self.token.value.clone(),
            user: self.user.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// SessionContext
// ═══════════════════════════════════════════════════════════

pub struct SessionContext {
    current: RwLock<Option<Session>>,
    store: Box<dyn SessionStore>,
}

impl SessionContext {
    pub fn new(store: Box<dyn SessionStore>) -> Self {
        Self {
            current: RwLock::new(None),
            store,
        }
    }

    /// Memory-only context; nothing survives the process.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemorySessionStore::new()))
    }

    /// Load a previously persisted session. Returns whether one was found.
    pub fn restore(&self) -> Result<bool, SessionError> {
        let Some(stored) = self.store.load()? else {
            return Ok(false);
        };
        let session = Session {
            token: SessionToken {
                value: stored.token.clone(),
            },
            user: stored.user.clone(),
        };
        let mut current = self.current.write().map_err(|_| SessionError::LockPoisoned)?;
        *current = Some(session);
        tracing::debug!(user = %stored.user.user_code, "Session restored");
        Ok(true)
    }

    /// Populate the session after login and persist it.
    pub fn establish(&self, token: impl Into<String>, user: UserProfile) -> Result<(), SessionError> {
        let session = Session {
            token: SessionToken { value: token.into() },
            user,
        };
        self.store.save(&session.stored())?;
        tracing::info!(user = %session.user.user_code, "Session established");
        let mut current = self.current.write().map_err(|_| SessionError::LockPoisoned)?;
        *current = Some(session);
        Ok(())
    }

    /// Wipe memory and persistent storage. Never fails: a store error is
    /// logged, memory is cleared regardless.
    pub fn clear(&self) {
        match self.current.write() {
            Ok(mut current) => *current = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "Failed to clear persisted session");
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.read().map(|c| c.is_some()).unwrap_or(false)
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.current
            .read()
            .ok()
            .and_then(|c| c.as_ref().map(|s| s.user.clone()))
    }

    /// Token to send on the next request.
    ///
    /// A missing token or one whose JWT `exp` has passed (with skew) clears
    /// the session and fails without touching the network.
    pub fn bearer_token(&self) -> Result<Zeroizing<String>, AuthFailure> {
        self.bearer_token_at(Utc::now())
    }

    pub fn bearer_token_at(&self, now: DateTime<Utc>) -> Result<Zeroizing<String>, AuthFailure> {
        let token = self
            .current
            .read()
            .ok()
            .and_then(|c| c.as_ref().map(|s| Zeroizing::new(s.token.value.clone())))
            .filter(|t| !t.is_empty());

        let Some(token) = token else {
            self.invalidate(AuthFailure::Required);
            return Err(AuthFailure::Required);
        };

        if jwt::is_expired(&token, now) {
            self.invalidate(AuthFailure::Expired);
            return Err(AuthFailure::Expired);
        }

        Ok(token)
    }

    /// Handle an authentication failure: log it and end the session.
    pub fn invalidate(&self, failure: AuthFailure) {
        tracing::warn!(code = failure.code(), "Authentication failure, clearing session");
        self.clear();
    }
}
