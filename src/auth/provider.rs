//! Identity provider port.
//!
//! The provider owns credentials end to end; this crate only reads the
//! resulting identity. The trait boundary exists so the services can be
//! driven by the real GoTrue-style client in production and by scripted
//! doubles in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::AppError;
use crate::models::profile::AgeGroup;

/// Signup metadata carried on the identity, used to seed the profile row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_group: Option<AgeGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// An authenticated identity as reported by the provider.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Opaque subject id (row key for all aggregates)
    pub id: String,
    pub email: Option<String>,
    pub email_confirmed: bool,
    pub metadata: IdentityMetadata,
}

/// Identity transitions broadcast by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Result of a signup call. The identity may exist without an established
/// session when the provider requires email confirmation first.
#[derive(Debug, Clone)]
pub struct SignUpResponse {
    pub identity: Option<Identity>,
    pub session_established: bool,
}

/// External identity provider (auth API).
///
/// Errors carry the provider's raw message so callers can pattern-match
/// known substrings ("Invalid login credentials", "JWT expired", ...).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register a new identity.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &IdentityMetadata,
    ) -> Result<SignUpResponse, AppError>;

    /// Authenticate with email and password, establishing a session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AppError>;

    /// End the current session and invalidate the credential.
    async fn sign_out(&self) -> Result<(), AppError>;

    /// The identity behind the current credential, or `None` when no
    /// session is established.
    async fn current_identity(&self) -> Result<Option<Identity>, AppError>;

    /// Subscribe to identity transitions (sign-in, sign-out, token refresh).
    fn subscribe(&self) -> broadcast::Receiver<IdentityEvent>;
}
