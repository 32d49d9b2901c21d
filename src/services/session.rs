// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session manager: the single authoritative view of the current user.
//!
//! Responsibilities:
//! - Single-flight current-user fetch (concurrent callers share one fetch,
//!   so lazy default-row creation cannot race against itself)
//! - Stale-credential detection and purge
//! - Sign-up/sign-in/sign-out with user-facing error messages
//! - Identity-change listener with duplicate-registration protection
//! - Cache invalidation after every user-affecting mutation

use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::auth::{Identity, IdentityEvent, IdentityMetadata, IdentityProvider};
use crate::error::{AppError, Result};
use crate::models::profile::{AgeGroup, ProfileUpdate};
use crate::models::user::AuthUser;
use crate::services::profile::{LessonOutcome, ProfileService};

/// How long to wait after an identity transition before refetching, so the
/// new credential reaches the row stores.
const SESSION_PROPAGATION_DELAY: Duration = Duration::from_millis(100);

/// An in-flight current-user fetch, shareable across callers.
type UserFetch = Shared<BoxFuture<'static, Option<AuthUser>>>;

/// Signup details collected by the registration form.
#[derive(Debug, Clone)]
pub struct SignUpDetails {
    pub name: String,
    pub age: u8,
    pub age_group: AgeGroup,
}

/// Result of a signup attempt.
#[derive(Debug)]
pub enum SignUpOutcome {
    /// Account created and session established
    SignedIn(Box<AuthUser>),
    /// Account created; the provider requires email confirmation before
    /// a session can be established
    ConfirmationRequired,
}

/// Session manager. Cheap to clone; clones share the cache and listener.
#[derive(Clone)]
pub struct SessionService {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    provider: Arc<dyn IdentityProvider>,
    profiles: ProfileService,
    /// The single-flight slot: the cached in-flight fetch, tagged with a
    /// generation so a settled fetch only clears itself.
    inflight: Mutex<Option<(u64, UserFetch)>>,
    fetch_seq: AtomicU64,
    listener_active: AtomicBool,
}

impl SessionService {
    pub fn new(provider: Arc<dyn IdentityProvider>, profiles: ProfileService) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                provider,
                profiles,
                inflight: Mutex::new(None),
                fetch_seq: AtomicU64::new(0),
                listener_active: AtomicBool::new(false),
            }),
        }
    }

    /// The current assembled user, or `None` when not authenticated.
    ///
    /// Never fails: any underlying error resolves to `None` (after a
    /// best-effort credential purge when the error marks a stale session).
    pub async fn current_user(&self) -> Option<AuthUser> {
        Arc::clone(&self.inner).current_user().await
    }

    /// Drop the cached in-flight fetch so the next read starts fresh.
    /// Does not touch the external credential.
    pub async fn invalidate(&self) {
        self.inner.invalidate().await;
    }

    /// Register a new account.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        details: SignUpDetails,
    ) -> Result<SignUpOutcome> {
        let email = email.trim().to_lowercase();
        tracing::info!(email = %email, "Starting sign up");

        self.invalidate().await;

        let metadata = IdentityMetadata {
            name: Some(details.name),
            age: Some(details.age),
            age_group: Some(details.age_group),
            avatar: Some(String::new()),
        };

        let response = self
            .inner
            .provider
            .sign_up(&email, password, &metadata)
            .await
            .map_err(|err| AppError::AuthApi(friendly_signup_error(&err)))?;

        if !response.session_established {
            tracing::info!(email = %email, "Email confirmation required");
            return Ok(SignUpOutcome::ConfirmationRequired);
        }

        let Some(identity) = response.identity else {
            return Err(AppError::AuthApi(
                "Failed to create account. Please try again.".to_string(),
            ));
        };

        // Eagerly create the profile and progress rows; lazy creation
        // repairs any failure on the next fetch.
        self.inner.profiles.seed_rows(&identity).await;

        match self.current_user().await {
            Some(user) => Ok(SignUpOutcome::SignedIn(Box::new(user))),
            None => Err(AppError::AuthApi(
                "Failed to load user profile. Please try again.".to_string(),
            )),
        }
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser> {
        let email = email.trim().to_lowercase();
        tracing::info!(email = %email, "Starting sign in");

        self.invalidate().await;

        self.inner
            .provider
            .sign_in(&email, password)
            .await
            .map_err(|err| AppError::AuthApi(friendly_signin_error(&err)))?;

        // Give the new credential a moment to reach the row stores
        tokio::time::sleep(SESSION_PROPAGATION_DELAY).await;

        match self.current_user().await {
            Some(user) => {
                tracing::info!(user_id = %user.id, "Signed in");
                Ok(user)
            }
            None => Err(AppError::AuthApi(
                "Failed to load user profile. Please try again.".to_string(),
            )),
        }
    }

    /// End the current session.
    pub async fn sign_out(&self) -> Result<()> {
        tracing::info!("Signing out");
        self.invalidate().await;
        self.inner.provider.sign_out().await
    }

    /// Update the current user's profile. Only the provided fields are
    /// written.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<()> {
        let identity = self.require_identity().await?;
        let result = self.inner.profiles.update_profile(&identity.id, &update).await;
        if result.is_ok() {
            self.invalidate().await;
        }
        result
    }

    /// Record a lesson completion for the current user.
    pub async fn complete_lesson(&self, lesson_id: &str) -> Result<LessonOutcome> {
        let identity = self.require_identity().await?;
        let outcome = self
            .inner
            .profiles
            .complete_lesson(&identity.id, lesson_id)
            .await?;

        if outcome.newly_completed {
            self.invalidate().await;
        }

        Ok(outcome)
    }

    /// Register the identity-change listener.
    ///
    /// Only one listener may exist; a second registration is ignored and
    /// returns a guard that does nothing. The real guard stops delivery
    /// when dropped or unsubscribed.
    pub fn on_identity_change<F>(&self, callback: F) -> IdentityChangeGuard
    where
        F: Fn(Option<AuthUser>) + Send + Sync + 'static,
    {
        if self.inner.listener_active.swap(true, Ordering::SeqCst) {
            tracing::warn!("Identity change listener already registered, ignoring");
            return IdentityChangeGuard { inner: None };
        }

        let mut events = self.inner.provider.subscribe();
        let inner = Arc::clone(&self.inner);

        let handle = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Identity event stream lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                tracing::debug!(?event, "Identity changed");
                inner.invalidate().await;

                match event {
                    IdentityEvent::SignedOut => callback(None),
                    IdentityEvent::SignedIn | IdentityEvent::TokenRefreshed => {
                        tokio::time::sleep(SESSION_PROPAGATION_DELAY).await;
                        callback(Arc::clone(&inner).current_user().await);
                    }
                }
            }
        });

        IdentityChangeGuard {
            inner: Some(GuardInner {
                handle,
                session: Arc::clone(&self.inner),
            }),
        }
    }

    /// The current identity, or `NotAuthenticated`.
    ///
    /// Goes straight to the provider rather than through the single-flight
    /// cache: mutations need the bare identity, not the assembled user.
    async fn require_identity(&self) -> Result<Identity> {
        match self.inner.provider.current_identity().await {
            Ok(Some(identity)) => Ok(identity),
            Ok(None) => Err(AppError::NotAuthenticated),
            Err(err) => {
                self.inner.purge_if_stale(&err).await;
                Err(AppError::NotAuthenticated)
            }
        }
    }
}

impl SessionInner {
    async fn current_user(self: Arc<Self>) -> Option<AuthUser> {
        let (seq, fetch) = {
            let mut slot = self.inflight.lock().await;
            match slot.as_ref() {
                Some((seq, fetch)) => {
                    tracing::debug!("Joining in-flight current-user fetch");
                    (*seq, fetch.clone())
                }
                None => {
                    let seq = self.fetch_seq.fetch_add(1, Ordering::Relaxed);
                    let inner = Arc::clone(&self);
                    let fetch: UserFetch =
                        async move { inner.fetch_current_user().await }.boxed().shared();
                    *slot = Some((seq, fetch.clone()));
                    (seq, fetch)
                }
            }
        };

        let user = fetch.await;

        // Clear the slot as soon as the fetch settles so the next call
        // starts fresh. The generation check keeps a settled fetch from
        // clearing a newer one installed after an invalidate().
        let mut slot = self.inflight.lock().await;
        if matches!(slot.as_ref(), Some((s, _)) if *s == seq) {
            *slot = None;
        }

        user
    }

    async fn invalidate(&self) {
        *self.inflight.lock().await = None;
    }

    /// The underlying fetch behind the single-flight slot.
    async fn fetch_current_user(&self) -> Option<AuthUser> {
        let identity = match self.provider.current_identity().await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                tracing::debug!("No authenticated identity");
                return None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Identity fetch failed");
                self.purge_if_stale(&err).await;
                return None;
            }
        };

        match self.profiles.assemble(&identity).await {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::error!(user_id = %identity.id, error = %err, "User assembly failed");
                self.purge_if_stale(&err).await;
                None
            }
        }
    }

    /// Best-effort credential purge when an error marks a stale session,
    /// so subsequent calls do not keep hitting the same bad credential.
    async fn purge_if_stale(&self, err: &AppError) {
        if !err.is_session_error() {
            return;
        }

        tracing::info!("Stale session detected, signing out to clear it");
        if let Err(sign_out_err) = self.provider.sign_out().await {
            tracing::warn!(error = %sign_out_err, "Stale session cleanup failed");
        }
    }
}

/// Handle returned by `on_identity_change`. Dropping it (or calling
/// `unsubscribe`) stops delivery; the duplicate-registration guard is inert.
pub struct IdentityChangeGuard {
    inner: Option<GuardInner>,
}

struct GuardInner {
    handle: JoinHandle<()>,
    session: Arc<SessionInner>,
}

impl IdentityChangeGuard {
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(guard) = self.inner.take() {
            guard.handle.abort();
            guard.session.listener_active.store(false, Ordering::SeqCst);
        }
    }
}

impl Drop for IdentityChangeGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// The provider's message without our error-variant prefix.
fn raw_message(err: &AppError) -> String {
    match err {
        AppError::AuthApi(msg) | AppError::Database(msg) => msg.clone(),
        other => other.to_string(),
    }
}

/// Map raw signup provider errors to user-facing messages.
fn friendly_signup_error(err: &AppError) -> String {
    let raw = raw_message(err);

    if raw.contains("User already registered") {
        "An account with this email already exists. Please try signing in instead.".to_string()
    } else if raw.contains("Invalid email") {
        "Please enter a valid email address.".to_string()
    } else if raw.contains("Password should be at least") {
        "Password must be at least 6 characters long.".to_string()
    } else if raw.contains("Signup is disabled") {
        "Account creation is currently disabled. Please contact support.".to_string()
    } else {
        raw
    }
}

/// Map raw sign-in provider errors to user-facing messages.
fn friendly_signin_error(err: &AppError) -> String {
    let raw = raw_message(err);

    if raw.contains("Invalid login credentials") {
        "Invalid email or password. Please check your credentials and try again.".to_string()
    } else if raw.contains("Email not confirmed") {
        "Please check your email and click the confirmation link before signing in.".to_string()
    } else if raw.contains("Too many requests") {
        "Too many sign-in attempts. Please wait a moment and try again.".to_string()
    } else if raw.contains("User not found") {
        "No account found with this email address. Please check your email or create a new account."
            .to_string()
    } else if raw.contains("Invalid password") {
        "Incorrect password. Please try again.".to_string()
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_friendly_signin_messages() {
        let err = AppError::AuthApi("HTTP 400: Invalid login credentials".to_string());
        assert!(friendly_signin_error(&err).starts_with("Invalid email or password"));

        let err = AppError::AuthApi("HTTP 429: Too many requests".to_string());
        assert!(friendly_signin_error(&err).starts_with("Too many sign-in attempts"));

        let err = AppError::AuthApi("HTTP 500: something else".to_string());
        assert_eq!(friendly_signin_error(&err), "HTTP 500: something else");
    }

    #[test]
    fn test_friendly_signup_messages() {
        let err = AppError::AuthApi("HTTP 422: User already registered".to_string());
        assert!(friendly_signup_error(&err).contains("already exists"));

        let err = AppError::AuthApi("HTTP 422: Password should be at least 6 characters".to_string());
        assert!(friendly_signup_error(&err).contains("at least 6 characters"));
    }
}
