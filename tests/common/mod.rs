// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared test doubles: a scripted identity provider and counting stores
//! wrapped around the in-memory backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use safetylearn_api::auth::{
    Identity, IdentityEvent, IdentityMetadata, IdentityProvider, SignUpResponse,
};
use safetylearn_api::db::{AchievementStore, MemoryDb, ProfileStore, ProgressStore};
use safetylearn_api::error::AppError;
use safetylearn_api::models::achievement::AchievementUnlock;
use safetylearn_api::models::profile::{Profile, ProfileUpdate};
use safetylearn_api::models::progress::Progress;
use safetylearn_api::services::{ProfileService, SessionService};

/// Scripted identity provider.
#[derive(Default)]
pub struct FakeProvider {
    state: Mutex<FakeState>,
    pub identity_fetches: AtomicUsize,
    pub sign_outs: AtomicUsize,
    events: Mutex<Option<broadcast::Sender<IdentityEvent>>>,
}

#[derive(Default)]
struct FakeState {
    identity: Option<Identity>,
    /// Raw provider message returned by `current_identity` until cleared
    identity_error: Option<String>,
    /// Raw provider message returned by `sign_in`
    sign_in_error: Option<String>,
    /// Whether signup establishes a session or requires email confirmation
    confirm_required: bool,
    /// Artificial latency for `current_identity`, to hold fetches in flight
    fetch_delay: Duration,
}

#[allow(dead_code)]
impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_identity(&self, identity: Option<Identity>) {
        self.state.lock().unwrap().identity = identity;
    }

    pub fn set_identity_error(&self, message: &str) {
        self.state.lock().unwrap().identity_error = Some(message.to_string());
    }

    pub fn set_sign_in_error(&self, message: &str) {
        self.state.lock().unwrap().sign_in_error = Some(message.to_string());
    }

    pub fn set_confirm_required(&self, required: bool) {
        self.state.lock().unwrap().confirm_required = required;
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        self.state.lock().unwrap().fetch_delay = delay;
    }

    /// Fire an identity event as the external provider would.
    pub fn emit(&self, event: IdentityEvent) {
        let events = self.events.lock().unwrap();
        if let Some(sender) = events.as_ref() {
            let _ = sender.send(event);
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        metadata: &IdentityMetadata,
    ) -> Result<SignUpResponse, AppError> {
        let confirm_required = self.state.lock().unwrap().confirm_required;
        let identity = Identity {
            id: format!("id-{}", email),
            email: Some(email.to_string()),
            email_confirmed: !confirm_required,
            metadata: metadata.clone(),
        };

        if confirm_required {
            return Ok(SignUpResponse {
                identity: Some(identity),
                session_established: false,
            });
        }

        self.state.lock().unwrap().identity = Some(identity.clone());
        Ok(SignUpResponse {
            identity: Some(identity),
            session_established: true,
        })
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<Identity, AppError> {
        let state = self.state.lock().unwrap();
        if let Some(message) = &state.sign_in_error {
            return Err(AppError::AuthApi(message.clone()));
        }
        state
            .identity
            .clone()
            .ok_or_else(|| AppError::AuthApi("HTTP 400: Invalid login credentials".to_string()))
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        // Purging the credential also clears the condition that made it stale
        let mut state = self.state.lock().unwrap();
        state.identity = None;
        state.identity_error = None;
        Ok(())
    }

    async fn current_identity(&self) -> Result<Option<Identity>, AppError> {
        self.identity_fetches.fetch_add(1, Ordering::SeqCst);

        let (delay, error, identity) = {
            let state = self.state.lock().unwrap();
            (
                state.fetch_delay,
                state.identity_error.clone(),
                state.identity.clone(),
            )
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = error {
            return Err(AppError::AuthApi(message));
        }

        Ok(identity)
    }

    fn subscribe(&self) -> broadcast::Receiver<IdentityEvent> {
        let mut events = self.events.lock().unwrap();
        events
            .get_or_insert_with(|| broadcast::channel(16).0)
            .subscribe()
    }
}

/// Store double: delegates to the in-memory backend, counting the
/// lazy-creation writes and optionally injecting failures.
#[derive(Default)]
pub struct TestStores {
    db: MemoryDb,
    pub profile_creates: AtomicUsize,
    pub progress_creates: AtomicUsize,
    /// Raw store message returned by `update_progress` when set
    pub progress_update_error: Mutex<Option<String>>,
    /// Raw store message returned by `list_unlocks` when set
    pub unlock_list_error: Mutex<Option<String>>,
}

#[allow(dead_code)]
impl TestStores {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn db(&self) -> &MemoryDb {
        &self.db
    }

    pub fn fail_progress_updates(&self, message: &str) {
        *self.progress_update_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_unlock_lists(&self, message: &str) {
        *self.unlock_list_error.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl ProfileStore for TestStores {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        self.db.get_profile(user_id).await
    }

    async fn create_profile(&self, profile: &Profile) -> Result<(), AppError> {
        self.profile_creates.fetch_add(1, Ordering::SeqCst);
        self.db.create_profile(profile).await
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<(), AppError> {
        self.db.update_profile(user_id, update).await
    }
}

#[async_trait]
impl ProgressStore for TestStores {
    async fn get_progress(&self, user_id: &str) -> Result<Option<Progress>, AppError> {
        self.db.get_progress(user_id).await
    }

    async fn create_progress(&self, progress: &Progress) -> Result<(), AppError> {
        self.progress_creates.fetch_add(1, Ordering::SeqCst);
        self.db.create_progress(progress).await
    }

    async fn update_progress(&self, progress: &Progress) -> Result<(), AppError> {
        if let Some(message) = self.progress_update_error.lock().unwrap().clone() {
            return Err(AppError::Database(message));
        }
        self.db.update_progress(progress).await
    }
}

#[async_trait]
impl AchievementStore for TestStores {
    async fn list_unlocks(&self, user_id: &str) -> Result<Vec<AchievementUnlock>, AppError> {
        if let Some(message) = self.unlock_list_error.lock().unwrap().clone() {
            return Err(AppError::Database(message));
        }
        self.db.list_unlocks(user_id).await
    }

    async fn upsert_unlock(&self, unlock: &AchievementUnlock) -> Result<(), AppError> {
        self.db.upsert_unlock(unlock).await
    }
}

/// A fully wired test session with access to its doubles.
pub struct TestHarness {
    pub provider: Arc<FakeProvider>,
    pub stores: Arc<TestStores>,
    pub session: SessionService,
}

#[allow(dead_code)]
pub fn test_identity(id: &str, email: &str) -> Identity {
    Identity {
        id: id.to_string(),
        email: Some(email.to_string()),
        email_confirmed: true,
        metadata: IdentityMetadata::default(),
    }
}

/// Build a session service over the scripted provider and counting stores.
#[allow(dead_code)]
pub fn build_harness() -> TestHarness {
    let provider = FakeProvider::new();
    let stores = TestStores::new();

    let profiles = ProfileService::new(stores.clone(), stores.clone(), stores.clone());
    let session = SessionService::new(provider.clone(), profiles);

    TestHarness {
        provider,
        stores,
        session,
    }
}
