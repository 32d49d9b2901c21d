// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GoTrue-style auth API client.
//!
//! Handles:
//! - Signup, password sign-in, sign-out
//! - Fetching the identity behind the current credential
//! - Proactive token refresh when the access token nears expiry
//! - Broadcasting identity transitions to the session manager

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};

use crate::auth::provider::{
    Identity, IdentityEvent, IdentityMetadata, IdentityProvider, SignUpResponse,
};
use crate::error::AppError;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Event channel capacity. Transitions are rare; a small buffer suffices.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Access token shared with the REST store client, which sends it as the
/// bearer credential so row-level security applies to store reads/writes.
pub type SharedAccessToken = Arc<RwLock<Option<String>>>;

/// Current session credentials.
#[derive(Clone)]
struct AuthSession {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

/// GoTrue-style auth API client.
pub struct GoTrueAuth {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    session: RwLock<Option<AuthSession>>,
    shared_token: SharedAccessToken,
    /// Serializes token refresh so concurrent callers trigger one refresh.
    refresh_lock: Mutex<()>,
    events: broadcast::Sender<IdentityEvent>,
}

impl GoTrueAuth {
    /// Create a new auth client for `{backend_url}/auth/v1`.
    pub fn new(backend_url: &str, api_key: String, shared_token: SharedAccessToken) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{}/auth/v1", backend_url),
            api_key,
            session: RwLock::new(None),
            shared_token,
            refresh_lock: Mutex::new(()),
            events,
        }
    }

    /// Store a new session and publish the access token to the store client.
    async fn install_session(&self, token: TokenResponse) -> Identity {
        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        *self.shared_token.write().await = Some(token.access_token.clone());
        *self.session.write().await = Some(AuthSession {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
        });
        token.user.into_identity()
    }

    /// Drop the local session and the shared store credential.
    async fn clear_session(&self) -> Option<AuthSession> {
        *self.shared_token.write().await = None;
        self.session.write().await.take()
    }

    /// A valid (non-expiring-soon) access token, refreshing if needed.
    ///
    /// Fast path reads the cached session; the refresh path takes the
    /// refresh lock and re-checks, so concurrent callers trigger a single
    /// refresh call.
    async fn access_token(&self) -> Result<Option<String>, AppError> {
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        match self.session.read().await.as_ref() {
            None => return Ok(None),
            Some(s) if Utc::now() + margin < s.expires_at => {
                return Ok(Some(s.access_token.clone()))
            }
            Some(_) => {} // expiring soon, fall through to refresh
        }

        let _guard = self.refresh_lock.lock().await;

        // Re-check after acquiring the lock: another task may have refreshed.
        let refresh_token = match self.session.read().await.as_ref() {
            None => return Ok(None),
            Some(s) if Utc::now() + margin < s.expires_at => {
                return Ok(Some(s.access_token.clone()))
            }
            Some(s) => s.refresh_token.clone(),
        };

        tracing::info!("Access token expiring, refreshing");

        let response = self
            .http
            .post(format!("{}/token?grant_type=refresh_token", self.base_url))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| AppError::AuthApi(format!("Token refresh request failed: {}", e)))?;

        let token: TokenResponse = check_response_json(response).await?;
        let access_token = token.access_token.clone();
        self.install_session(token).await;

        // Subscribers re-fetch the assembled user on refresh
        let _ = self.events.send(IdentityEvent::TokenRefreshed);

        Ok(Some(access_token))
    }
}

#[async_trait::async_trait]
impl IdentityProvider for GoTrueAuth {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &IdentityMetadata,
    ) -> Result<SignUpResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/signup", self.base_url))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": metadata,
            }))
            .send()
            .await
            .map_err(|e| AppError::AuthApi(format!("Signup request failed: {}", e)))?;

        let body: serde_json::Value = check_response_json(response).await?;

        // With email confirmation disabled the signup response is a full
        // token grant; otherwise it is the bare user record.
        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body)
                .map_err(|e| AppError::AuthApi(format!("JSON parse error: {}", e)))?;
            let identity = self.install_session(token).await;
            let _ = self.events.send(IdentityEvent::SignedIn);
            Ok(SignUpResponse {
                identity: Some(identity),
                session_established: true,
            })
        } else {
            let user: GoTrueUser = serde_json::from_value(body)
                .map_err(|e| AppError::AuthApi(format!("JSON parse error: {}", e)))?;
            Ok(SignUpResponse {
                identity: Some(user.into_identity()),
                session_established: false,
            })
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AppError> {
        let response = self
            .http
            .post(format!("{}/token?grant_type=password", self.base_url))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AppError::AuthApi(format!("Sign-in request failed: {}", e)))?;

        let token: TokenResponse = check_response_json(response).await?;
        let identity = self.install_session(token).await;
        let _ = self.events.send(IdentityEvent::SignedIn);
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        // Clear local state first so a failed revocation cannot leave a
        // half-signed-out client.
        let session = self.clear_session().await;
        let _ = self.events.send(IdentityEvent::SignedOut);

        let Some(session) = session else {
            return Ok(());
        };

        let response = self
            .http
            .post(format!("{}/logout", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| AppError::AuthApi(format!("Sign-out request failed: {}", e)))?;

        check_response(response).await
    }

    async fn current_identity(&self) -> Result<Option<Identity>, AppError> {
        let Some(access_token) = self.access_token().await? else {
            return Ok(None);
        };

        let response = self
            .http
            .get(format!("{}/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(&access_token)
            .send()
            .await
            .map_err(|e| AppError::AuthApi(format!("User fetch failed: {}", e)))?;

        let user: GoTrueUser = check_response_json(response).await?;
        Ok(Some(user.into_identity()))
    }

    fn subscribe(&self) -> broadcast::Receiver<IdentityEvent> {
        self.events.subscribe()
    }
}

/// Check response status, surfacing the provider's error message verbatim.
async fn check_response(response: reqwest::Response) -> Result<(), AppError> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(error_from_response(response).await)
}

/// Check response status and parse the JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    response
        .json()
        .await
        .map_err(|e| AppError::AuthApi(format!("JSON parse error: {}", e)))
}

/// Build an `AuthApi` error carrying the status and the provider message.
///
/// The message must stay verbatim: the session manager pattern-matches
/// substrings like "Invalid login credentials" and "JWT expired".
async fn error_from_response(response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|key| v.get(key).and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or(body);

    AppError::AuthApi(format!("HTTP {}: {}", status.as_u16(), message))
}

/// User record as returned by the auth API.
#[derive(Debug, Clone, Deserialize)]
struct GoTrueUser {
    id: String,
    email: Option<String>,
    email_confirmed_at: Option<String>,
    #[serde(default)]
    user_metadata: IdentityMetadata,
}

impl GoTrueUser {
    fn into_identity(self) -> Identity {
        Identity {
            id: self.id,
            email: self.email,
            email_confirmed: self.email_confirmed_at.is_some(),
            metadata: self.user_metadata,
        }
    }
}

/// Token grant response (sign-in, signup with auto-confirm, refresh).
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: GoTrueUser,
}
