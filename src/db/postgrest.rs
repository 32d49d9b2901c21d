// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PostgREST-style REST client with typed operations.
//!
//! Provides row operations for:
//! - Profiles (`users` table)
//! - Progress (`user_progress` table)
//! - Achievement unlocks (`user_achievements` table)
//!
//! Requests carry the public API key plus, when a session is established,
//! the user's access token so row-level security applies.

use async_trait::async_trait;
use serde::Deserialize;

use crate::auth::SharedAccessToken;
use crate::db::{tables, AchievementStore, ProfileStore, ProgressStore};
use crate::error::AppError;
use crate::models::achievement::AchievementUnlock;
use crate::models::profile::{Profile, ProfileUpdate};
use crate::models::progress::Progress;

/// REST store client.
#[derive(Clone)]
pub struct PostgrestDb {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    session: SharedAccessToken,
}

impl PostgrestDb {
    /// Create a new store client for `{backend_url}/rest/v1`.
    pub fn new(backend_url: &str, api_key: String, session: SharedAccessToken) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{}/rest/v1", backend_url),
            api_key,
            session,
        }
    }

    /// Bearer credential: the session token when present, else the API key.
    async fn bearer(&self) -> String {
        self.session
            .read()
            .await
            .clone()
            .unwrap_or_else(|| self.api_key.clone())
    }

    /// Fetch rows matching `{column}=eq.{key}` from a table.
    async fn select_eq<T: for<'de> Deserialize<'de>>(
        &self,
        table: &str,
        column: &str,
        key: &str,
    ) -> Result<Vec<T>, AppError> {
        let url = format!("{}/{}", self.base_url, table);
        let response = self
            .http
            .get(&url)
            .query(&[(column, format!("eq.{}", key)), ("select", "*".to_string())])
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer().await)
            .send()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        check_response_json(response).await
    }

    /// Insert a row, ignoring a conflict on the given key columns.
    async fn insert_ignore_conflict<T: serde::Serialize>(
        &self,
        table: &str,
        on_conflict: &str,
        row: &T,
    ) -> Result<(), AppError> {
        let url = format!("{}/{}", self.base_url, table);
        let response = self
            .http
            .post(&url)
            .query(&[("on_conflict", on_conflict)])
            .header("apikey", &self.api_key)
            .header("Prefer", "resolution=ignore-duplicates")
            .bearer_auth(self.bearer().await)
            .json(row)
            .send()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        check_response(response).await
    }

    /// Patch rows matching `{column}=eq.{key}` with the given body.
    async fn patch_eq<T: serde::Serialize>(
        &self,
        table: &str,
        column: &str,
        key: &str,
        body: &T,
    ) -> Result<(), AppError> {
        let url = format!("{}/{}", self.base_url, table);
        let response = self
            .http
            .patch(&url)
            .query(&[(column, format!("eq.{}", key))])
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer().await)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        check_response(response).await
    }
}

#[async_trait]
impl ProfileStore for PostgrestDb {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        let mut rows: Vec<Profile> = self.select_eq(tables::USERS, "id", user_id).await?;
        Ok(rows.pop())
    }

    async fn create_profile(&self, profile: &Profile) -> Result<(), AppError> {
        self.insert_ignore_conflict(tables::USERS, "id", profile)
            .await
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<(), AppError> {
        if update.is_empty() {
            return Ok(());
        }
        self.patch_eq(tables::USERS, "id", user_id, update).await
    }
}

#[async_trait]
impl ProgressStore for PostgrestDb {
    async fn get_progress(&self, user_id: &str) -> Result<Option<Progress>, AppError> {
        let mut rows: Vec<Progress> = self
            .select_eq(tables::USER_PROGRESS, "user_id", user_id)
            .await?;
        Ok(rows.pop())
    }

    async fn create_progress(&self, progress: &Progress) -> Result<(), AppError> {
        self.insert_ignore_conflict(tables::USER_PROGRESS, "user_id", progress)
            .await
    }

    async fn update_progress(&self, progress: &Progress) -> Result<(), AppError> {
        self.patch_eq(
            tables::USER_PROGRESS,
            "user_id",
            &progress.user_id,
            progress,
        )
        .await
    }
}

#[async_trait]
impl AchievementStore for PostgrestDb {
    async fn list_unlocks(&self, user_id: &str) -> Result<Vec<AchievementUnlock>, AppError> {
        self.select_eq(tables::USER_ACHIEVEMENTS, "user_id", user_id)
            .await
    }

    async fn upsert_unlock(&self, unlock: &AchievementUnlock) -> Result<(), AppError> {
        self.insert_ignore_conflict(
            tables::USER_ACHIEVEMENTS,
            "user_id,achievement_id",
            unlock,
        )
        .await
    }
}

/// Check response status and return an error with the body if not successful.
async fn check_response(response: reqwest::Response) -> Result<(), AppError> {
    if response.status().is_success() {
        return Ok(());
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(AppError::Database(format!(
        "HTTP {}: {}",
        status.as_u16(),
        body
    )))
}

/// Check response and parse the JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Database(format!(
            "HTTP {}: {}",
            status.as_u16(),
            body
        )));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::Database(format!("JSON parse error: {}", e)))
}
