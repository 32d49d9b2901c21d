// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for the signed-in user.

use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::profile::ProfileUpdate;
use crate::models::user::AuthUser;
use crate::services::LessonOutcome;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/profile", patch(update_profile))
        .route("/api/lessons/{lesson_id}/complete", post(complete_lesson))
}

/// Get the current assembled user.
///
/// `None` from the session manager means "show sign-in", which maps to 401.
async fn get_me(State(state): State<Arc<AppState>>) -> Result<Json<AuthUser>> {
    state
        .session
        .current_user()
        .await
        .map(Json)
        .ok_or(AppError::NotAuthenticated)
}

/// Profile update body: `ProfileUpdate` with request-level validation.
#[derive(Debug, serde::Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    #[validate(range(min = 5, max = 19))]
    pub age: Option<u8>,
    pub avatar: Option<String>,
}

#[derive(Serialize)]
pub struct UpdateProfileResponse {
    pub success: bool,
}

/// Update the current user's profile. Absent fields are left untouched;
/// the age bucket follows a changed age.
async fn update_profile(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UpdateProfileResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let update = ProfileUpdate {
        name: payload.name,
        age: payload.age,
        age_group: payload
            .age
            .map(crate::models::profile::AgeGroup::for_age),
        avatar: payload.avatar,
    };

    state.session.update_profile(update).await?;
    Ok(Json(UpdateProfileResponse { success: true }))
}

/// Record a lesson completion for the current user.
async fn complete_lesson(
    State(state): State<Arc<AppState>>,
    Path(lesson_id): Path<String>,
) -> Result<Json<LessonOutcome>> {
    if lesson_id.trim().is_empty() {
        return Err(AppError::BadRequest("lesson id must not be empty".to_string()));
    }

    let outcome = state.session.complete_lesson(&lesson_id).await?;
    Ok(Json(outcome))
}
