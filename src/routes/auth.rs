// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication routes.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::models::profile::AgeGroup;
use crate::models::user::AuthUser;
use crate::services::{SignUpDetails, SignUpOutcome};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/signout", post(sign_out))
}

/// Signup request body.
#[derive(Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(range(min = 5, max = 19))]
    pub age: u8,
}

/// Signup/sign-in response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignUpRequest>,
) -> Result<Json<SessionResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let details = SignUpDetails {
        name: payload.name,
        age: payload.age,
        age_group: AgeGroup::for_age(payload.age),
    };

    let outcome = state
        .session
        .sign_up(&payload.email, &payload.password, details)
        .await?;

    let response = match outcome {
        SignUpOutcome::SignedIn(user) => SessionResponse {
            user: Some(*user),
            message: None,
        },
        SignUpOutcome::ConfirmationRequired => SessionResponse {
            user: None,
            message: Some(
                "Please check your email and click the confirmation link to complete your account setup."
                    .to_string(),
            ),
        },
    };

    Ok(Json(response))
}

/// Sign-in request body.
#[derive(Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignInRequest>,
) -> Result<Json<SessionResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let user = state
        .session
        .sign_in(&payload.email, &payload.password)
        .await?;

    Ok(Json(SessionResponse {
        user: Some(user),
        message: None,
    }))
}

#[derive(Serialize)]
pub struct SignOutResponse {
    pub success: bool,
}

async fn sign_out(State(state): State<Arc<AppState>>) -> Result<Json<SignOutResponse>> {
    state.session.sign_out().await?;
    Ok(Json(SignOutResponse { success: true }))
}
