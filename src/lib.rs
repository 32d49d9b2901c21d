// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SafetyLearn API: session and lesson-progress backend for the
//! SafetyLearn safety-education app.
//!
//! This crate owns the current-user session (single-flight fetch, stale
//! credential recovery) and the profile/progress/achievement aggregates
//! behind it. Auth and row storage live in an external Supabase-style
//! backend reached over HTTP.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use services::SessionService;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub session: SessionService,
}
