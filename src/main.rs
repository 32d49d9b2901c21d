// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SafetyLearn API Server
//!
//! Serves the session, profile, and lesson-progress API for the
//! SafetyLearn safety-education app.

use safetylearn_api::{
    auth::{GoTrueAuth, SharedAccessToken},
    config::Config,
    db::PostgrestDb,
    services::{ProfileService, SessionService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting SafetyLearn API");

    // The auth client owns the session tokens; the store client reads the
    // shared access token so row-level security applies to its requests.
    let shared_token: SharedAccessToken = SharedAccessToken::default();

    let provider = Arc::new(GoTrueAuth::new(
        &config.backend_url,
        config.anon_key.clone(),
        shared_token.clone(),
    ));

    let db = PostgrestDb::new(&config.backend_url, config.anon_key.clone(), shared_token);
    tracing::info!(backend = %config.backend_url, "Store client initialized");

    let profile_service = ProfileService::new(
        Arc::new(db.clone()),
        Arc::new(db.clone()),
        Arc::new(db),
    );

    let session_service = SessionService::new(provider, profile_service);

    // React to external identity transitions for the life of the process
    let _identity_guard = session_service.on_identity_change(|user| match user {
        Some(user) => tracing::info!(user_id = %user.id, "Identity changed"),
        None => tracing::info!("Identity cleared"),
    });

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        session: session_service,
    });

    // Build router
    let app = safetylearn_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("safetylearn_api=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
