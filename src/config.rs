//! Application configuration loaded from environment variables.
//!
//! The backend talks to a Supabase-style project: one base URL hosting the
//! auth API under `/auth/v1` and the REST API under `/rest/v1`, plus a
//! public (anon) API key sent with every request.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the backend project (no trailing slash)
    pub backend_url: String,
    /// Public API key for the auth and REST APIs
    pub anon_key: String,
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            backend_url: env::var("BACKEND_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("BACKEND_URL"))?,
            anon_key: env::var("ANON_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("ANON_KEY"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            backend_url: "http://localhost:54321".to_string(),
            anon_key: "test_anon_key".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
