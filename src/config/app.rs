//! # Application Configuration Loader
//!
//! Loads every CSRF-related setting once at startup.
//!
//! Automatically loads `.env` files for non-production environments.
//! It checks for a custom `DOTENV_FILE` path first, then falls back to
//! `.env.{APP_ENV}` or `.env`.
//!
//! # Environment Variables
//! | Variable | Description | Default |
//! |-----------|-------------|----------|
//! | `APP_ENV` | Current environment (`development`, `production`, etc.) | `"development"` |
//! | `DOTENV_FILE` | Optional path to a custom dotenv file | *none* |
//! | `CSRF_*` | See [`CsrfConfig`] and [`ExemptionConfig`] | |
//!
//! # Example
//! ```rust,no_run
//! use wzs_csrf::config::app::AppConfig;
//!
//! let cfg = AppConfig::from_env().expect("invalid CSRF configuration");
//! println!("token length: {}", cfg.csrf.token_length.raw());
//! ```

use std::env;

use anyhow::{Context, Result};

use crate::config::csrf::{CsrfConfig, ExemptionConfig};

/// Top-level application configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Value of `APP_ENV`.
    pub app_env: String,
    /// Token, transport, and message settings.
    pub csrf: CsrfConfig,
    /// Exemptions declared through the environment.
    pub exemptions: ExemptionConfig,
}

impl AppConfig {
    /// Loads application configuration from environment variables.
    ///
    /// # Errors
    /// Fails when any CSRF setting is invalid. Callers should treat this as
    /// fatal and refuse to start.
    pub fn from_env() -> Result<Self> {
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".into());

        if app_env != "production" {
            if let Ok(path) = env::var("DOTENV_FILE") {
                let _ = dotenvy::from_filename(path);
            } else {
                let candidate = format!(".env.{}", app_env);
                dotenvy::from_filename(&candidate)
                    .or_else(|_| dotenvy::dotenv())
                    .ok();
            }
        }

        let csrf = CsrfConfig::from_env().context("loading CSRF configuration")?;

        Ok(AppConfig {
            app_env,
            csrf,
            exemptions: ExemptionConfig::from_env(),
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }
}
