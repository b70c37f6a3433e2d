//! # wzs_csrf
//!
//! CSRF protection for [Axum](https://crates.io/crates/axum) applications,
//! built on the synchronizer token pattern.
//!
//! This crate provides:
//! - Token generation, session binding, and constant-time verification (`csrf`)
//! - Path, action, and glob exemptions (`csrf::exemption`)
//! - Same-origin `Referer` checks for HTTPS requests (`csrf::origin`)
//! - Environment-driven configuration (`config`)
//! - An Axum middleware, token extractor, and JSON token endpoint (`web`)
//!
//! ## Example usage (in another crate)
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use wzs_csrf::anyhow::Result;
//! use wzs_csrf::axum::{Router, middleware, routing::get};
//! use wzs_csrf::config::app::AppConfig;
//! use wzs_csrf::csrf::engine::CsrfEngine;
//! use wzs_csrf::web::{middleware::csrf_middleware, token::csrf_handler};
//!
//! fn router() -> Result<Router> {
//!     let engine = Arc::new(CsrfEngine::from_app_config(AppConfig::from_env()?)?);
//!     Ok(Router::new()
//!         .route("/csrf", get(csrf_handler))
//!         .layer(middleware::from_fn_with_state(engine, csrf_middleware)))
//! }
//! ```

// ===============================
// Re-exports of external crates
// ===============================

pub use anyhow;
pub use axum;
pub use axum_extra;
pub use url;

// ===============================
// Public modules
// ===============================
pub mod config;
pub mod csrf;
pub mod error;
pub mod web;
