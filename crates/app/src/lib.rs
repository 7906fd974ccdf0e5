//! Guía Comercial App - Business directory client.
//!
//! Everything a shell needs to run the directory against a Supabase project:
//! the backend client, session persistence, the session bootstrap with deep
//! links, navigation and the page view-models.
//!
//! # Architecture
//!
//! [`app::App::mount`] spawns a single reducer task that owns
//! [`state::AppState`]. Session resolution, auth events, deep links and page
//! navigation all send [`state::Update`]s to it; views read snapshots through a
//! `watch` channel. Pages talk to the backend only through the
//! [`supabase::Backend`] trait, so tests swap in `testing::FakeBackend`.
//!
//! # Modules
//!
//! - [`app`] - Mount, session bootstrap and auth/deep-link listeners
//! - [`config`] - Environment configuration
//! - [`deep_link`] - Auth callback URL parsing
//! - [`error`] - Application errors and Sentry helpers
//! - [`navigation`] - Page identifiers and navigation state
//! - [`pages`] - Page view-models
//! - [`repo`] - Typed table access
//! - [`state`] - App state and reducer
//! - [`storage`] - Session persistence
//! - [`supabase`] - Auth and REST client
//! - [`views`] - askama text views

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod app;
pub mod config;
pub mod deep_link;
pub mod error;
pub mod navigation;
pub mod pages;
pub mod repo;
pub mod state;
pub mod storage;
pub mod supabase;
pub mod views;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use app::{App, AppHandle};
pub use config::{AppConfig, ConfigError, SupabaseConfig};
pub use error::AppError;
