//! Guía Comercial Core - Shared domain types.
//!
//! This crate provides the types used across all Guía Comercial components:
//! - `app` - Backend client, session bootstrap, navigation and page view-models
//! - `cli` - The native shell that persists sessions and renders screens
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no HTTP
//! clients, no async runtime. Everything here can be unit tested in isolation.
//!
//! # Modules
//!
//! - [`types`] - Ids, contact newtypes, profiles and business listings

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
