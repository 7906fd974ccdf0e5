//! Subcommand implementations.
//!
//! Each command drives the mounted app the way a user would: it asks the
//! page view-models for navigation requests and renders the resulting page.

pub mod account;
pub mod browse;
pub mod comercio;
pub mod listen;
