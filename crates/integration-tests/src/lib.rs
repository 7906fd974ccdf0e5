//! Integration tests for Guía Comercial.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p guia-comercial-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `bootstrap` - Mount, session resolution, auth events and deep links
//! - `pages` - Page flows driven through a mounted app
//!
//! Everything runs against `testing::FakeBackend`; no network is needed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use guia_comercial_app::App;
use guia_comercial_app::app::{AppHandle, DeepLinkReceiver};
use guia_comercial_app::state::AppState;
use guia_comercial_app::testing::FakeBackend;

/// Upper bound for any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(5);

/// Await `future`, panicking after [`WAIT`].
///
/// # Panics
///
/// Panics if `future` does not complete in time.
pub async fn within<F: Future>(future: F) -> F::Output {
    match tokio::time::timeout(WAIT, future).await {
        Ok(output) => output,
        Err(_) => panic!("timed out after {WAIT:?}"),
    }
}

/// Mount the app on `backend` and wait until the initial resolution is done.
///
/// # Panics
///
/// Panics if the app does not settle in time.
pub async fn mount_settled(
    backend: &Arc<FakeBackend>,
    deep_links: Option<DeepLinkReceiver>,
) -> (AppHandle, AppState) {
    let handle = App::mount(Ok(backend.clone()), deep_links);
    let state = within(handle.settled()).await;
    (handle, state)
}
