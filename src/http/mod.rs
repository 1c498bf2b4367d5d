//! HTTP plumbing around the archival API.
//!
//! Outgoing requests are decorated with the current token; auth failures are
//! funnelled through a single [`RefreshCoordinator`] and replayed.

pub mod client;
pub mod coordinator;
pub mod decorator;

pub use client::{ApiClient, ApiRequest};
pub use coordinator::RefreshCoordinator;

use reqwest::StatusCode;

/// Whether a response status should trigger a token refresh.
pub fn is_auth_failure(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}
