//! Authentication against the archival API.
//!
//! Provides the three network operations (authenticate, validate, refresh)
//! and the trait seams the refresh coordinator and route guard depend on.

pub mod operations;

pub use operations::AuthClient;

use crate::store::Token;
use async_trait::async_trait;

/// Exchanges the session's refresh credential for a new bearer token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Returns `None` on any failure; never errors.
    async fn refresh_token(&self) -> Option<Token>;
}

/// Checks whether a bearer token is still accepted by the server.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Returns `false` on any failure; never errors.
    async fn validate_token(&self, token: &Token) -> bool;
}
