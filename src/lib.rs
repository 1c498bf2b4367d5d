//! Session plumbing for the media archival API.
//!
//! Attaches the bearer token to outgoing requests, refreshes it transparently
//! when the server answers 401/403 (one refresh at a time, concurrent callers
//! queued), and guards protected routes.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod router;
pub mod session;
pub mod store;

pub use config::Config;
pub use error::{ApiError, AppError, AuthError, StoreError};
pub use session::Session;
pub use store::{CredentialStore, FileStore, MemoryStore, Token};
