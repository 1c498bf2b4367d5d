//! Attaches the current token to outgoing requests.

use crate::store::{CredentialStore, Token};
use reqwest::RequestBuilder;
use tracing::trace;

/// Set `header` to the stored token, if there is one.
pub fn decorate(
    builder: RequestBuilder,
    store: &dyn CredentialStore,
    header: &str,
) -> RequestBuilder {
    with_token(builder, store.get().as_ref(), header)
}

/// Set `header` to `token`, or pass the request through untouched.
pub fn with_token(
    builder: RequestBuilder,
    token: Option<&Token>,
    header: &str,
) -> RequestBuilder {
    match token {
        Some(token) => {
            trace!("Attaching token header");
            builder.header(header, token.as_str())
        }
        None => builder,
    }
}
