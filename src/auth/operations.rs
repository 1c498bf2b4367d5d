//! Login, token validation and token refresh calls.

use crate::auth::{TokenRefresher, TokenValidator};
use crate::config::Config;
use crate::error::AuthError;
use crate::http::decorator;
use crate::store::{CredentialStore, Token};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Client for the `/users` and `/ping` endpoints.
pub struct AuthClient {
    http_client: reqwest::Client,
    authenticate_url: String,
    refresh_url: String,
    logout_url: String,
    ping_url: String,
    token_header: String,
    store: Arc<dyn CredentialStore>,
}

impl AuthClient {
    /// Create an auth client that shares `http_client` (and its cookie jar)
    /// with the rest of the session.
    pub fn new(
        config: &Config,
        http_client: reqwest::Client,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            http_client,
            authenticate_url: config.endpoint(&config.api.authenticate_path),
            refresh_url: config.endpoint(&config.api.refresh_path),
            logout_url: config.endpoint(&config.api.logout_path),
            ping_url: config.endpoint(&config.api.ping_path),
            token_header: config.api.token_header.clone(),
            store,
        }
    }

    /// Sign in with a username and password.
    ///
    /// On success the returned token is also stored as the current credential.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Token, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let response = self
            .http_client
            .post(&self.authenticate_url)
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!("Login rejected for {}: HTTP {}", username, response.status());
                return Err(AuthError::Rejected);
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                error!("Login failed: HTTP {} - {}", status, body);
                return Err(AuthError::Network(format!("HTTP {}", status.as_u16())));
            }
        }

        let body: LoginResponse = response.json().await.map_err(|e| {
            error!("Login response was not valid JSON: {}", e);
            AuthError::MissingToken
        })?;

        let token = body.into_token().ok_or_else(|| {
            error!("Login response did not contain a JWT");
            AuthError::MissingToken
        })?;

        self.store.set(token.clone());
        info!("Signed in as {}", username);
        Ok(token)
    }

    /// Check `token` against `/ping`. Only HTTP 200 counts as valid.
    pub async fn validate_token(&self, token: &Token) -> bool {
        let request = self
            .http_client
            .get(&self.ping_url)
            .header(self.token_header.as_str(), token.as_str());

        match request.send().await {
            Ok(response) => {
                let valid = response.status() == StatusCode::OK;
                debug!("Token check returned HTTP {}", response.status());
                valid
            }
            Err(e) => {
                debug!("Token check failed: {}", e);
                false
            }
        }
    }

    /// Exchange the refresh cookie for a new token.
    ///
    /// Stores and returns the new token; any failure yields `None`.
    pub async fn refresh_token(&self) -> Option<Token> {
        let request = decorator::decorate(
            self.http_client.post(&self.refresh_url),
            self.store.as_ref(),
            &self.token_header,
        );

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Token refresh request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("Token refresh rejected: HTTP {}", response.status());
            return None;
        }

        let token = match response.json::<LoginResponse>().await {
            Ok(body) => body.into_token(),
            Err(e) => {
                warn!("Token refresh returned an unreadable body: {}", e);
                None
            }
        };

        match token {
            Some(token) => {
                self.store.set(token.clone());
                info!("Token refreshed");
                Some(token)
            }
            None => {
                warn!("Refresh failed. New JWT missing.");
                None
            }
        }
    }

    /// Revoke the refresh cookie server-side and drop the local token.
    ///
    /// The local credential is cleared even if the server call fails.
    pub async fn logout(&self) {
        let request = decorator::decorate(
            self.http_client.post(&self.logout_url),
            self.store.as_ref(),
            &self.token_header,
        );

        match request.send().await {
            Ok(response) if response.status().is_success() => info!("Signed out"),
            Ok(response) => warn!("Logout returned HTTP {}", response.status()),
            Err(e) => warn!("Logout request failed: {}", e),
        }

        self.store.clear();
    }
}

#[async_trait]
impl TokenRefresher for AuthClient {
    async fn refresh_token(&self) -> Option<Token> {
        AuthClient::refresh_token(self).await
    }
}

#[async_trait]
impl TokenValidator for AuthClient {
    async fn validate_token(&self, token: &Token) -> bool {
        AuthClient::validate_token(self, token).await
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Body of `/users/authenticate` and `/users/refresh-token`.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "JWT")]
    jwt: Option<String>,
}

impl LoginResponse {
    fn into_token(self) -> Option<Token> {
        self.jwt.filter(|jwt| !jwt.is_empty()).map(Token::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::client::build_http_client;
    use crate::store::MemoryStore;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, store: Arc<MemoryStore>) -> AuthClient {
        let mut config = Config::embedded().unwrap();
        config.api.base_url = server.uri();
        let http = build_http_client(&config).unwrap();
        AuthClient::new(&config, http, store)
    }

    #[tokio::test]
    async fn test_authenticate_stores_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/authenticate"))
            .and(body_json(json!({"username": "admin", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"JWT": "jwt-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let client = client_for(&server, store.clone());

        let token = client.authenticate("admin", "pw").await.unwrap();
        assert_eq!(token.as_str(), "jwt-1");
        assert_eq!(store.get(), Some(Token::from("jwt-1")));
    }

    #[tokio::test]
    async fn test_authenticate_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/authenticate"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"JWT": null})))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let client = client_for(&server, store.clone());

        let result = client.authenticate("admin", "wrong").await;
        assert_eq!(result, Err(AuthError::Rejected));
        assert!(store.get().is_none());
    }

    #[tokio::test]
    async fn test_authenticate_missing_jwt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/authenticate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemoryStore::new()));
        let result = client.authenticate("admin", "pw").await;
        assert_eq!(result, Err(AuthError::MissingToken));
    }

    #[tokio::test]
    async fn test_authenticate_unreadable_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/authenticate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let client = client_for(&server, store.clone());

        let result = client.authenticate("admin", "pw").await;
        assert_eq!(result, Err(AuthError::MissingToken));
        assert!(store.get().is_none());
    }

    #[tokio::test]
    async fn test_authenticate_requires_credentials() {
        let server = MockServer::start().await;
        let client = client_for(&server, Arc::new(MemoryStore::new()));

        let result = client.authenticate("", "pw").await;
        assert_eq!(result, Err(AuthError::MissingCredentials));
    }

    #[tokio::test]
    async fn test_authenticate_network_error() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());
        let client = client_for(&server, store);
        drop(server);

        let result = client.authenticate("admin", "pw").await;
        assert!(matches!(result, Err(AuthError::Network(_))));
    }

    #[tokio::test]
    async fn test_validate_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(header("token", "good"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Pong!"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemoryStore::new()));
        assert!(client.validate_token(&Token::from("good")).await);
        assert!(!client.validate_token(&Token::from("bad")).await);
    }

    #[tokio::test]
    async fn test_validate_token_never_errors_on_network_failure() {
        let server = MockServer::start().await;
        let client = client_for(&server, Arc::new(MemoryStore::new()));
        drop(server);

        assert!(!client.validate_token(&Token::from("any")).await);
    }

    #[tokio::test]
    async fn test_refresh_token_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/refresh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"JWT": "fresh"})))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::with_token("stale"));
        let client = client_for(&server, store.clone());

        assert_eq!(client.refresh_token().await, Some(Token::from("fresh")));
        assert_eq!(store.get(), Some(Token::from("fresh")));
    }

    #[tokio::test]
    async fn test_refresh_token_failures_yield_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/refresh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"JWT": null})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users/refresh-token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::with_token("stale"));
        let client = client_for(&server, store.clone());

        assert!(client.refresh_token().await.is_none());
        assert!(client.refresh_token().await.is_none());
        // Clearing is the coordinator's job.
        assert_eq!(store.get(), Some(Token::from("stale")));
    }

    #[tokio::test]
    async fn test_logout_clears_store_even_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/logout"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::with_token("jwt"));
        let client = client_for(&server, store.clone());

        client.logout().await;
        assert!(store.get().is_none());
    }
}
