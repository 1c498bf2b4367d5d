//! API client that injects the session token and recovers from expiry.

use crate::config::Config;
use crate::error::ApiError;
use crate::http::coordinator::RefreshCoordinator;
use crate::http::{decorator, is_auth_failure};
use crate::store::{CredentialStore, Token};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Build the HTTP client shared by every part of a session.
///
/// The cookie jar carries the server's refresh cookie between login and refresh.
pub fn build_http_client(config: &Config) -> Result<Client, ApiError> {
    let client = Client::builder()
        .timeout(config.http_timeout())
        .connect_timeout(config.http_connect_timeout())
        .cookie_store(true)
        .build()?;
    Ok(client)
}

/// A request against the API, relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
    /// Set once the request has been replayed after a refresh.
    retried: bool,
    /// Token to send instead of the stored one on replay.
    token: Option<Token>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            retried: false,
            token: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, ApiError> {
        let value =
            serde_json::to_value(body).map_err(|e| ApiError::ParseFailed(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    fn route(&self) -> &str {
        self.path.split('?').next().unwrap_or(&self.path)
    }
}

/// Client for authenticated API calls.
pub struct ApiClient {
    http_client: Client,
    base_url: String,
    token_header: String,
    refresh_path: String,
    store: Arc<dyn CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    pub fn new(
        config: &Config,
        http_client: Client,
        store: Arc<dyn CredentialStore>,
        coordinator: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            http_client,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            token_header: config.api.token_header.clone(),
            refresh_path: config.api.refresh_path.clone(),
            store,
            coordinator,
        }
    }

    /// Send `request`, refreshing the token and replaying once on 401/403.
    ///
    /// Non-success responses are returned as errors. A request that fails
    /// auth again after its replay is a terminal failure.
    pub async fn send(&self, mut request: ApiRequest) -> Result<Response, ApiError> {
        loop {
            let response = self.build(&request).send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if !is_auth_failure(status) {
                return Err(ApiError::from_status(status.as_u16()));
            }

            if request.retried {
                warn!(
                    "{} {} still failing with HTTP {} after refresh",
                    request.method, request.path, status
                );
                return Err(ApiError::from_status(status.as_u16()));
            }
            request.retried = true;

            // Refreshing in response to the refresh endpoint would loop forever.
            if request.route() == self.refresh_path {
                warn!("Refresh endpoint rejected the session: HTTP {}", status);
                self.coordinator.abandon_session();
                return Err(ApiError::from_status(status.as_u16()));
            }

            debug!(
                "{} {} returned HTTP {}, refreshing token",
                request.method, request.path, status
            );
            let token = self.coordinator.acquire_token().await?;
            request.token = Some(token);
        }
    }

    /// Send `request` and decode the JSON response body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::ParseFailed(e.to_string()))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(ApiRequest::get(path)).await
    }

    fn build(&self, request: &ApiRequest) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http_client.request(request.method.clone(), url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        match &request.token {
            Some(token) => decorator::with_token(builder, Some(token), &self.token_header),
            None => decorator::decorate(builder, self.store.as_ref(), &self.token_header),
        }
    }
}
