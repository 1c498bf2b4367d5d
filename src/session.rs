//! Wires the store, auth client, coordinator, API client and guard together.

use crate::auth::AuthClient;
use crate::config::Config;
use crate::error::{ApiError, AuthError};
use crate::http::client::build_http_client;
use crate::http::{ApiClient, RefreshCoordinator};
use crate::router::navigator::Navigator;
use crate::router::{GuardDecision, NavigationGuard, RouteTable};
use crate::store::{CredentialStore, Token};
use std::sync::Arc;

/// Everything a client application needs to talk to the API as a user.
pub struct Session {
    store: Arc<dyn CredentialStore>,
    auth: Arc<AuthClient>,
    coordinator: Arc<RefreshCoordinator>,
    api: ApiClient,
    guard: NavigationGuard,
}

impl Session {
    pub fn new(
        config: &Config,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let http_client = build_http_client(config)?;
        let auth = Arc::new(AuthClient::new(config, http_client.clone(), store.clone()));

        let coordinator = Arc::new(
            RefreshCoordinator::new(
                auth.clone(),
                store.clone(),
                navigator,
                config.routes.login_path.clone(),
            )
            .with_timeout(config.refresh_timeout()),
        );

        let api = ApiClient::new(config, http_client, store.clone(), coordinator.clone());
        let guard = NavigationGuard::new(
            RouteTable::archival(&config.routes.login_path),
            store.clone(),
            auth.clone(),
            coordinator.clone(),
        );

        Ok(Self {
            store,
            auth,
            coordinator,
            api,
            guard,
        })
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Token, AuthError> {
        self.auth.authenticate(username, password).await
    }

    pub async fn logout(&self) {
        self.auth.logout().await;
    }

    pub async fn navigate(&self, to: &str) -> GuardDecision {
        self.guard.before_each(to).await
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn is_signed_in(&self) -> bool {
        self.store.get().is_some()
    }
}
