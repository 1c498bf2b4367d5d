//! Route table and the navigation guard for protected views.

pub mod navigator;

use crate::auth::TokenValidator;
use crate::error::AuthError;
use crate::http::RefreshCoordinator;
use crate::store::CredentialStore;
use std::sync::Arc;
use tracing::{debug, info};

/// Upper bound on redirect hops while resolving a path.
const MAX_REDIRECTS: usize = 8;

/// A single entry of the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    pub name: Option<String>,
    pub requires_auth: bool,
    pub redirect: Option<String>,
}

impl Route {
    pub fn public(path: &str, name: &str) -> Self {
        Self {
            path: path.to_string(),
            name: Some(name.to_string()),
            requires_auth: false,
            redirect: None,
        }
    }

    pub fn protected(path: &str, name: &str) -> Self {
        Self {
            requires_auth: true,
            ..Self::public(path, name)
        }
    }

    pub fn redirect(path: &str, to: &str) -> Self {
        Self {
            path: path.to_string(),
            name: None,
            requires_auth: false,
            redirect: Some(to.to_string()),
        }
    }

    fn requiring_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }
}

/// Ordered routes plus the path unknown locations fall back to.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
    fallback: String,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>, fallback: impl Into<String>) -> Self {
        Self {
            routes,
            fallback: fallback.into(),
        }
    }

    /// Routes of the media archival front end.
    pub fn archival(login_path: &str) -> Self {
        Self::new(
            vec![
                Route::redirect("/", "/dashboard").requiring_auth(),
                Route::public(login_path, "Login"),
                Route::protected("/dashboard", "Dashboard"),
                Route::protected("/uploads", "Upload Jobs"),
                Route::protected("/downloads", "Download Jobs"),
                Route::protected("/settings", "Settings"),
                Route::public("/error404", "Error"),
            ],
            "/error404",
        )
    }

    /// Follow redirects and return the chain of matched routes, target last.
    ///
    /// Unknown paths resolve to the fallback route.
    pub fn resolve(&self, path: &str) -> Vec<&Route> {
        let mut matched = Vec::new();
        let mut current = strip_query(path).to_string();

        for _ in 0..MAX_REDIRECTS {
            let route = match self.find(&current).or_else(|| self.find(&self.fallback)) {
                Some(route) => route,
                None => break,
            };
            matched.push(route);
            match &route.redirect {
                Some(to) if *to != route.path => current = to.clone(),
                _ => break,
            }
        }

        matched
    }

    fn find(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.path == path)
    }
}

fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

/// Outcome of guarding a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Continue to the resolved path.
    Proceed(String),
    /// Go to this path instead.
    Redirect(String),
    /// Stop here. The navigator has already been sent to the login route.
    Abort,
}

/// Checks the session before entering protected routes.
pub struct NavigationGuard {
    routes: RouteTable,
    store: Arc<dyn CredentialStore>,
    validator: Arc<dyn TokenValidator>,
    coordinator: Arc<RefreshCoordinator>,
}

impl NavigationGuard {
    pub fn new(
        routes: RouteTable,
        store: Arc<dyn CredentialStore>,
        validator: Arc<dyn TokenValidator>,
        coordinator: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            routes,
            store,
            validator,
            coordinator,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Decide whether navigation to `to` may proceed.
    pub async fn before_each(&self, to: &str) -> GuardDecision {
        let matched = self.routes.resolve(to);
        let target = matched
            .last()
            .map(|route| route.path.clone())
            .unwrap_or_else(|| to.to_string());

        if !matched.iter().any(|route| route.requires_auth) {
            return GuardDecision::Proceed(target);
        }

        let token = match self.store.get() {
            Some(token) => token,
            None => {
                debug!("No token for protected route {}, attempting refresh", target);
                return self.refresh_or_login(target).await;
            }
        };

        if self.validator.validate_token(&token).await {
            return GuardDecision::Proceed(target);
        }

        debug!("Stored token rejected for {}, attempting refresh", target);
        self.refresh_or_login(target).await
    }

    /// A failed refresh has already redirected through the navigator, so the
    /// guard only aborts. A cancelled one has not, so the guard redirects.
    async fn refresh_or_login(&self, target: String) -> GuardDecision {
        match self.coordinator.acquire_token().await {
            Ok(_) => GuardDecision::Proceed(target),
            Err(AuthError::RefreshCancelled) => {
                info!("Refresh cancelled while entering {}", target);
                GuardDecision::Redirect(self.coordinator.login_path().to_string())
            }
            Err(e) => {
                info!("Cannot enter {}: {}", target, e);
                GuardDecision::Abort
            }
        }
    }
}
