//! # `ServiceTitan` API connection context
//!
//! The [`STContext`] struct bundles everything one tenant's API calls need:
//! the environment, the tenant id, the application key, the OAuth access
//! token, the account's configured time zone name, and the per-tenant rate
//! limiter.
//!
//! ## Creating a Context
//!
//! ```no_run
//! use oxititan::{Credentials, Environment, STContext};
//! use ureq::Agent;
//!
//! let client = Agent::new_with_defaults();
//!
//! // From a credential bundle (issues the token request immediately)
//! let credentials = Credentials::from_env().unwrap();
//! let context = STContext::authenticate(Environment::INTEGRATION, &credentials, &client).unwrap();
//!
//! // Or from token material you already hold
//! let context = STContext::new(
//!     Environment::PRODUCTION,
//!     "tenant_id".to_string(),
//!     "app_key".to_string(),
//!     "access_token".to_string(),
//! );
//! ```
//!
//! ## Rate Limits
//!
//! `ServiceTitan` meters requests per tenant. Library operations take a slot
//! via `with_permission` before every outbound call, sleeping out the window
//! when it is spent. The limiter never retries a failed request.
//!
//! ## Token lifetime
//!
//! Access tokens are short-lived. Wrap the context with
//! [`STContext::with_refresh`] to keep the credential bundle around and
//! re-authenticate on demand; see [`super::RefreshableContext`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use ureq::Agent;

use super::auth::{self, RefreshableContext};
use crate::{limiter::RateLimiter, APIResult, Environment};

// Per-tenant request quota. Wait out the window rather than get throttled.
const RATE_LIMIT: usize = 120;
const RESET_DURATION: Duration = Duration::from_secs(60);

/// Credential bundle for one `ServiceTitan` account.
///
/// The bundle is what the developer portal hands out for an app + tenant
/// pairing, plus the account's IANA time zone name when date filters should
/// not be interpreted as UTC.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub app_key: String,
    pub tenant_id: String,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl Credentials {
    /// Reads the bundle from `SERVICETITAN_*` environment variables.
    ///
    /// # Errors
    ///
    /// Fails if `SERVICETITAN_CLIENT_ID`, `SERVICETITAN_CLIENT_SECRET`,
    /// `SERVICETITAN_APP_KEY`, or `SERVICETITAN_TENANT_ID` is unset.
    /// `SERVICETITAN_TIMEZONE` is optional.
    pub fn from_env() -> APIResult<Self> {
        Ok(Self {
            client_id: std::env::var("SERVICETITAN_CLIENT_ID")?,
            client_secret: std::env::var("SERVICETITAN_CLIENT_SECRET")?,
            app_key: std::env::var("SERVICETITAN_APP_KEY")?,
            tenant_id: std::env::var("SERVICETITAN_TENANT_ID")?,
            timezone: std::env::var("SERVICETITAN_TIMEZONE").ok(),
        })
    }

    /// Reads the bundle from a JSON config file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or does not deserialize into the
    /// bundle's fields.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> APIResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// The core context for interacting with the `ServiceTitan` v2 API.
///
/// Immutable after construction; the only interior state is the rate
/// limiter, so a context can be shared freely across call sites.
pub struct STContext {
    pub(crate) environment: Environment,
    pub(crate) tenant_id: String,
    pub(crate) app_key: String,
    pub(crate) access_token: String,
    pub(crate) expires_at: DateTime<Utc>,
    pub(crate) timezone_name: Option<String>,
    pub(crate) api_base: String,
    pub(crate) limiter: RateLimiter,
}

impl STContext {
    /// Creates a context from token material you already hold.
    ///
    /// No requests are made; use [`STContext::authenticate`] to obtain a
    /// token from a credential bundle. The expiry is set far in the future
    /// since the caller owns the token's lifecycle.
    #[must_use]
    pub fn new(
        environment: Environment,
        tenant_id: String,
        app_key: String,
        access_token: String,
    ) -> Self {
        Self {
            environment,
            api_base: environment.endpoint_url().to_string(),
            tenant_id,
            app_key,
            access_token,
            expires_at: Utc::now() + chrono::Duration::hours(999),
            timezone_name: None,
            limiter: RateLimiter::new(RATE_LIMIT, RESET_DURATION),
        }
    }

    /// Requests an access token for the credential bundle and builds a
    /// context around it, carrying the bundle's configured time zone.
    ///
    /// # Errors
    ///
    /// Fails if the token request cannot be sent or is rejected.
    pub fn authenticate(
        environment: Environment,
        credentials: &Credentials,
        client: &Agent,
    ) -> APIResult<Self> {
        let token = auth::request_access_token(
            environment,
            &credentials.client_id,
            &credentials.client_secret,
            client,
        )?;
        Ok(Self {
            environment,
            api_base: environment.endpoint_url().to_string(),
            tenant_id: credentials.tenant_id.clone(),
            app_key: credentials.app_key.clone(),
            access_token: token.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(token.expires_in as i64),
            timezone_name: credentials.timezone.clone(),
            limiter: RateLimiter::new(RATE_LIMIT, RESET_DURATION),
        })
    }

    /// Creates a context from `SERVICETITAN_*` environment variables.
    ///
    /// # Errors
    ///
    /// Fails if a required variable is missing or the token request fails.
    pub fn new_from_env(environment: Environment, client: &Agent) -> APIResult<Self> {
        let credentials = Credentials::from_env()?;
        Self::authenticate(environment, &credentials, client)
    }

    /// Swaps in a different access token and returns the new context.
    #[must_use]
    pub fn with_access_token(self, access_token: String) -> Self {
        Self {
            access_token,
            ..self
        }
    }

    /// Sets the account's IANA time zone name for date-filter conversion.
    #[must_use]
    pub fn with_timezone(self, timezone_name: Option<String>) -> Self {
        Self {
            timezone_name,
            ..self
        }
    }

    /// Points the context at a different API root, for tests and proxies.
    #[must_use]
    pub fn with_base_url(self, api_base: String) -> Self {
        Self { api_base, ..self }
    }

    /// Pairs the context with its credential bundle so the short-lived
    /// access token can be re-requested when it runs out.
    #[must_use]
    pub fn with_refresh(self, credentials: Credentials) -> RefreshableContext {
        RefreshableContext {
            context: self,
            credentials,
        }
    }

    #[must_use]
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub(crate) fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Checks if the access token has passed its expiry
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Takes a rate-limiter slot and executes the given function with the
    /// given context
    pub(crate) fn with_permission<'a, F, T>(&'a self, f: F) -> APIResult<T>
    where
        F: FnOnce(&'a Self) -> APIResult<T>,
    {
        self.limiter.wait();
        f(self)
    }
}
