/*
 * A rust library for pulling data from the ServiceTitan v2 API.
 *
 * For more information, you can check out their documentation at:
 * https://developer.servicetitan.io/apis/
 */
#![warn(clippy::pedantic)]

pub mod client;
pub use client::{Credentials, RefreshableContext, STContext};
pub mod data;
pub mod dates;
pub mod endpoint;
pub mod error;
mod limiter;

pub use data::DataService;
pub use endpoint::{Endpoint, QueryOptions};
pub use error::{APIError, APIResult};

use serde::{Deserialize, Serialize};

/// Which ServiceTitan deployment a context talks to.
///
/// Integration tenants are the sandbox ServiceTitan provisions for app
/// development; they run the same API surface against seeded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Environment {
    PRODUCTION,
    #[default]
    INTEGRATION,
}

impl Environment {
    #[inline]
    #[must_use]
    pub fn endpoint_url(&self) -> &'static str {
        match self {
            Environment::PRODUCTION => "https://api.servicetitan.io",
            Environment::INTEGRATION => "https://api-integration.servicetitan.io",
        }
    }

    #[inline]
    #[must_use]
    pub fn auth_url(&self) -> &'static str {
        match self {
            Environment::PRODUCTION => "https://auth.servicetitan.io/connect/token",
            Environment::INTEGRATION => "https://auth-integration.servicetitan.io/connect/token",
        }
    }
}
