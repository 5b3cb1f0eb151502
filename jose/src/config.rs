//! # Verifier Configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::jwks::WELL_KNOWN_PATH;

/// Settings used by [`crate::Verifier::from_config`].
///
/// Missing fields take their default value, so a partial document such as
/// `{"cache_ttl_secs": 300}` is valid.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// URL scheme used to reach the issuer's JWKS.
    pub scheme: String,

    /// Path of the JWKS document on the issuer host. A missing leading `/`
    /// is added.
    pub jwks_path: String,

    /// JWKS request timeout, in seconds.
    pub timeout_secs: u64,

    /// How long a fetched JWKS may be reused, in seconds. `0` fetches on
    /// every verification.
    pub cache_ttl_secs: u64,

    /// Maximum number of issuer JWKS documents held in the cache.
    pub cache_max_entries: usize,

    /// `User-Agent` sent with JWKS requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            jwks_path: WELL_KNOWN_PATH.to_string(),
            timeout_secs: 10,
            cache_ttl_secs: 0,
            cache_max_entries: 256,
            user_agent: None,
        }
    }
}

impl Config {
    /// JWKS request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// JWKS cache time-to-live.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
