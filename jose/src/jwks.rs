//! # Key Discovery
//!
//! Issuers publish their verification keys as a JWKS document. Discovery is
//! split in two so callers can change either half independently:
//!
//! - a [`Resolver`] maps the (self-asserted) `iss` claim to a JWKS URL. The
//!   default, [`WellKnown`], uses `https://{iss}/.well-known/jwks.json`. Any
//!   `Fn(&str) -> Result<Url>` closure is also a resolver, which is the place
//!   to add issuer allow-listing or key-location pinning.
//! - a [`Fetcher`] retrieves the document. [`HttpFetcher`] performs a plain
//!   GET per call; [`Cached`] adds an optional TTL-bounded cache in front of
//!   any fetcher.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tokio::sync::RwLock;
use url::Url;

use crate::jwk::Jwks;

/// Path of the JWKS document relative to the issuer origin.
pub const WELL_KNOWN_PATH: &str = "/.well-known/jwks.json";

/// Maps an issuer to the URL of its JWKS document.
pub trait Resolver: Send + Sync {
    /// Resolve the JWKS URL for `issuer`.
    ///
    /// # Errors
    /// Returns an error if no URL can be derived for the issuer.
    fn jwks_url(&self, issuer: &str) -> Result<Url>;
}

impl<F> Resolver for F
where
    F: Fn(&str) -> Result<Url> + Send + Sync,
{
    fn jwks_url(&self, issuer: &str) -> Result<Url> {
        self(issuer)
    }
}

/// Resolves `{scheme}://{issuer}{path}`, by default
/// `https://{issuer}/.well-known/jwks.json`.
///
/// The issuer must be a bare host, optionally with a port. Issuers carrying a
/// path (`example.com/tenant`), query, fragment or userinfo are rejected at
/// resolution rather than left to fail at fetch time. Use a closure
/// [`Resolver`] to serve path-scoped issuers.
#[derive(Clone, Debug)]
pub struct WellKnown {
    scheme: String,
    path: String,
}

impl Default for WellKnown {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            path: WELL_KNOWN_PATH.to_string(),
        }
    }
}

impl WellKnown {
    /// Create a resolver with an explicit scheme and path.
    ///
    /// A path without a leading `/` is treated as relative to the root, so
    /// `keys` and `/keys` are equivalent.
    #[must_use]
    pub fn new(scheme: impl Into<String>, path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        Self {
            scheme: scheme.into(),
            path,
        }
    }
}

impl Resolver for WellKnown {
    fn jwks_url(&self, issuer: &str) -> Result<Url> {
        let url = Url::parse(&format!("{}://{issuer}{}", self.scheme, self.path))
            .with_context(|| format!("invalid issuer: {issuer}"))?;

        // issuer must be a bare host, optionally with a port
        let bare = url.host_str().is_some()
            && url.username().is_empty()
            && url.password().is_none()
            && url.path() == self.path
            && url.query().is_none()
            && url.fragment().is_none();
        if !bare {
            return Err(anyhow!("invalid issuer: {issuer}"));
        }
        Ok(url)
    }
}

/// Retrieves a JWKS document.
pub trait Fetcher: Send + Sync {
    /// Fetch and decode the JWKS document at `url`.
    ///
    /// # Errors
    /// Returns an error on transport failure, a non-success response, or a
    /// body that is not a JWKS document.
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<Jwks>> + Send;
}

/// Fetches JWKS documents over HTTP(S), one request per call.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a fetcher with the default timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Self::DEFAULT_TIMEOUT, None)
    }

    /// Create a fetcher with a request timeout and optional `User-Agent`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn with_timeout(timeout: Duration, user_agent: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(user_agent) = user_agent {
            builder = builder.user_agent(user_agent);
        }
        let client = builder.build().context("issue building HTTP client")?;
        Ok(Self { client })
    }

    /// Use an existing client.
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Jwks> {
        tracing::debug!(%url, "fetching JWKS");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("issue requesting {url}"))?
            .error_for_status()
            .with_context(|| format!("unsuccessful response from {url}"))?;

        response.json::<Jwks>().await.with_context(|| format!("issue decoding JWKS from {url}"))
    }
}

/// A TTL-bounded cache in front of another [`Fetcher`], keyed by URL.
///
/// Only successful fetches are cached. An entry is served until it is older
/// than the TTL, so a rotated key becomes visible at most one TTL after it
/// is published. A zero TTL disables caching: every call reaches the inner
/// fetcher.
///
/// Expired entries are pruned whenever a new document is stored, and at most
/// `max_entries` documents are held. Once full, newly fetched documents are
/// returned without being cached until older entries expire.
#[derive(Debug)]
pub struct Cached<F> {
    inner: F,
    ttl: Duration,
    max_entries: usize,
    entries: RwLock<HashMap<Url, Entry>>,
}

#[derive(Debug)]
struct Entry {
    jwks: Jwks,
    fetched_at: Instant,
}

impl<F: Fetcher> Cached<F> {
    /// Default maximum number of cached documents.
    pub const DEFAULT_MAX_ENTRIES: usize = 256;

    /// Wrap `inner`, caching documents for `ttl`.
    pub fn new(inner: F, ttl: Duration) -> Self {
        Self::with_capacity(inner, ttl, Self::DEFAULT_MAX_ENTRIES)
    }

    /// Wrap `inner`, caching at most `max_entries` documents for `ttl`.
    pub fn with_capacity(inner: F, ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner,
            ttl,
            max_entries,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The configured time-to-live.
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The wrapped fetcher.
    pub const fn inner(&self) -> &F {
        &self.inner
    }

    /// The number of documents currently held, including expired ones not
    /// yet pruned.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no documents are held.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every cached document.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    async fn store(&self, url: &Url, jwks: &Jwks) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.fetched_at.elapsed() < self.ttl);

        if entries.len() >= self.max_entries && !entries.contains_key(url) {
            tracing::debug!(%url, max_entries = self.max_entries, "JWKS cache full");
            return;
        }
        entries.insert(
            url.clone(),
            Entry {
                jwks: jwks.clone(),
                fetched_at: Instant::now(),
            },
        );
    }
}

impl<F: Fetcher> Fetcher for Cached<F> {
    async fn fetch(&self, url: &Url) -> Result<Jwks> {
        if self.ttl.is_zero() {
            return self.inner.fetch(url).await;
        }

        if let Some(entry) = self.entries.read().await.get(url)
            && entry.fetched_at.elapsed() < self.ttl
        {
            tracing::debug!(%url, "using cached JWKS");
            return Ok(entry.jwks.clone());
        }

        tracing::debug!(%url, "JWKS cache miss");
        let jwks = self.inner.fetch(url).await?;
        self.store(url, &jwks).await;

        Ok(jwks)
    }
}
