//! # Test Utilities
//!
//! Fixtures for exercising token issuance and verification without a real
//! issuer: an [`Issuer`] that mints tokens, an in-memory [`StaticFetcher`],
//! and a [`JwksServer`] that publishes a JWKS over HTTP.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use dashmap::DashMap;
use keyset_jose::jwks::WELL_KNOWN_PATH;
use keyset_jose::{Fetcher, Jwks, Jwt, Keyset, Resolver, WellKnown};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A token issuer holding one signing key.
#[derive(Clone, Debug)]
pub struct Issuer {
    /// The issuer domain placed in `iss`.
    pub domain: String,

    /// The issuer's key pair.
    pub keyset: Keyset,
}

impl Issuer {
    /// Create an issuer for `domain` with a freshly generated key `kid`.
    ///
    /// # Errors
    /// Returns an error if the key cannot be generated.
    pub fn new(domain: impl Into<String>, kid: impl Into<String>) -> Result<Self> {
        Ok(Self {
            domain: domain.into(),
            keyset: Keyset::generate(kid)?,
        })
    }

    /// The identifier of the issuer's key.
    #[must_use]
    pub fn kid(&self) -> &str {
        self.keyset.private_jwk.kid.as_deref().unwrap_or_default()
    }

    /// The issuer's published key set.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        self.keyset.jwks()
    }

    /// An unsigned token for `sub` from this issuer.
    #[must_use]
    pub fn jwt(&self, sub: &str, exp: i64) -> Jwt {
        Jwt::new(self.kid(), &self.domain, sub, exp)
    }

    /// Mint a signed token for `sub`.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub async fn mint(&self, sub: &str, exp: i64) -> Result<String> {
        keyset_jose::sign(&self.keyset.private_jwk, &self.jwt(sub, exp)).await
    }
}

/// A random subject identifier.
#[must_use]
pub fn subject() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// An in-memory [`Fetcher`] serving published documents by URL and counting
/// requests.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    documents: DashMap<Url, Jwks>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    /// Create an empty fetcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `issuer`'s key set where `resolver` expects it.
    ///
    /// # Errors
    /// Returns an error if the resolver rejects the issuer domain.
    pub fn publish(&self, resolver: &impl Resolver, issuer: &Issuer) -> Result<()> {
        self.publish_jwks(resolver.jwks_url(&issuer.domain)?, issuer.jwks());
        Ok(())
    }

    /// Serve `jwks` at `url`, replacing any earlier document.
    pub fn publish_jwks(&self, url: Url, jwks: Jwks) {
        self.documents.insert(url, jwks);
    }

    /// The number of fetches performed so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &Url) -> Result<Jwks> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(url)
            .map(|jwks| jwks.value().clone())
            .ok_or_else(|| anyhow!("404 Not Found: {url}"))
    }
}

/// A local HTTP server standing in for an issuer's JWKS endpoint.
pub struct JwksServer {
    server: MockServer,
}

impl JwksServer {
    /// Start a server with nothing published.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// The issuer domain (`host:port`) whose JWKS this server hosts.
    #[must_use]
    pub fn issuer(&self) -> String {
        self.server.address().to_string()
    }

    /// A resolver that reaches this server over plain HTTP.
    #[must_use]
    pub fn resolver(&self) -> WellKnown {
        WellKnown::new("http", WELL_KNOWN_PATH)
    }

    /// Serve `jwks` at the well-known path.
    pub async fn publish(&self, jwks: &Jwks) {
        self.respond(ResponseTemplate::new(200).set_body_json(jwks)).await;
    }

    /// Serve an arbitrary JSON body at the well-known path.
    pub async fn publish_raw(&self, body: serde_json::Value) {
        self.respond(ResponseTemplate::new(200).set_body_json(body)).await;
    }

    /// Answer requests for the well-known path with `status`.
    pub async fn fail_with(&self, status: u16) {
        self.respond(ResponseTemplate::new(status)).await;
    }

    /// Replace all published responses with `response`.
    pub async fn respond(&self, response: ResponseTemplate) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(WELL_KNOWN_PATH))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// The number of requests the server has received.
    pub async fn requests(&self) -> usize {
        self.server.received_requests().await.map_or(0, |requests| requests.len())
    }
}
