//! # Token Verification
//!
//! Verification runs a fixed sequence of stages, each of which can reject
//! the token:
//!
//! 1. structure: three non-empty `.`-separated segments
//! 2. decode: header and payload are base64url-encoded JSON
//! 3. header: non-empty `kid`, `alg` is `ES256`, `typ` is `JWT`
//! 4. claims: `iss` and `sub` are strings
//! 5. expiry: `exp` is a number strictly greater than the current time
//! 6. key discovery: the issuer's JWKS contains a key with the header `kid`
//! 7. signature: the key verifies the signature over the original
//!    `header.payload` text
//!
//! [`Verifier::check`] reports which stage failed as a [`Failure`];
//! [`Verifier::verify`] reduces the outcome to the subject or `None`.

use chrono::Utc;
use keyset_ecc::Algorithm;
use serde_json::{Number, Value};

use crate::config::Config;
use crate::jwks::{Cached, Fetcher, HttpFetcher, Resolver, WellKnown};
use crate::jws::CompactJws;
use crate::jwt::{ALGORITHM, TYPE};

/// Why a token was rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Failure {
    /// The token is not three non-empty `.`-separated segments.
    #[error("token is not a compact JWS")]
    Malformed,

    /// A segment is not valid base64url, or header/payload is not JSON.
    #[error("unable to decode token: {0}")]
    Decode(String),

    /// The header has no `kid`, or `alg`/`typ` are not `ES256`/`JWT`.
    #[error("unsupported header: {0}")]
    Header(String),

    /// A required claim is missing or has the wrong type.
    #[error("missing or invalid `{0}` claim")]
    MissingClaim(&'static str),

    /// The token's `exp` is not after the verification time.
    #[error("token expired at {exp} (now {now})")]
    Expired {
        /// The token's `exp` claim.
        exp: Number,
        /// The verification time, in seconds since the epoch.
        now: i64,
    },

    /// No JWKS URL could be derived from the issuer.
    #[error("unable to resolve JWKS for issuer: {0}")]
    Resolve(String),

    /// The JWKS request failed, was unsuccessful, or returned an invalid body.
    #[error("unable to fetch JWKS: {0}")]
    Fetch(String),

    /// The issuer's JWKS has no key with the header's `kid`.
    #[error("no key with kid `{0}` in issuer JWKS")]
    KeyNotFound(String),

    /// The discovered key is not a usable P-256 public key.
    #[error("unusable verification key: {0}")]
    InvalidKey(String),

    /// The signature does not match the signing input.
    #[error("signature verification failed")]
    SignatureInvalid,
}

/// A successfully verified token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verified {
    /// The `sub` claim.
    pub subject: String,

    /// The `iss` claim.
    pub issuer: String,

    /// The `kid` of the key that verified the signature.
    pub kid: String,
}

/// Verifies compact ES256 tokens against issuer-published JWKS documents.
///
/// The verifier holds no per-token state: concurrent calls are independent
/// and each performs its own key discovery (unless the fetcher caches).
#[derive(Debug)]
pub struct Verifier<R = WellKnown, F = HttpFetcher> {
    resolver: R,
    fetcher: F,
}

impl Verifier {
    /// A verifier using `https://{iss}/.well-known/jwks.json` discovery and no
    /// caching.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self::with(WellKnown::default(), HttpFetcher::new()?))
    }
}

impl Verifier<WellKnown, Cached<HttpFetcher>> {
    /// Build a verifier from configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let fetcher = HttpFetcher::with_timeout(config.timeout(), config.user_agent.as_deref())?;
        Ok(Self::with(
            WellKnown::new(&config.scheme, &config.jwks_path),
            Cached::with_capacity(fetcher, config.cache_ttl(), config.cache_max_entries),
        ))
    }
}

impl<R: Resolver, F: Fetcher> Verifier<R, F> {
    /// A verifier with a custom resolver and fetcher.
    pub fn with(resolver: R, fetcher: F) -> Self {
        Self { resolver, fetcher }
    }

    /// The issuer resolver.
    pub const fn resolver(&self) -> &R {
        &self.resolver
    }

    /// The JWKS fetcher.
    pub const fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Verify the token, returning its subject, or `None` if any stage fails.
    ///
    /// Never panics and never returns an error: the rejection reason is only
    /// logged.
    pub async fn verify(&self, token: &str) -> Option<String> {
        match self.check(token).await {
            Ok(verified) => Some(verified.subject),
            Err(failure) => {
                tracing::debug!(%failure, "token rejected");
                None
            }
        }
    }

    /// Verify the token against the current time.
    ///
    /// # Errors
    /// Returns the [`Failure`] of the first stage that rejects the token.
    pub async fn check(&self, token: &str) -> Result<Verified, Failure> {
        self.check_at(token, Utc::now().timestamp()).await
    }

    /// Verify the token as if the current time were `now` (seconds since the
    /// epoch).
    ///
    /// # Errors
    /// Returns the [`Failure`] of the first stage that rejects the token.
    pub async fn check_at(&self, token: &str, now: i64) -> Result<Verified, Failure> {
        let jws: CompactJws = token.parse().map_err(|_| Failure::Malformed)?;

        let header = jws.header().map_err(decode_failure)?;
        let claims = jws.claims().map_err(decode_failure)?;

        let kid = check_header(&header)?;
        let (issuer, subject) = check_claims(&claims)?;
        check_expiry(&claims, now)?;

        let url = self.resolver.jwks_url(issuer).map_err(|e| Failure::Resolve(format!("{e:#}")))?;
        let jwks = self.fetcher.fetch(&url).await.map_err(|e| Failure::Fetch(format!("{e:#}")))?;
        let Some(jwk) = jwks.find(kid) else {
            return Err(Failure::KeyNotFound(kid.to_string()));
        };

        let signature = jws.signature().map_err(decode_failure)?;
        let public_key = jwk
            .and_then(|jwk| jwk.verifying_key())
            .map_err(|e| Failure::InvalidKey(format!("{e:#}")))?;
        Algorithm::ES256
            .verify(jws.signing_input().as_bytes(), &signature, &public_key)
            .map_err(|_| Failure::SignatureInvalid)?;

        tracing::debug!(%issuer, %kid, "token verified");

        Ok(Verified {
            subject: subject.to_string(),
            issuer: issuer.to_string(),
            kid: kid.to_string(),
        })
    }
}

/// Verify a token using default discovery, returning its subject, or `None`
/// if the token is rejected for any reason.
pub async fn verify(token: &str) -> Option<String> {
    match Verifier::new() {
        Ok(verifier) => verifier.verify(token).await,
        Err(e) => {
            tracing::warn!(error = %e, "unable to create verifier");
            None
        }
    }
}

#[allow(clippy::needless_pass_by_value)]
fn decode_failure(e: anyhow::Error) -> Failure {
    Failure::Decode(format!("{e:#}"))
}

fn check_header(header: &Value) -> Result<&str, Failure> {
    let Some(kid) = header.get("kid").and_then(Value::as_str).filter(|kid| !kid.is_empty())
    else {
        return Err(Failure::Header("missing `kid`".to_string()));
    };
    if header.get("alg").and_then(Value::as_str) != Some(ALGORITHM) {
        return Err(Failure::Header(format!("`alg` must be {ALGORITHM}")));
    }
    if header.get("typ").and_then(Value::as_str) != Some(TYPE) {
        return Err(Failure::Header(format!("`typ` must be {TYPE}")));
    }
    Ok(kid)
}

fn check_claims(claims: &Value) -> Result<(&str, &str), Failure> {
    let iss = claims.get("iss").and_then(Value::as_str).ok_or(Failure::MissingClaim("iss"))?;
    let sub = claims.get("sub").and_then(Value::as_str).ok_or(Failure::MissingClaim("sub"))?;
    Ok((iss, sub))
}

fn check_expiry(claims: &Value, now: i64) -> Result<(), Failure> {
    let Some(Value::Number(exp)) = claims.get("exp") else {
        return Err(Failure::MissingClaim("exp"));
    };
    if is_after(exp, now) {
        Ok(())
    } else {
        Err(Failure::Expired {
            exp: exp.clone(),
            now,
        })
    }
}

// `exp` may be any JSON number: integers compare exactly, floats as f64
#[allow(clippy::cast_precision_loss)]
fn is_after(exp: &Number, now: i64) -> bool {
    if let Some(exp) = exp.as_i64() {
        exp > now
    } else if exp.as_u64().is_some() {
        true
    } else {
        exp.as_f64().is_some_and(|exp| exp > now as f64)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{Result, anyhow};
    use base64ct::{Base64UrlUnpadded, Encoding};
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::jwk::{Jwks, Keyset};
    use crate::jws::{assemble, sign};
    use crate::jwt::Jwt;

    const NOW: i64 = 1_760_000_000;
    const KID: &str = "test-key";
    const ISSUER: &str = "example.com";

    struct Static(Jwks);

    impl Fetcher for Static {
        async fn fetch(&self, url: &Url) -> Result<Jwks> {
            assert_eq!(url.as_str(), "https://example.com/.well-known/jwks.json");
            Ok(self.0.clone())
        }
    }

    struct Unreachable;

    impl Fetcher for Unreachable {
        async fn fetch(&self, url: &Url) -> Result<Jwks> {
            Err(anyhow!("connection refused: {url}"))
        }
    }

    fn verifier(jwks: Jwks) -> Verifier<WellKnown, Static> {
        Verifier::with(WellKnown::default(), Static(jwks))
    }

    async fn minted(keyset: &Keyset, exp: i64) -> String {
        let jwt = Jwt::issued_at(KID, ISSUER, "user-123", exp, NOW);
        sign(&keyset.private_jwk, &jwt).await.expect("should sign")
    }

    // sign arbitrary header and payload JSON
    async fn raw(keyset: &Keyset, header: &Value, payload: &Value) -> String {
        let input = format!(
            "{}.{}",
            Base64UrlUnpadded::encode_string(header.to_string().as_bytes()),
            Base64UrlUnpadded::encode_string(payload.to_string().as_bytes())
        );
        let sig = keyset_ecc::Signer::try_sign(&keyset.private_jwk, input.as_bytes())
            .await
            .expect("should sign");
        assemble(&input, &sig)
    }

    fn header() -> Value {
        json!({"alg": "ES256", "typ": "JWT", "kid": KID})
    }

    fn payload() -> Value {
        json!({"iss": ISSUER, "sub": "user-123", "iat": NOW, "exp": NOW + 60})
    }

    #[tokio::test]
    async fn verified_subject() {
        let keyset = Keyset::generate(KID).expect("should generate");
        let token = minted(&keyset, 60).await;

        let verified = verifier(keyset.jwks()).check_at(&token, NOW).await.expect("should verify");
        assert_eq!(
            verified,
            Verified {
                subject: "user-123".to_string(),
                issuer: ISSUER.to_string(),
                kid: KID.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn malformed() {
        let verifier = verifier(Jwks::default());
        assert_eq!(verifier.check_at("not-a-jwt", NOW).await, Err(Failure::Malformed));
        assert_eq!(verifier.check_at("a..c", NOW).await, Err(Failure::Malformed));
        assert_eq!(verifier.verify("not-a-jwt").await, None);
    }

    #[tokio::test]
    async fn undecodable_segments() {
        let verifier = verifier(Jwks::default());

        let result = verifier.check_at("!!!.e30.AA", NOW).await;
        assert!(matches!(result, Err(Failure::Decode(_))), "{result:?}");

        // valid base64url, not JSON
        let not_json = Base64UrlUnpadded::encode_string(b"not json");
        let token = format!("e30.{not_json}.AA");
        let result = verifier.check_at(&token, NOW).await;
        assert!(matches!(result, Err(Failure::Decode(_))), "{result:?}");
    }

    #[tokio::test]
    async fn header_checks() {
        let keyset = Keyset::generate(KID).expect("should generate");
        let verifier = verifier(keyset.jwks());

        for (field, value) in [
            ("alg", json!("ES384")),
            ("alg", json!("none")),
            ("typ", json!("JWS")),
            ("kid", json!("")),
            ("kid", json!(5)),
        ] {
            let mut header = header();
            header[field] = value;
            let token = raw(&keyset, &header, &payload()).await;

            let result = verifier.check_at(&token, NOW).await;
            assert!(matches!(result, Err(Failure::Header(_))), "{field}: {result:?}");
        }

        let token = raw(&keyset, &json!({"alg": "ES256", "typ": "JWT"}), &payload()).await;
        assert!(matches!(verifier.check_at(&token, NOW).await, Err(Failure::Header(_))));
    }

    #[tokio::test]
    async fn claim_checks() {
        let keyset = Keyset::generate(KID).expect("should generate");
        let verifier = verifier(keyset.jwks());

        for (claim, value) in [("iss", json!(null)), ("iss", json!(42)), ("sub", json!(["u"]))] {
            let mut payload = payload();
            payload[claim] = value;
            let token = raw(&keyset, &header(), &payload).await;
            assert_eq!(
                verifier.check_at(&token, NOW).await,
                Err(Failure::MissingClaim(claim)),
                "{claim}"
            );
        }

        let mut payload = payload();
        payload["exp"] = json!("tomorrow");
        let token = raw(&keyset, &header(), &payload).await;
        assert_eq!(verifier.check_at(&token, NOW).await, Err(Failure::MissingClaim("exp")));

        let token = raw(&keyset, &header(), &json!("just a string")).await;
        assert_eq!(verifier.check_at(&token, NOW).await, Err(Failure::MissingClaim("iss")));
    }

    #[tokio::test]
    async fn expiry_is_strict() {
        let keyset = Keyset::generate(KID).expect("should generate");
        let verifier = verifier(keyset.jwks());
        let token = minted(&keyset, 60).await;

        assert!(verifier.check_at(&token, NOW + 59).await.is_ok());
        assert_eq!(
            verifier.check_at(&token, NOW + 60).await,
            Err(Failure::Expired {
                exp: Number::from(NOW + 60),
                now: NOW + 60
            })
        );
    }

    #[tokio::test]
    async fn fractional_expiry() {
        let keyset = Keyset::generate(KID).expect("should generate");
        let verifier = verifier(keyset.jwks());

        let mut payload = payload();
        payload["exp"] = json!(1_760_000_000.5);
        let token = raw(&keyset, &header(), &payload).await;

        assert!(verifier.check_at(&token, NOW).await.is_ok());
        assert!(matches!(
            verifier.check_at(&token, NOW + 1).await,
            Err(Failure::Expired { .. })
        ));
    }

    #[tokio::test]
    async fn clamped_expiry_is_rejected() {
        let keyset = Keyset::generate(KID).expect("should generate");
        let token = minted(&keyset, -10).await;

        let result = verifier(keyset.jwks()).check_at(&token, NOW).await;
        assert!(matches!(result, Err(Failure::Expired { .. })), "{result:?}");
    }

    #[tokio::test]
    async fn key_not_found() {
        let keyset = Keyset::generate(KID).expect("should generate");
        let other = keyset.public_jwk.clone().with_kid("other-key");
        let token = minted(&keyset, 60).await;

        let result = verifier(Jwks::from(vec![other])).check_at(&token, NOW).await;
        assert_eq!(result, Err(Failure::KeyNotFound(KID.to_string())));
    }

    #[tokio::test]
    async fn unparseable_siblings_are_skipped() {
        let keyset = Keyset::generate(KID).expect("should generate");
        let token = minted(&keyset, 60).await;

        for sibling in [json!(null), json!({"kid": "legacy"}), json!({"kty": "EC", "kid": 7})] {
            let jwks: Jwks = serde_json::from_value(json!({
                "keys": [sibling, keyset.public_jwk]
            }))
            .expect("should deserialize");

            let verified = verifier(jwks).check_at(&token, NOW).await;
            assert_eq!(verified.map(|v| v.subject).as_deref(), Ok("user-123"), "{sibling}");
        }
    }

    #[tokio::test]
    async fn unparseable_matching_key() {
        let keyset = Keyset::generate(KID).expect("should generate");
        let token = minted(&keyset, 60).await;

        let jwks: Jwks = serde_json::from_value(json!({
            "keys": [{"kid": KID, "x": 1}, keyset.public_jwk]
        }))
        .expect("should deserialize");
        let result = verifier(jwks).check_at(&token, NOW).await;
        assert!(matches!(result, Err(Failure::InvalidKey(_))), "{result:?}");
    }

    #[tokio::test]
    async fn fetch_failure() {
        let keyset = Keyset::generate(KID).expect("should generate");
        let token = minted(&keyset, 60).await;

        let verifier = Verifier::with(WellKnown::default(), Unreachable);
        let result = verifier.check_at(&token, NOW).await;
        assert!(matches!(result, Err(Failure::Fetch(_))), "{result:?}");
        assert_eq!(verifier.verify(&token).await, None);
    }

    #[tokio::test]
    async fn resolver_failure() {
        let keyset = Keyset::generate(KID).expect("should generate");
        let mut payload = payload();
        payload["iss"] = json!("https://example.com");
        let token = raw(&keyset, &header(), &payload).await;

        let result = verifier(keyset.jwks()).check_at(&token, NOW).await;
        assert!(matches!(result, Err(Failure::Resolve(_))), "{result:?}");
    }

    #[tokio::test]
    async fn allow_listing_resolver() {
        let keyset = Keyset::generate(KID).expect("should generate");
        let token = minted(&keyset, 60).await;

        let deny_all = |issuer: &str| -> Result<Url> { Err(anyhow!("issuer not allowed: {issuer}")) };
        let verifier = Verifier::with(deny_all, Static(keyset.jwks()));
        let result = verifier.check_at(&token, NOW).await;
        assert!(matches!(result, Err(Failure::Resolve(_))), "{result:?}");
    }

    #[tokio::test]
    async fn invalid_key() {
        let keyset = Keyset::generate(KID).expect("should generate");
        let mut published = keyset.public_jwk.clone();
        published.crv = Some("P-384".to_string());
        let token = minted(&keyset, 60).await;

        let result = verifier(Jwks::from(vec![published])).check_at(&token, NOW).await;
        assert!(matches!(result, Err(Failure::InvalidKey(_))), "{result:?}");
    }

    #[tokio::test]
    async fn signature_checks() {
        let keyset = Keyset::generate(KID).expect("should generate");
        let token = minted(&keyset, 60).await;
        let (signing_input, signature) = token.rsplit_once('.').expect("should have signature");

        // payload altered after signing
        let mut payload = payload();
        payload["sub"] = json!("admin");
        let forged_payload = Base64UrlUnpadded::encode_string(payload.to_string().as_bytes());
        let (header_b64, _) = signing_input.split_once('.').expect("should have payload");
        let forged = format!("{header_b64}.{forged_payload}.{signature}");

        let verifier = verifier(keyset.jwks());
        assert_eq!(verifier.check_at(&forged, NOW).await, Err(Failure::SignatureInvalid));

        // signed by a different key with the same kid
        let impostor = Keyset::generate(KID).expect("should generate");
        let token = minted(&impostor, 60).await;
        assert_eq!(verifier.check_at(&token, NOW).await, Err(Failure::SignatureInvalid));

        // signature segment is not base64url
        let token = format!("{signing_input}.***");
        assert!(matches!(verifier.check_at(&token, NOW).await, Err(Failure::Decode(_))));
    }

    #[test]
    fn failure_messages() {
        assert_eq!(Failure::Malformed.to_string(), "token is not a compact JWS");
        assert_eq!(
            Failure::KeyNotFound("k1".to_string()).to_string(),
            "no key with kid `k1` in issuer JWKS"
        );
        assert_eq!(
            Failure::Expired {
                exp: Number::from(1),
                now: 2
            }
            .to_string(),
            "token expired at 1 (now 2)"
        );
    }
}
