//! # ES256 Tokens with JWKS Key Discovery
//!
//! Issue compact JSON Web Tokens ([RFC7519]) signed with ES256 ([RFC7518])
//! and verify them against the key set the issuer publishes at
//! `https://{iss}/.well-known/jwks.json` ([RFC7517]).
//!
//! ```rust,no_run
//! use keyset_jose::{Jwt, Keyset};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let keyset = Keyset::generate("2025Q4")?;
//!
//! // expires in one hour
//! let jwt = Jwt::new("2025Q4", "api.example.com", "user-123", 60 * 60);
//! let token = keyset_jose::sign(&keyset.private_jwk, &jwt).await?;
//!
//! // `keyset.jwks()` must be served at
//! // https://api.example.com/.well-known/jwks.json
//! let subject = keyset_jose::verify(&token).await;
//! # Ok(())
//! # }
//! ```
//!
//! Verification trusts the `iss` claim to locate the issuer's keys. Callers
//! that only accept particular issuers should supply their own
//! [`Resolver`](jwks::Resolver) to [`Verifier::with`].
//!
//! [RFC7517]: https://www.rfc-editor.org/rfc/rfc7517
//! [RFC7518]: https://www.rfc-editor.org/rfc/rfc7518
//! [RFC7519]: https://www.rfc-editor.org/rfc/rfc7519

pub mod config;
pub mod jwk;
pub mod jwks;
pub mod jws;
pub mod jwt;
pub mod verify;

pub use keyset_ecc::{Algorithm, Signer};

pub use crate::config::Config;
pub use crate::jwk::{Jwk, Jwks, Keyset};
pub use crate::jwks::{Cached, Fetcher, HttpFetcher, Resolver, WellKnown};
pub use crate::jws::{CompactJws, encode, sign};
pub use crate::jwt::{Claims, Header, Jwt};
pub use crate::verify::{Failure, Verified, Verifier, verify};
