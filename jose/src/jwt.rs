//! # JSON Web Token (JWT)
//!
//! JSON Web Token (JWT) is a compact, URL-safe means of representing
//! claims to be transferred between two parties. Tokens issued here are
//! always ES256-signed JWS structures with a fixed header and claim set.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// The only supported JWS `alg` header value.
pub const ALGORITHM: &str = "ES256";

/// The only supported JWS `typ` header value.
pub const TYPE: &str = "JWT";

/// Expiry values at or above this are absolute epoch milliseconds; anything
/// lower is a relative offset in seconds.
pub const EPOCH_MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// JWS protected header.
///
/// Field order is the serialization order and is part of the signing input.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Header {
    /// Signature algorithm, always `ES256`.
    pub alg: String,

    /// Media type, always `JWT`.
    pub typ: String,

    /// Identifier of the issuer key in its published JWKS.
    pub kid: String,
}

impl Header {
    /// Create an ES256 JWT header for the given key identifier.
    #[must_use]
    pub fn new(kid: impl Into<String>) -> Self {
        Self {
            alg: ALGORITHM.to_string(),
            typ: TYPE.to_string(),
            kid: kid.into(),
        }
    }
}

/// JWT claim set.
///
/// Field order is the serialization order and is part of the signing input.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Issuer domain, without scheme. Used to locate the issuer's JWKS.
    pub iss: String,

    /// Subject identifier.
    pub sub: String,

    /// Issued-at time in seconds since the epoch.
    pub iat: i64,

    /// Expiry time in seconds since the epoch.
    pub exp: i64,
}

/// An unsigned token: one header paired with one claim set.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwt {
    /// The JWT header.
    pub header: Header,

    /// The JWT claims.
    pub claims: Claims,
}

impl Jwt {
    /// Create a token issued now.
    ///
    /// `exp` is either an absolute epoch-milliseconds timestamp (at or above
    /// [`EPOCH_MILLIS_THRESHOLD`]) or a number of seconds from now. Negative
    /// relative values are clamped to zero, so the token expires at issuance.
    ///
    /// No validation is performed on any input.
    #[must_use]
    pub fn new(
        kid: impl Into<String>, iss: impl Into<String>, sub: impl Into<String>, exp: i64,
    ) -> Self {
        Self::issued_at(kid, iss, sub, exp, Utc::now().timestamp())
    }

    /// Create a token as if issued at `now` (seconds since the epoch).
    #[must_use]
    pub fn issued_at(
        kid: impl Into<String>, iss: impl Into<String>, sub: impl Into<String>, exp: i64,
        now: i64,
    ) -> Self {
        Self {
            header: Header::new(kid),
            claims: Claims {
                iss: iss.into(),
                sub: sub.into(),
                iat: now,
                exp: normalize_expiry(exp, now),
            },
        }
    }
}

/// Normalize a caller-supplied expiry to seconds since the epoch.
#[must_use]
pub fn normalize_expiry(exp: i64, now: i64) -> i64 {
    if exp >= EPOCH_MILLIS_THRESHOLD {
        exp.div_euclid(1000)
    } else {
        now.saturating_add(exp.max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000;

    #[test]
    fn fixed_header() {
        let jwt = Jwt::issued_at("2025Q4", "example.com", "user-123", 60, NOW);
        assert_eq!(jwt.header.alg, "ES256");
        assert_eq!(jwt.header.typ, "JWT");
        assert_eq!(jwt.header.kid, "2025Q4");
    }

    #[test]
    fn relative_expiry() {
        let jwt = Jwt::issued_at("k1", "example.com", "user-123", 3600, NOW);
        assert_eq!(jwt.claims.iat, NOW);
        assert_eq!(jwt.claims.exp, NOW + 3600);
        assert_eq!(jwt.claims.iss, "example.com");
        assert_eq!(jwt.claims.sub, "user-123");
    }

    #[test]
    fn absolute_millis_expiry() {
        let exp_millis = 1_900_000_000_999;
        let jwt = Jwt::issued_at("k1", "example.com", "user-123", exp_millis, NOW);
        assert_eq!(jwt.claims.exp, 1_900_000_000);
    }

    #[test]
    fn threshold_is_inclusive() {
        assert_eq!(normalize_expiry(EPOCH_MILLIS_THRESHOLD, NOW), 1_000_000_000);
        assert_eq!(normalize_expiry(EPOCH_MILLIS_THRESHOLD - 1, 0), EPOCH_MILLIS_THRESHOLD - 1);
    }

    // A negative relative expiry does not mint an already-expired token: it
    // collapses to the issue time.
    #[test]
    fn negative_relative_expiry_clamps_to_issuance() {
        let jwt = Jwt::issued_at("k1", "example.com", "u1", -10, NOW);
        assert_eq!(jwt.claims.exp, jwt.claims.iat);
    }

    #[test]
    fn new_uses_current_time() {
        let before = Utc::now().timestamp();
        let jwt = Jwt::new("k1", "example.com", "u1", 60);
        let after = Utc::now().timestamp();

        assert!(jwt.claims.iat >= before && jwt.claims.iat <= after);
        assert_eq!(jwt.claims.exp, jwt.claims.iat + 60);
    }

    #[test]
    fn claims_serialize_in_fixed_order() {
        let jwt = Jwt::issued_at("k1", "example.com", "u1", 60, NOW);
        let header = serde_json::to_string(&jwt.header).expect("should serialize");
        let claims = serde_json::to_string(&jwt.claims).expect("should serialize");

        assert_eq!(header, r#"{"alg":"ES256","typ":"JWT","kid":"k1"}"#);
        assert_eq!(
            claims,
            r#"{"iss":"example.com","sub":"u1","iat":1760000000,"exp":1760000060}"#
        );
    }
}
