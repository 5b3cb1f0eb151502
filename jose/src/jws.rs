//! # JSON Web Signature (JWS)
//!
//! JWS ([RFC7515]) compact serialization for ES256 tokens: the encoded
//! header and claims are joined with `.` to form the signing input, and the
//! encoded signature is appended as a third segment.
//!
//! [RFC7515]: https://www.rfc-editor.org/rfc/rfc7515

use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use base64ct::{Base64UrlUnpadded, Encoding};
use keyset_ecc::{Algorithm, Signer};
use serde::Serialize;
use serde_json::Value;

use crate::jwk::Jwk;
use crate::jwt::{Claims, Header, Jwt};

/// Encode the token and sign it, returning the compact JWS string.
///
/// # Errors
/// Returns an error if the signer does not use ES256, if serialization fails,
/// or if the signer fails (for example, a malformed private key).
pub async fn encode(jwt: &Jwt, signer: &impl Signer) -> Result<String> {
    tracing::debug!(kid = %jwt.header.kid, "encode");

    let algorithm = signer.algorithm().await?;
    if algorithm != Algorithm::ES256 {
        bail!("unsupported signing algorithm: {algorithm}");
    }

    let signing_input = signing_input(&jwt.header, &jwt.claims)?;
    let signature = signer.try_sign(signing_input.as_bytes()).await?;

    Ok(assemble(&signing_input, &signature))
}

/// Sign the token with a private P-256 JWK.
///
/// # Errors
/// Returns an error if the JWK is not a usable private ES256 key.
pub async fn sign(private_jwk: &Jwk, jwt: &Jwt) -> Result<String> {
    encode(jwt, private_jwk).await
}

/// Build the signing input, `base64url(header) "." base64url(claims)`.
///
/// The output depends only on the content of `header` and `claims`: fields
/// are serialized in declaration order.
///
/// # Errors
/// Returns an error if either value fails to serialize.
pub fn signing_input(header: &Header, claims: &Claims) -> Result<String> {
    Ok(format!("{}.{}", encode_segment(header)?, encode_segment(claims)?))
}

/// Append the base64url-encoded signature to the signing input.
#[must_use]
pub fn assemble(signing_input: &str, signature: &[u8]) -> String {
    format!("{signing_input}.{}", Base64UrlUnpadded::encode_string(signature))
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// A compact JWS split into its three encoded segments.
///
/// Parsing only checks the structure. Segments are decoded on demand so that
/// decode failures can be reported by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompactJws {
    header: String,
    payload: String,
    signature: String,
}

impl CompactJws {
    /// The encoded header segment.
    #[must_use]
    pub fn header_b64(&self) -> &str {
        &self.header
    }

    /// The encoded payload segment.
    #[must_use]
    pub fn payload_b64(&self) -> &str {
        &self.payload
    }

    /// The encoded signature segment.
    #[must_use]
    pub fn signature_b64(&self) -> &str {
        &self.signature
    }

    /// The signing input exactly as it appeared in the token.
    #[must_use]
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.header, self.payload)
    }

    /// Decode the header segment to JSON.
    ///
    /// # Errors
    /// Returns an error if the segment is not base64url-encoded JSON.
    pub fn header(&self) -> Result<Value> {
        decode_segment(&self.header).map_err(|e| anyhow!("issue decoding header: {e}"))
    }

    /// Decode the payload segment to JSON.
    ///
    /// # Errors
    /// Returns an error if the segment is not base64url-encoded JSON.
    pub fn claims(&self) -> Result<Value> {
        decode_segment(&self.payload).map_err(|e| anyhow!("issue decoding claims: {e}"))
    }

    /// Decode the signature segment to bytes.
    ///
    /// # Errors
    /// Returns an error if the segment is not base64url-encoded.
    pub fn signature(&self) -> Result<Vec<u8>> {
        Base64UrlUnpadded::decode_vec(&self.signature)
            .map_err(|e| anyhow!("issue decoding signature: {e}"))
    }
}

fn decode_segment(segment: &str) -> Result<Value> {
    let bytes = Base64UrlUnpadded::decode_vec(segment)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Error returned when a string is not three non-empty `.`-separated segments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid compact JWS format")]
pub struct Malformed;

impl FromStr for CompactJws {
    type Err = Malformed;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s.split('.').collect::<Vec<&str>>();
        let [header, payload, signature] = parts.as_slice() else {
            return Err(Malformed);
        };
        if header.is_empty() || payload.is_empty() || signature.is_empty() {
            return Err(Malformed);
        }

        Ok(Self {
            header: (*header).to_string(),
            payload: (*payload).to_string(),
            signature: (*signature).to_string(),
        })
    }
}
