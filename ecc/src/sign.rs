//! # Signing

use std::fmt::Display;
use std::future::Future;

use anyhow::{Result, anyhow};
use ecdsa::signature::{Signer as _, Verifier as _};
use serde::{Deserialize, Serialize};

use crate::core::{PublicKey, SecretKey};

/// Length of a fixed-size (`r || s`) ES256 signature.
pub const SIGNATURE_LENGTH: usize = 64;

/// The signing algorithm used by the signer.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum Algorithm {
    /// ECDSA using the P-256 curve and SHA-256.
    #[default]
    #[serde(rename = "ES256")]
    ES256,
}

impl Algorithm {
    /// The JOSE `alg` identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ES256 => "ES256",
        }
    }

    /// Sign a message with the provided secret key, returning the signature
    /// as fixed-size `r || s` bytes.
    ///
    /// Signing is deterministic (RFC 6979): the same key and message always
    /// yield the same signature.
    ///
    /// # Errors
    /// Will return an error if the secret key is not a valid scalar for the
    /// algorithm's curve.
    pub fn try_sign(&self, msg: &[u8], secret_key: &SecretKey) -> Result<Vec<u8>> {
        match self {
            Self::ES256 => {
                let signing_key = p256::ecdsa::SigningKey::try_from(secret_key)?;
                let signature: p256::ecdsa::Signature = signing_key
                    .try_sign(msg)
                    .map_err(|e| anyhow!("issue signing message: {e}"))?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }

    /// Verify the signature of a signed message.
    ///
    /// # Errors
    /// Will return an error if the signature is invalid or the verifying key is
    /// not correct for the type of algorithm.
    pub fn verify(&self, msg: &[u8], sig: &[u8], public_key: &PublicKey) -> Result<()> {
        match self {
            Self::ES256 => {
                if sig.len() != SIGNATURE_LENGTH {
                    return Err(anyhow!("invalid signature length: {}", sig.len()));
                }
                let verifying_key = p256::ecdsa::VerifyingKey::try_from(*public_key)?;
                let signature = p256::ecdsa::Signature::from_slice(sig)
                    .map_err(|e| anyhow!("unable to build signature: {e}"))?;
                verifying_key
                    .verify(msg, &signature)
                    .map_err(|e| anyhow!("unable to verify signature: {e}"))
            }
        }
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signer is used by implementers to provide signing functionality for token
/// issuance.
pub trait Signer: Send + Sync {
    /// `TrySign` signs the message, returning the raw signature bytes.
    fn try_sign(&self, msg: &[u8]) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// The verifying key (public key) from the signing keypair.
    ///
    /// The possibility of key rotation mean this key should only be referenced
    /// at the point of verifying a signature.
    fn verifying_key(&self) -> impl Future<Output = Result<PublicKey>> + Send;

    /// Signature algorithm used by the signer.
    fn algorithm(&self) -> impl Future<Output = Result<Algorithm>> + Send;
}
