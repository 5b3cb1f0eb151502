//! Key management

use anyhow::Result;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::{Curve, PublicKey, SecretKey};
use crate::sign::{Algorithm, Signer};

/// An in-memory signing key pair.
#[derive(Clone, Debug, Zeroize, ZeroizeOnDrop)]
pub struct Keypair {
    #[zeroize(skip)]
    curve: Curve,
    secret_key: SecretKey,
}

impl Keypair {
    /// Generate a fresh key pair on the given curve.
    #[must_use]
    pub fn generate(curve: Curve) -> Self {
        Self {
            secret_key: curve.generate(),
            curve,
        }
    }

    /// Wrap an existing secret key.
    #[must_use]
    pub fn from_secret(curve: Curve, secret_key: SecretKey) -> Self {
        Self { curve, secret_key }
    }

    /// The curve the key pair belongs to.
    #[must_use]
    pub const fn curve(&self) -> &Curve {
        &self.curve
    }

    /// The secret half of the key pair.
    #[must_use]
    pub const fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// The public half of the key pair.
    ///
    /// # Errors
    /// Returns an error if the secret key is not a valid scalar.
    pub fn public_key(&self) -> Result<PublicKey> {
        self.secret_key.public_key()
    }

    const fn signing_algorithm(&self) -> Algorithm {
        match self.curve {
            Curve::P256 => Algorithm::ES256,
        }
    }
}

impl Signer for Keypair {
    async fn try_sign(&self, msg: &[u8]) -> Result<Vec<u8>> {
        self.signing_algorithm().try_sign(msg, &self.secret_key)
    }

    async fn verifying_key(&self) -> Result<PublicKey> {
        self.public_key()
    }

    async fn algorithm(&self) -> Result<Algorithm> {
        Ok(self.signing_algorithm())
    }
}
