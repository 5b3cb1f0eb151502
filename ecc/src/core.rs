//! # Primitive Cryptography Types

use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use anyhow::{Result, anyhow};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Prefix byte (tag) to indicate an uncompressed SEC1 public key.
pub const TAG_PUBKEY_FULL: u8 = 0x04;

/// Length of a P-256 secret scalar and of each public key coordinate.
pub const COORDINATE_LENGTH: usize = 32;

/// Length of an uncompressed SEC1 encoded P-256 public key.
pub const PUBLIC_KEY_LENGTH: usize = 1 + 2 * COORDINATE_LENGTH;

/// Cryptographic curve type.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub enum Curve {
    /// secp256r1 (NIST P-256) curve.
    #[default]
    #[serde(rename = "P-256", alias = "secp256r1")]
    P256,
}

impl Curve {
    /// Generate a new secret key for the curve.
    #[must_use]
    pub fn generate(&self) -> SecretKey {
        match self {
            Self::P256 => {
                let secret_key = p256::SecretKey::random(&mut OsRng);
                let mut bytes = [0; COORDINATE_LENGTH];
                bytes.copy_from_slice(&secret_key.to_bytes());
                SecretKey(bytes)
            }
        }
    }
}

impl Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::P256 => write!(f, "P-256"),
        }
    }
}

/// A secret key used to sign a payload.
///
/// The key material is wiped when the key is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; COORDINATE_LENGTH]);

impl SecretKey {
    /// Return the secret key as a byte slice.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; COORDINATE_LENGTH] {
        &self.0
    }

    /// Return the secret key as a byte array.
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; COORDINATE_LENGTH] {
        self.0
    }

    /// Derive the public key for this secret key.
    ///
    /// # Errors
    /// Returns an error if the bytes are not a valid P-256 scalar.
    pub fn public_key(&self) -> Result<PublicKey> {
        let signing_key = p256::ecdsa::SigningKey::try_from(self)?;
        Ok(PublicKey::from(signing_key.verifying_key()))
    }
}

impl Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

impl From<[u8; COORDINATE_LENGTH]> for SecretKey {
    fn from(val: [u8; COORDINATE_LENGTH]) -> Self {
        Self(val)
    }
}

impl TryFrom<&[u8]> for SecretKey {
    type Error = anyhow::Error;

    fn try_from(val: &[u8]) -> Result<Self> {
        if val.len() != COORDINATE_LENGTH {
            return Err(anyhow!("invalid secret key length"));
        }

        let mut buf = [0; COORDINATE_LENGTH];
        buf.copy_from_slice(val);
        Ok(Self(buf))
    }
}

impl TryFrom<Vec<u8>> for SecretKey {
    type Error = anyhow::Error;

    fn try_from(mut val: Vec<u8>) -> Result<Self> {
        let key = Self::try_from(val.as_slice());
        val.zeroize();
        key
    }
}

impl FromStr for SecretKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = Base64UrlUnpadded::decode_vec(s)
            .map_err(|e| anyhow!("issue decoding secret key: {e}"))?;
        Self::try_from(decoded)
    }
}

impl TryFrom<&SecretKey> for p256::ecdsa::SigningKey {
    type Error = anyhow::Error;

    fn try_from(key: &SecretKey) -> Result<Self, Self::Error> {
        Self::from_slice(&key.0).map_err(|e| anyhow!("issue parsing secret key: {e}"))
    }
}

/// The public key of a P-256 key pair, held as affine coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey {
    x: [u8; COORDINATE_LENGTH],
    y: [u8; COORDINATE_LENGTH],
}

impl PublicKey {
    /// Return the public key as uncompressed SEC1 bytes.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut key = [0; PUBLIC_KEY_LENGTH];
        key[0] = TAG_PUBKEY_FULL;
        key[1..=COORDINATE_LENGTH].copy_from_slice(&self.x);
        key[COORDINATE_LENGTH + 1..].copy_from_slice(&self.y);
        key.to_vec()
    }

    /// The affine x coordinate.
    #[must_use]
    pub const fn x(&self) -> &[u8; COORDINATE_LENGTH] {
        &self.x
    }

    /// The affine y coordinate.
    #[must_use]
    pub const fn y(&self) -> &[u8; COORDINATE_LENGTH] {
        &self.y
    }

    /// Parse a public key from uncompressed SEC1 bytes.
    ///
    /// # Errors
    /// Returns an error if the slice is not a 65-byte uncompressed key.
    pub fn from_slice(val: &[u8]) -> Result<Self> {
        Self::try_from(val)
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = anyhow::Error;

    fn try_from(val: &[u8]) -> Result<Self> {
        if val.len() != PUBLIC_KEY_LENGTH || val[0] != TAG_PUBKEY_FULL {
            return Err(anyhow!("invalid public key length"));
        }
        Self::try_from((&val[1..=COORDINATE_LENGTH], &val[COORDINATE_LENGTH + 1..]))
    }
}

impl TryFrom<(&[u8], &[u8])> for PublicKey {
    type Error = anyhow::Error;

    fn try_from(val: (&[u8], &[u8])) -> Result<Self> {
        if val.0.len() != COORDINATE_LENGTH || val.1.len() != COORDINATE_LENGTH {
            return Err(anyhow!("invalid public key length"));
        }

        let mut x = [0; COORDINATE_LENGTH];
        let mut y = [0; COORDINATE_LENGTH];
        x.copy_from_slice(val.0);
        y.copy_from_slice(val.1);
        Ok(Self { x, y })
    }
}

impl From<&p256::ecdsa::VerifyingKey> for PublicKey {
    fn from(val: &p256::ecdsa::VerifyingKey) -> Self {
        let point = val.to_encoded_point(false);
        let mut x = [0; COORDINATE_LENGTH];
        let mut y = [0; COORDINATE_LENGTH];
        x.copy_from_slice(&point.as_bytes()[1..=COORDINATE_LENGTH]);
        y.copy_from_slice(&point.as_bytes()[COORDINATE_LENGTH + 1..]);
        Self { x, y }
    }
}

impl TryFrom<PublicKey> for p256::ecdsa::VerifyingKey {
    type Error = anyhow::Error;

    fn try_from(val: PublicKey) -> Result<Self> {
        Self::from_sec1_bytes(&val.to_vec())
            .map_err(|e| anyhow!("unable to build verifying key: {e}"))
    }
}
