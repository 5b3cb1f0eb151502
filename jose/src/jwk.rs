//! # JSON Web Key (JWK)
//!
//! Key material exchanged as JWK ([RFC7517]). The verification pipeline only
//! interprets `kid` when selecting a key; the cryptographic members are
//! handed to the `keyset-ecc` primitives.
//!
//! [RFC7517]: https://www.rfc-editor.org/rfc/rfc7517

use anyhow::{Result, anyhow, bail};
use base64ct::{Base64UrlUnpadded, Encoding};
use keyset_ecc::{Algorithm, Curve, Keypair, PublicKey, SecretKey, Signer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JWK `kty` for elliptic curve keys.
pub const KEY_TYPE_EC: &str = "EC";

/// JWK `crv` for the P-256 curve.
pub const CURVE_P256: &str = "P-256";

/// A JSON Web Key.
///
/// Members this crate does not model are kept in `extras` so keys survive a
/// round trip unchanged.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    /// Key type.
    pub kty: String,

    /// Curve name for elliptic curve keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// Base64url-encoded x coordinate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// Base64url-encoded y coordinate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// Base64url-encoded private scalar. Only present on private keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,

    /// Key identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Intended use of the key (`sig`).
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,

    /// Permitted operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_ops: Option<Vec<String>>,

    /// Any other members.
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl Jwk {
    /// Build a public JWK from a P-256 public key.
    #[must_use]
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self {
            kty: KEY_TYPE_EC.to_string(),
            crv: Some(CURVE_P256.to_string()),
            x: Some(Base64UrlUnpadded::encode_string(public_key.x())),
            y: Some(Base64UrlUnpadded::encode_string(public_key.y())),
            ..Self::default()
        }
    }

    /// Build a private JWK from a P-256 key pair.
    ///
    /// # Errors
    /// Returns an error if the public key cannot be derived from the secret.
    pub fn from_keypair(keypair: &Keypair) -> Result<Self> {
        let mut jwk = Self::from_public_key(&keypair.public_key()?);
        jwk.d = Some(Base64UrlUnpadded::encode_string(keypair.secret_key().as_bytes()));
        Ok(jwk)
    }

    /// Set the key identifier.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// A copy of this key with private material removed.
    #[must_use]
    pub fn to_public(&self) -> Self {
        Self {
            d: None,
            ..self.clone()
        }
    }

    /// Whether the key carries private material.
    #[must_use]
    pub const fn is_private(&self) -> bool {
        self.d.is_some()
    }

    /// The P-256 public key described by this JWK.
    ///
    /// # Errors
    /// Returns an error if the key is not an EC P-256 key or its coordinates
    /// are missing or malformed.
    pub fn verifying_key(&self) -> Result<PublicKey> {
        self.check_p256()?;

        let x = self.x.as_ref().ok_or_else(|| anyhow!("JWK 'x' is missing"))?;
        let y = self.y.as_ref().ok_or_else(|| anyhow!("JWK 'y' is missing"))?;
        let x = Base64UrlUnpadded::decode_vec(x)
            .map_err(|e| anyhow!("unable to base64 decode JWK 'x': {e}"))?;
        let y = Base64UrlUnpadded::decode_vec(y)
            .map_err(|e| anyhow!("unable to base64 decode JWK 'y': {e}"))?;

        PublicKey::try_from((x.as_slice(), y.as_slice()))
    }

    /// The P-256 secret key described by this JWK.
    ///
    /// # Errors
    /// Returns an error if the key is not an EC P-256 key or `d` is missing or
    /// malformed.
    pub fn secret_key(&self) -> Result<SecretKey> {
        self.check_p256()?;
        let Some(d) = &self.d else {
            bail!("JWK 'd' is missing: not a private key");
        };
        d.parse()
    }

    /// Verify an ES256 signature over `msg` with this key.
    ///
    /// # Errors
    /// Returns an error if the key is unusable or the signature is invalid.
    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> Result<()> {
        Algorithm::ES256.verify(msg, sig, &self.verifying_key()?)
    }

    fn check_p256(&self) -> Result<()> {
        if self.kty != KEY_TYPE_EC {
            bail!("unsupported key type: {}", self.kty);
        }
        match self.crv.as_deref() {
            Some(CURVE_P256) => Ok(()),
            Some(crv) => bail!("unsupported curve: {crv}"),
            None => bail!("JWK 'crv' is missing"),
        }
    }
}

impl Signer for Jwk {
    async fn try_sign(&self, msg: &[u8]) -> Result<Vec<u8>> {
        Algorithm::ES256.try_sign(msg, &self.secret_key()?)
    }

    async fn verifying_key(&self) -> Result<PublicKey> {
        Self::verifying_key(self)
    }

    async fn algorithm(&self) -> Result<Algorithm> {
        Ok(Algorithm::ES256)
    }
}

/// A JSON Web Key Set document.
///
/// Entries are kept as raw JSON and only the selected key is interpreted, so
/// one entry this crate cannot parse does not hide the others.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwks {
    /// The published keys. Treated as empty when absent.
    #[serde(default)]
    pub keys: Vec<Value>,
}

impl Jwks {
    /// Find the first entry whose `kid` is the string `kid` and parse it.
    ///
    /// Returns `None` when no entry matches. Entries that are not objects, or
    /// whose `kid` is missing or not a string, are skipped.
    ///
    /// # Errors
    /// The inner result is an error if the matching entry is not a valid JWK.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<Result<Jwk>> {
        let entry =
            self.keys.iter().find(|key| key.get("kid").and_then(Value::as_str) == Some(kid))?;
        Some(
            serde_json::from_value(entry.clone())
                .map_err(|e| anyhow!("invalid JWK for kid `{kid}`: {e}")),
        )
    }
}

impl From<Vec<Jwk>> for Jwks {
    fn from(keys: Vec<Jwk>) -> Self {
        Self {
            keys: keys.iter().filter_map(|k| serde_json::to_value(k).ok()).collect(),
        }
    }
}

/// A freshly generated private/public JWK pair sharing one `kid`.
#[derive(Clone, Debug)]
pub struct Keyset {
    /// Private key, including `d`. Used for signing.
    pub private_jwk: Jwk,

    /// Public key, safe to publish in a JWKS.
    pub public_jwk: Jwk,
}

impl Keyset {
    /// Generate a new P-256 key pair tagged with `kid`.
    ///
    /// # Errors
    /// Returns an error if the generated key cannot be encoded.
    pub fn generate(kid: impl Into<String>) -> Result<Self> {
        let keypair = Keypair::generate(Curve::P256);
        let private_jwk = Jwk::from_keypair(&keypair)?.with_kid(kid);
        let public_jwk = private_jwk.to_public();
        Ok(Self {
            private_jwk,
            public_jwk,
        })
    }

    /// A JWKS publishing only this key set's public key.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        Jwks::from(vec![self.public_jwk.clone()])
    }
}
