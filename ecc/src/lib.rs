//! # Elliptic Curve Cryptography (ECC) Utilities
//!
//! P-256 key material and the ES256 signing and verification primitives used
//! by `keyset-jose`. Not intended to be used directly.

mod core;
mod keypair;
mod sign;

pub use self::core::*;
pub use self::keypair::*;
pub use self::sign::*;
