//! Signer secrets and the values derived from them.
//!
//! - commitment = `keccak256(secret)`
//! - nullifier  = `keccak256(secret || tx_hash)`
//!
//! The coordinator never sees a secret in normal operation; these helpers
//! exist for provisioning tooling and tests, and they must agree with the
//! circuit.

use std::str::FromStr;

use rand_core::{OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use zkms_core::hash::{keccak256, keccak256_concat};
use zkms_core::{Commitment, Hash32, Nullifier, ParseError};

/// A signer's private secret. Zeroized on drop; `Debug` never prints it.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SignerSecret([u8; 32]);

impl SignerSecret {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Fresh secret from the operating system RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn expose_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for SignerSecret {
    type Err = ParseError;

    /// Accepts the same hex or decimal forms as other 256-bit values.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let word: Hash32 = s.parse()?;
        Ok(Self(word.to_bytes()))
    }
}

impl std::fmt::Debug for SignerSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SignerSecret([REDACTED])")
    }
}

/// The public commitment registered in the wallet for this secret.
pub fn commitment_from_secret(secret: &SignerSecret) -> Commitment {
    Commitment::from_bytes(keccak256(secret.0))
}

/// The nullifier this secret produces when voting on `tx_hash`.
///
/// Deterministic: the same signer voting twice on one transaction yields
/// the same value, which is what the store's uniqueness constraint keys on.
pub fn derive_nullifier(secret: &SignerSecret, tx_hash: &Hash32) -> Nullifier {
    Nullifier::from_bytes(keccak256_concat(&[&secret.0[..], &tx_hash.as_bytes()[..]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullifier_is_deterministic_per_signer_and_transaction() {
        let secret = SignerSecret::from_bytes([7; 32]);
        let tx_a = Hash32::from_u64(1);
        let tx_b = Hash32::from_u64(2);
        assert_eq!(derive_nullifier(&secret, &tx_a), derive_nullifier(&secret, &tx_a));
        assert_ne!(derive_nullifier(&secret, &tx_a), derive_nullifier(&secret, &tx_b));

        let other = SignerSecret::from_bytes([8; 32]);
        assert_ne!(derive_nullifier(&secret, &tx_a), derive_nullifier(&other, &tx_a));
    }

    #[test]
    fn commitment_hides_secret() {
        let secret = SignerSecret::from_bytes([1; 32]);
        let c = commitment_from_secret(&secret);
        assert_ne!(c.as_bytes(), secret.expose_bytes());
        assert_eq!(c, commitment_from_secret(&secret.clone()));
    }

    #[test]
    fn generated_secrets_differ() {
        let a = SignerSecret::generate();
        let b = SignerSecret::generate();
        assert_ne!(a.expose_bytes(), b.expose_bytes());
    }

    #[test]
    fn parses_decimal_and_hex() {
        let a: SignerSecret = "42".parse().unwrap();
        let b: SignerSecret = "0x2a".parse().unwrap();
        assert_eq!(a.expose_bytes(), b.expose_bytes());
    }

    #[test]
    fn debug_is_redacted() {
        let secret = SignerSecret::from_bytes([0xab; 32]);
        let shown = format!("{secret:?}");
        assert!(!shown.contains("ab"));
        assert!(shown.contains("REDACTED"));
    }
}
