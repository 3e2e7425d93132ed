//! # Field Values and On-Chain Primitives
//!
//! Signer commitments, nullifiers and transaction hashes are 256-bit
//! integers. Circuits tend to print them in decimal while chains print
//! them in hex, so every 32-byte value here parses from either form and
//! always renders as `0x`-prefixed, zero-padded lowercase hex.
//!
//! The types are deliberately distinct: a `Nullifier` cannot be passed
//! where a `Commitment` is expected even though both are 32 bytes.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseError;

/// Parse a 256-bit big-endian word from `0x` hex (at most 64 digits,
/// left-padded) or from a decimal integer.
pub(crate) fn parse_word(s: &str) -> Result<[u8; 32], ParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ParseError::Empty("value"));
    }
    if let Some(raw) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if raw.is_empty() {
            return Err(ParseError::Empty("hex value"));
        }
        if raw.len() > 64 {
            return Err(ParseError::Length {
                expected: 32,
                actual: raw.len().div_ceil(2),
            });
        }
        let padded = format!("{raw:0>64}");
        let mut out = [0u8; 32];
        hex::decode_to_slice(&padded, &mut out).map_err(|e| ParseError::Hex(e.to_string()))?;
        return Ok(out);
    }
    parse_decimal_word(s)
}

fn parse_decimal_word(s: &str) -> Result<[u8; 32], ParseError> {
    let mut out = [0u8; 32];
    for ch in s.chars() {
        let digit = ch
            .to_digit(10)
            .ok_or_else(|| ParseError::Decimal(s.to_string()))?;
        // out = out * 10 + digit, big-endian.
        let mut carry = digit;
        for byte in out.iter_mut().rev() {
            let v = u32::from(*byte) * 10 + carry;
            *byte = (v & 0xff) as u8;
            carry = v >> 8;
        }
        if carry != 0 {
            return Err(ParseError::Overflow);
        }
    }
    Ok(out)
}

macro_rules! word_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name([u8; 32]);

        impl $name {
            /// The all-zero value.
            pub const ZERO: Self = Self([0u8; 32]);

            /// Wrap raw big-endian bytes.
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Widen a `u64` into a 256-bit value.
            pub fn from_u64(value: u64) -> Self {
                let mut bytes = [0u8; 32];
                bytes[24..].copy_from_slice(&value.to_be_bytes());
                Self(bytes)
            }

            /// Borrow the big-endian bytes.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Copy out the big-endian bytes.
            pub fn to_bytes(self) -> [u8; 32] {
                self.0
            }

            /// Whether every byte is zero.
            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }

            /// Render as `0x` + 64 lowercase hex digits.
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_word(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
}

word_newtype!(
    /// Opaque identifier of a signer, derived from the signer's private
    /// secret. Does not reveal the signer's address.
    Commitment
);

word_newtype!(
    /// Per-(signer, transaction) value proving that a given secret already
    /// voted on a given transaction, without revealing which secret.
    Nullifier
);

word_newtype!(
    /// Hash of a submitted on-chain transaction.
    TxHash
);

word_newtype!(
    /// Generic 32-byte hash: Merkle roots, tree nodes, aggregation paths.
    Hash32
);

// ─── Address ─────────────────────────────────────────────────────────

/// A 20-byte EVM account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Wrap raw bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Whether this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Render as `0x` + 40 lowercase hex digits.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = ParseError;

    /// Strict: requires exactly 40 hex digits. Mixed-case checksums are
    /// accepted but not verified.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let raw = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if raw.len() != 40 {
            return Err(ParseError::Length {
                expected: 20,
                actual: raw.len() / 2,
            });
        }
        let mut out = [0u8; 20];
        hex::decode_to_slice(raw, &mut out).map_err(|e| ParseError::Hex(e.to_string()))?;
        Ok(Self(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ─── CallData ────────────────────────────────────────────────────────

/// Arbitrary calldata attached to an on-chain call.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct CallData(Vec<u8>);

impl CallData {
    /// Wrap raw bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there is no calldata.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render as `0x`-prefixed hex (`0x` when empty).
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

impl From<Vec<u8>> for CallData {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl FromStr for CallData {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let raw = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        hex::decode(raw)
            .map(Self)
            .map_err(|e| ParseError::Hex(e.to_string()))
    }
}

impl fmt::Debug for CallData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallData({})", self.to_hex())
    }
}

impl Serialize for CallData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CallData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
