//! # Minimal Ethereum ABI Encoder
//!
//! Just enough of the contract ABI to build calldata for the multisig
//! wallet: static words, `bytes`, dynamic arrays and tuples, with the
//! standard head/tail layout. Decoding is not needed; the coordinator only
//! ever writes calls.

use crate::field::Address;
use crate::hash::keccak256;

/// A value to be ABI-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `address`, left-padded to 32 bytes.
    Address(Address),
    /// Any `uintN`, given as a big-endian 32-byte word.
    Uint([u8; 32]),
    /// `bool`.
    Bool(bool),
    /// `bytes32`.
    FixedBytes32([u8; 32]),
    /// Dynamic `bytes`.
    Bytes(Vec<u8>),
    /// Dynamic array `T[]`.
    Array(Vec<Token>),
    /// Tuple `(T1, T2, ...)`.
    Tuple(Vec<Token>),
}

impl Token {
    /// `uint` token from a `u128`.
    pub fn uint(value: u128) -> Self {
        let mut word = [0u8; 32];
        word[16..].copy_from_slice(&value.to_be_bytes());
        Token::Uint(word)
    }

    fn is_dynamic(&self) -> bool {
        match self {
            Token::Bytes(_) | Token::Array(_) => true,
            Token::Tuple(items) => items.iter().any(Token::is_dynamic),
            _ => false,
        }
    }

    /// Bytes this token occupies in the head section of its enclosing tuple.
    fn head_len(&self) -> usize {
        match self {
            _ if self.is_dynamic() => 32,
            Token::Tuple(items) => items.iter().map(Token::head_len).sum(),
            _ => 32,
        }
    }
}

/// The 4-byte function selector for a canonical signature such as
/// `transfer(address,uint256)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encode `tokens` as a tuple (the argument list of a call).
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let heads_len: usize = tokens.iter().map(Token::head_len).sum();
    let mut head = Vec::with_capacity(heads_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&usize_word(heads_len + tail.len()));
            tail.extend_from_slice(&encode_dynamic(token));
        } else {
            encode_static(token, &mut head);
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// Selector followed by the encoded arguments.
pub fn encode_call(signature: &str, tokens: &[Token]) -> Vec<u8> {
    let mut out = selector(signature).to_vec();
    out.extend_from_slice(&encode(tokens));
    out
}

fn encode_static(token: &Token, out: &mut Vec<u8>) {
    match token {
        Token::Address(addr) => {
            out.extend_from_slice(&[0u8; 12]);
            out.extend_from_slice(addr.as_bytes());
        }
        Token::Uint(word) | Token::FixedBytes32(word) => out.extend_from_slice(word),
        Token::Bool(b) => out.extend_from_slice(&usize_word(usize::from(*b))),
        Token::Tuple(items) => {
            for item in items {
                encode_static(item, out);
            }
        }
        // Dynamic tokens never reach here; `encode` routes them to the tail.
        Token::Bytes(_) | Token::Array(_) => {}
    }
}

fn encode_dynamic(token: &Token) -> Vec<u8> {
    match token {
        Token::Bytes(bytes) => {
            let mut out = usize_word(bytes.len()).to_vec();
            out.extend_from_slice(bytes);
            let rem = bytes.len() % 32;
            if rem != 0 {
                out.resize(out.len() + 32 - rem, 0);
            }
            out
        }
        Token::Array(items) => {
            let mut out = usize_word(items.len()).to_vec();
            out.extend_from_slice(&encode(items));
            out
        }
        Token::Tuple(items) => encode(items),
        _ => {
            let mut out = Vec::with_capacity(32);
            encode_static(token, &mut out);
            out
        }
    }
}

fn usize_word(value: usize) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&(value as u64).to_be_bytes());
    word
}
