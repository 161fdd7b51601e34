//! Cryptographic primitives for hyperbeat.
//!
//! Provides domain-separated BLAKE3 hashing for blocks and Ed25519
//! signing/verification for tree root records.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod hasher;
pub mod signer;

pub use hasher::ContentHasher;
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
