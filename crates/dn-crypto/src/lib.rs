//! # dn-crypto
//!
//! Credential blob layout and hash derivations for the dirnode password
//! engine.
//!
//! **WARNING**: nearly everything in this crate is built on algorithms that
//! are broken by modern standards (MD4, MD5, SHA-1, single DES, a fixed-key
//! reversible cipher). They are preserved solely for wire and on-disk
//! compatibility with the protocols that require them: NTLM, MSCHAPv2,
//! CRAM-MD5, APOP, DIGEST-MD5 and PPTP key derivation. Do not reach for
//! this crate for anything new.
//!
//! ## Layout
//!
//! - [`blob`] - the fixed-offset multi-algorithm credential record
//! - [`mask`] - the per-record hash-algorithm allow-list
//! - [`hashes`] - password to hash-set generation and comparison
//! - one module per challenge/response protocol

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod apop;
pub mod blob;
pub mod cram;
pub mod digest_md5;
pub mod error;
pub mod hashes;
pub mod mask;
pub mod mppe;
pub mod mschap;
pub mod netlogon;
pub mod ntlm;

pub use blob::CredentialBlob;
pub use error::CryptoError;
pub use hashes::{generate_hashes, hashes_equal};
pub use mask::AlgorithmMask;
