//! Fixed-layout multi-algorithm credential record.
//!
//! The on-disk credential is a single binary record with named byte ranges
//! at cumulative constant offsets:
//!
//! | field            | offset | length |
//! |------------------|--------|--------|
//! | NT hash          | 0      | 16     |
//! | LM hash          | 16     | 16     |
//! | secure SHA-1     | 32     | 20     |
//! | CRAM-MD5 keys    | 52     | 32     |
//! | salted SHA-1     | 84     | 24     |
//! | recoverable pw   | 108    | 512    |
//!
//! Older nodes wrote only the first three fields (52 bytes). That legacy
//! length is recognized, never rejected, and upgraded in place after the
//! next successful verification. Whether a trailing field is *present* is
//! decided purely by record length; whether it is *usable* is decided by
//! [`CredentialBlob::populated_mask`] - an all-zero field is never a valid
//! comparison target.

use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::mask::AlgorithmMask;

/// Offset of the NT hash.
pub const NT_OFFSET: usize = 0;
/// Length of the NT hash.
pub const NT_LEN: usize = 16;
/// Offset of the LAN Manager hash.
pub const LM_OFFSET: usize = NT_OFFSET + NT_LEN;
/// Length of the LAN Manager hash.
pub const LM_LEN: usize = 16;
/// Offset of the unsalted SHA-1 hash.
pub const SECURE_OFFSET: usize = LM_OFFSET + LM_LEN;
/// Length of the unsalted SHA-1 hash.
pub const SECURE_LEN: usize = 20;
/// Offset of the CRAM-MD5 key material.
pub const CRAM_OFFSET: usize = SECURE_OFFSET + SECURE_LEN;
/// Length of the CRAM-MD5 key material (two 16-byte interim digests).
pub const CRAM_LEN: usize = 32;
/// Offset of the salted SHA-1 field.
pub const SALTED_OFFSET: usize = CRAM_OFFSET + CRAM_LEN;
/// Length of the salted SHA-1 field (4-byte salt + 20-byte digest).
pub const SALTED_LEN: usize = 24;
/// Offset of the recoverable password field.
pub const RECOVERABLE_OFFSET: usize = SALTED_OFFSET + SALTED_LEN;
/// Length of the recoverable password field.
pub const RECOVERABLE_LEN: usize = 512;

/// Length of the current on-disk record.
pub const CURRENT_LEN: usize = RECOVERABLE_OFFSET + RECOVERABLE_LEN;
/// Length of the historical NT+LM+secure record.
pub const LEGACY_LEN: usize = CRAM_OFFSET;

/// A credential record at either the current or the legacy length.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBlob {
    bytes: Vec<u8>,
}

impl CredentialBlob {
    /// Creates an all-zero record at the current length.
    #[must_use]
    pub fn zeroed() -> Self {
        Self {
            bytes: vec![0u8; CURRENT_LEN],
        }
    }

    /// Wraps raw record bytes.
    ///
    /// Exactly the two known lengths are accepted; anything else is a
    /// corrupt record, not a third version.
    ///
    /// ## Errors
    ///
    /// Returns [`CryptoError::Malformed`] for any other length.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.len() != CURRENT_LEN && bytes.len() != LEGACY_LEN {
            return Err(CryptoError::Malformed {
                context: "credential record",
                expected: CURRENT_LEN,
                got: bytes.len(),
            });
        }
        Ok(Self { bytes })
    }

    /// The raw record bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Record length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the record is empty (never the case for a valid record).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True for the historical 52-byte NT+LM+secure record.
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.bytes.len() == LEGACY_LEN
    }

    fn field(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.bytes.get(offset..offset + len)
    }

    fn field_mut(&mut self, offset: usize, len: usize) -> Option<&mut [u8]> {
        self.bytes.get_mut(offset..offset + len)
    }

    /// NT hash bytes.
    #[must_use]
    pub fn nt(&self) -> &[u8] {
        // Present at both lengths.
        &self.bytes[NT_OFFSET..NT_OFFSET + NT_LEN]
    }

    /// LAN Manager hash bytes.
    #[must_use]
    pub fn lm(&self) -> &[u8] {
        &self.bytes[LM_OFFSET..LM_OFFSET + LM_LEN]
    }

    /// Unsalted SHA-1 hash bytes.
    #[must_use]
    pub fn secure(&self) -> &[u8] {
        &self.bytes[SECURE_OFFSET..SECURE_OFFSET + SECURE_LEN]
    }

    /// CRAM-MD5 key material, absent on legacy records.
    #[must_use]
    pub fn cram(&self) -> Option<&[u8]> {
        self.field(CRAM_OFFSET, CRAM_LEN)
    }

    /// Salted SHA-1 field (salt + digest), absent on legacy records.
    #[must_use]
    pub fn salted_sha1(&self) -> Option<&[u8]> {
        self.field(SALTED_OFFSET, SALTED_LEN)
    }

    /// The 4-byte salt of the salted SHA-1 field, if populated.
    #[must_use]
    pub fn salted_sha1_salt(&self) -> Option<[u8; 4]> {
        let field = self.salted_sha1()?;
        if field.iter().all(|&b| b == 0) {
            return None;
        }
        let mut salt = [0u8; 4];
        salt.copy_from_slice(&field[..4]);
        Some(salt)
    }

    /// Recoverable password field, absent on legacy records.
    #[must_use]
    pub fn recoverable(&self) -> Option<&[u8]> {
        self.field(RECOVERABLE_OFFSET, RECOVERABLE_LEN)
    }

    /// Writes the NT hash.
    pub fn set_nt(&mut self, nt: &[u8; NT_LEN]) {
        self.bytes[NT_OFFSET..NT_OFFSET + NT_LEN].copy_from_slice(nt);
    }

    /// Writes the LAN Manager hash.
    pub fn set_lm(&mut self, lm: &[u8; LM_LEN]) {
        self.bytes[LM_OFFSET..LM_OFFSET + LM_LEN].copy_from_slice(lm);
    }

    /// Writes the unsalted SHA-1 hash.
    pub fn set_secure(&mut self, secure: &[u8; SECURE_LEN]) {
        self.bytes[SECURE_OFFSET..SECURE_OFFSET + SECURE_LEN].copy_from_slice(secure);
    }

    /// Writes the CRAM-MD5 key material. No-op on legacy records.
    pub fn set_cram(&mut self, cram: &[u8; CRAM_LEN]) {
        if let Some(field) = self.field_mut(CRAM_OFFSET, CRAM_LEN) {
            field.copy_from_slice(cram);
        }
    }

    /// Writes the salted SHA-1 field. No-op on legacy records.
    pub fn set_salted_sha1(&mut self, salted: &[u8; SALTED_LEN]) {
        if let Some(field) = self.field_mut(SALTED_OFFSET, SALTED_LEN) {
            field.copy_from_slice(salted);
        }
    }

    /// Writes the recoverable password field. No-op on legacy records.
    pub fn set_recoverable(&mut self, recoverable: &[u8; RECOVERABLE_LEN]) {
        if let Some(field) = self.field_mut(RECOVERABLE_OFFSET, RECOVERABLE_LEN) {
            field.copy_from_slice(recoverable);
        }
    }

    /// The set of algorithms whose fields are actually populated.
    ///
    /// A field that is missing (legacy length) or all zero is excluded;
    /// comparing against such a field would accept any candidate that also
    /// computed zeros, so it must never be selected.
    #[must_use]
    pub fn populated_mask(&self) -> AlgorithmMask {
        let mut mask = AlgorithmMask::empty();
        let nonzero = |bytes: &[u8]| bytes.iter().any(|&b| b != 0);
        if nonzero(self.nt()) {
            mask = mask.union(AlgorithmMask::NT);
        }
        if nonzero(self.lm()) {
            mask = mask.union(AlgorithmMask::LM);
        }
        if nonzero(self.secure()) {
            mask = mask.union(AlgorithmMask::SECURE);
        }
        if self.cram().is_some_and(nonzero) {
            mask = mask.union(AlgorithmMask::CRAM_MD5);
        }
        if self.salted_sha1().is_some_and(nonzero) {
            mask = mask.union(AlgorithmMask::SALTED_SHA1);
        }
        if self.recoverable().is_some_and(nonzero) {
            mask = mask.union(AlgorithmMask::RECOVERABLE);
        }
        mask
    }

    /// Returns a copy truncated or zero-extended to the other record's
    /// length class, so two records can be compared over equal lengths.
    #[must_use]
    pub fn normalized_to(&self, len: usize) -> Self {
        let mut bytes = self.bytes.clone();
        bytes.resize(len, 0);
        Self { bytes }
    }

    /// Returns a copy with every field outside `mask` zeroed.
    #[must_use]
    pub fn restricted_to(&self, mask: AlgorithmMask) -> Self {
        let mut out = self.clone();
        if !mask.contains(AlgorithmMask::NT) {
            out.set_nt(&[0u8; NT_LEN]);
        }
        if !mask.contains(AlgorithmMask::LM) {
            out.set_lm(&[0u8; LM_LEN]);
        }
        if !mask.contains(AlgorithmMask::SECURE) {
            out.set_secure(&[0u8; SECURE_LEN]);
        }
        if !mask.contains(AlgorithmMask::CRAM_MD5) {
            out.set_cram(&[0u8; CRAM_LEN]);
        }
        if !mask.contains(AlgorithmMask::SALTED_SHA1) {
            out.set_salted_sha1(&[0u8; SALTED_LEN]);
        }
        if !mask.contains(AlgorithmMask::RECOVERABLE) {
            out.set_recoverable(&[0u8; RECOVERABLE_LEN]);
        }
        out
    }
}

impl Drop for CredentialBlob {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for CredentialBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Hash material stays out of logs.
        f.debug_struct("CredentialBlob")
            .field("len", &self.bytes.len())
            .field("legacy", &self.is_legacy())
            .finish()
    }
}
