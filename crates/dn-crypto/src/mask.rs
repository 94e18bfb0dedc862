//! Per-record hash-algorithm allow-list.
//!
//! Records carry their allow-list as a `HASHLIST:<token,...>` string in the
//! ShadowHash authority data; the node default is a plain token list in the
//! configuration. A bare legacy literal (`LEGACY`) from older nodes is still
//! recognized: it forces NT on and LAN Manager off.

use std::fmt;

use crate::error::CryptoError;

/// Bitset of enabled hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlgorithmMask(u8);

impl AlgorithmMask {
    /// NT hash (MD4 over UTF-16LE).
    pub const NT: Self = Self(1 << 0);
    /// LAN Manager hash.
    pub const LM: Self = Self(1 << 1);
    /// Unsalted SHA-1 ("secure") hash.
    pub const SECURE: Self = Self(1 << 2);
    /// Salted SHA-1 hash.
    pub const SALTED_SHA1: Self = Self(1 << 3);
    /// CRAM-MD5 key material.
    pub const CRAM_MD5: Self = Self(1 << 4);
    /// Reversibly-obfuscated recoverable password.
    pub const RECOVERABLE: Self = Self(1 << 5);

    /// The empty mask.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Union of two masks.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Intersection of two masks.
    #[must_use]
    pub const fn intersect(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Removes `other`'s bits from this mask.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// True if every bit of `other` is enabled here.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if no algorithm is enabled.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Parses a single allow-list token.
    ///
    /// ## Errors
    ///
    /// Returns [`CryptoError::UnknownToken`] for unrecognized tokens.
    pub fn parse_token(token: &str) -> Result<Self, CryptoError> {
        Ok(match token {
            "SMB-NT" => Self::NT,
            "SMB-LAN-MANAGER" => Self::LM,
            "SECURE" => Self::SECURE,
            "SALTED-SHA1" => Self::SALTED_SHA1,
            "CRAM-MD5" => Self::CRAM_MD5,
            "RECOVERABLE" => Self::RECOVERABLE,
            _ => return Err(CryptoError::UnknownToken(token.to_string())),
        })
    }

    /// Parses a `HASHLIST:<token,...>` string, or the bare legacy literal.
    ///
    /// The legacy literal `LEGACY` (written by nodes predating the hash-list
    /// syntax) forces NT on and LAN Manager off.
    ///
    /// ## Errors
    ///
    /// Returns [`CryptoError::Invalid`] when the wrapper syntax is wrong and
    /// [`CryptoError::UnknownToken`] for an unrecognized token.
    pub fn parse_hash_list(text: &str) -> Result<Self, CryptoError> {
        let text = text.trim();
        if text == "LEGACY" {
            return Ok(Self::NT);
        }
        let body = text
            .strip_prefix("HASHLIST:<")
            .and_then(|rest| rest.strip_suffix('>'))
            .ok_or(CryptoError::Invalid("hash list"))?;

        let mut mask = Self::empty();
        for token in body.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            mask = mask.union(Self::parse_token(token)?);
        }
        Ok(mask)
    }

    /// Parses a plain token list (the node-default configuration form).
    ///
    /// ## Errors
    ///
    /// Returns [`CryptoError::UnknownToken`] for an unrecognized token.
    pub fn parse_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self, CryptoError> {
        let mut mask = Self::empty();
        for token in tokens {
            mask = mask.union(Self::parse_token(token.as_ref())?);
        }
        Ok(mask)
    }

    /// Renders the mask back to `HASHLIST:<...>` form.
    #[must_use]
    pub fn to_hash_list(self) -> String {
        let mut tokens = Vec::new();
        for (bit, name) in [
            (Self::NT, "SMB-NT"),
            (Self::LM, "SMB-LAN-MANAGER"),
            (Self::SECURE, "SECURE"),
            (Self::SALTED_SHA1, "SALTED-SHA1"),
            (Self::CRAM_MD5, "CRAM-MD5"),
            (Self::RECOVERABLE, "RECOVERABLE"),
        ] {
            if self.contains(bit) {
                tokens.push(name);
            }
        }
        format!("HASHLIST:<{}>", tokens.join(","))
    }
}

impl fmt::Display for AlgorithmMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hash_list())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hash_list() {
        let mask = AlgorithmMask::parse_hash_list("HASHLIST:<SMB-NT,SALTED-SHA1>").unwrap();
        assert_eq!(mask, AlgorithmMask::NT.union(AlgorithmMask::SALTED_SHA1));
    }

    #[test]
    fn unknown_token_fails() {
        let err = AlgorithmMask::parse_hash_list("HASHLIST:<SMB-NT,BOGUS>").unwrap_err();
        assert!(matches!(err, CryptoError::UnknownToken(token) if token == "BOGUS"));
    }

    #[test]
    fn legacy_literal_forces_nt_without_lm() {
        let mask = AlgorithmMask::parse_hash_list("LEGACY").unwrap();
        assert!(mask.contains(AlgorithmMask::NT));
        assert!(!mask.contains(AlgorithmMask::LM));
    }

    #[test]
    fn malformed_wrapper_is_invalid() {
        assert!(matches!(
            AlgorithmMask::parse_hash_list("HASHLIST:SMB-NT"),
            Err(CryptoError::Invalid(_))
        ));
    }

    #[test]
    fn round_trips_through_display() {
        let mask = AlgorithmMask::NT
            .union(AlgorithmMask::CRAM_MD5)
            .union(AlgorithmMask::RECOVERABLE);
        let back = AlgorithmMask::parse_hash_list(&mask.to_hash_list()).unwrap();
        assert_eq!(mask, back);
    }

    #[test]
    fn set_operations() {
        let both = AlgorithmMask::NT.union(AlgorithmMask::LM);
        assert_eq!(both.without(AlgorithmMask::LM), AlgorithmMask::NT);
        assert_eq!(
            both.intersect(AlgorithmMask::LM.union(AlgorithmMask::SECURE)),
            AlgorithmMask::LM
        );
        assert!(AlgorithmMask::empty().is_empty());
    }
}
