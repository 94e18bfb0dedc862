//! Crypto-layer error types.

use dn_core::AuthStatus;
use thiserror::Error;

/// Errors from blob handling and protocol derivations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A challenge, response or blob input has the wrong size or shape.
    #[error("malformed {context}: expected {expected} bytes, got {got}")]
    Malformed {
        /// What was being parsed.
        context: &'static str,
        /// Expected byte count.
        expected: usize,
        /// Actual byte count.
        got: usize,
    },

    /// Input is not valid for the derivation (bad hex, bad UTF-8, missing
    /// delimiter).
    #[error("invalid {0}")]
    Invalid(&'static str),

    /// The derivation ran but the presented response does not match.
    #[error("response mismatch")]
    Mismatch,

    /// An unknown hash-list token.
    #[error("unknown hash-list token '{0}'")]
    UnknownToken(String),

    /// The required stored material (e.g. recoverable password) is absent.
    #[error("required credential field absent")]
    FieldAbsent,

    /// The password exceeds the representable length.
    #[error("password too long")]
    PasswordTooLong,
}

impl From<CryptoError> for AuthStatus {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Malformed { .. } | CryptoError::Invalid(_) => Self::InvalidBufferFormat,
            CryptoError::Mismatch | CryptoError::FieldAbsent => Self::AuthFailed,
            CryptoError::UnknownToken(_) => Self::ParameterError,
            CryptoError::PasswordTooLong => Self::PasswordTooLong,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            AuthStatus::from(CryptoError::Mismatch),
            AuthStatus::AuthFailed
        );
        assert_eq!(
            AuthStatus::from(CryptoError::UnknownToken("X".into())),
            AuthStatus::ParameterError
        );
        assert_eq!(
            AuthStatus::from(CryptoError::Malformed {
                context: "challenge",
                expected: 8,
                got: 7
            }),
            AuthStatus::InvalidBufferFormat
        );
    }
}
