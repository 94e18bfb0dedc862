//! Engine status kinds.
//!
//! Every fallible engine path resolves to one of these kinds. Callers see a
//! status only; delayed responses from the failure throttle are silent
//! (latency, not an error).

use thiserror::Error;

/// Status kinds returned by the password engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthStatus {
    /// Credential verification failed.
    #[error("authentication failed")]
    AuthFailed,

    /// The selected authority variant does not support the requested method.
    #[error("authentication method not supported")]
    AuthMethodNotSupported,

    /// The request buffer is malformed for the requested method.
    #[error("invalid buffer format")]
    InvalidBufferFormat,

    /// The caller lacks the privilege the operation requires.
    #[error("permission denied")]
    PermissionError,

    /// Candidate password is shorter than the policy minimum.
    #[error("password too short")]
    PasswordTooShort,

    /// Candidate password exceeds the maximum representable length.
    #[error("password too long")]
    PasswordTooLong,

    /// Candidate password violates a policy rule other than length.
    #[error("password violates policy")]
    PolicyViolation,

    /// The account is administratively or automatically disabled.
    #[error("account disabled")]
    AccountDisabled,

    /// A request parameter is out of range or unrecognized.
    #[error("parameter error")]
    ParameterError,

    /// An allocation or capacity limit was exceeded.
    #[error("memory error")]
    MemoryError,

    /// A continuation token is unknown or its payload is inconsistent.
    #[error("bad continuation data")]
    ContinueDataBad,

    /// No stored credential exists for a method that requires one.
    #[error("not found")]
    NotFound,
}

/// Result type for engine operations.
pub type AuthResult<T> = Result<T, AuthStatus>;

impl AuthStatus {
    /// Returns true for kinds that represent a failed credential check, as
    /// opposed to a malformed or unauthorized request.
    ///
    /// Only these kinds feed the failed-attempt counter and the failure
    /// throttle.
    #[must_use]
    pub const fn counts_as_auth_failure(&self) -> bool {
        matches!(self, Self::AuthFailed | Self::AccountDisabled)
    }
}
