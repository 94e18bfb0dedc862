//! Candidate-password quality checks.

use dn_core::AuthStatus;
use dn_crypto::hashes::salted_sha1;
use thiserror::Error;

use crate::text::PolicyText;

/// A specific way a candidate password violates policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PasswordViolation {
    /// Shorter than `minChars`.
    #[error("password too short")]
    TooShort,
    /// Longer than `maxChars`.
    #[error("password too long")]
    TooLong,
    /// Missing a required alphabetic character.
    #[error("password needs a letter")]
    NeedsAlpha,
    /// Missing a required decimal digit.
    #[error("password needs a digit")]
    NeedsNumeric,
    /// Missing required mixed case.
    #[error("password needs mixed case")]
    NeedsMixedCase,
    /// Missing a required non-alphanumeric character.
    #[error("password needs a symbol")]
    NeedsSymbol,
    /// Contains the account name.
    #[error("password contains the account name")]
    ContainsName,
    /// Matches a recent previous password.
    #[error("password was used recently")]
    Reused,
}

impl From<PasswordViolation> for AuthStatus {
    fn from(violation: PasswordViolation) -> Self {
        match violation {
            PasswordViolation::TooShort => Self::PasswordTooShort,
            PasswordViolation::TooLong => Self::PasswordTooLong,
            _ => Self::PolicyViolation,
        }
    }
}

/// Checks a candidate password against a merged policy.
///
/// `history` is the salted-SHA1 reuse history, most recent first; only the
/// first `usingHistory` entries are consulted.
///
/// A preserved special case: a policy with `minChars=0` accepts an
/// explicitly empty candidate outright, even though the character-class
/// rules would nominally reject it.
///
/// ## Errors
///
/// The first violated rule, checked in the order length, character
/// classes, name containment, history.
pub fn check_password(
    policy: &PolicyText,
    username: &str,
    candidate: &str,
    history: &[[u8; 24]],
) -> Result<(), PasswordViolation> {
    let min_chars = policy.min_chars.unwrap_or(0);
    if min_chars == 0 && candidate.is_empty() {
        return Ok(());
    }

    let length = u32::try_from(candidate.chars().count()).unwrap_or(u32::MAX);
    if length < min_chars {
        return Err(PasswordViolation::TooShort);
    }
    if let Some(max_chars) = policy.max_chars {
        if max_chars > 0 && length > max_chars {
            return Err(PasswordViolation::TooLong);
        }
    }

    if policy.requires_alpha.unwrap_or(false) && !candidate.chars().any(char::is_alphabetic) {
        return Err(PasswordViolation::NeedsAlpha);
    }
    if policy.requires_numeric.unwrap_or(false)
        && !candidate.chars().any(|c| c.is_ascii_digit())
    {
        return Err(PasswordViolation::NeedsNumeric);
    }
    if policy.requires_mixed_case.unwrap_or(false) {
        let has_upper = candidate.chars().any(char::is_uppercase);
        let has_lower = candidate.chars().any(char::is_lowercase);
        if !has_upper || !has_lower {
            return Err(PasswordViolation::NeedsMixedCase);
        }
    }
    if policy.requires_symbol.unwrap_or(false)
        && candidate.chars().all(char::is_alphanumeric)
    {
        return Err(PasswordViolation::NeedsSymbol);
    }

    if policy.password_cannot_be_name.unwrap_or(false)
        && !username.is_empty()
        && candidate.to_lowercase().contains(&username.to_lowercase())
    {
        return Err(PasswordViolation::ContainsName);
    }

    let depth = policy.using_history.unwrap_or(0) as usize;
    for entry in history.iter().take(depth) {
        let mut salt = [0u8; 4];
        salt.copy_from_slice(&entry[..4]);
        if salted_sha1(candidate, salt) == *entry {
            return Err(PasswordViolation::Reused);
        }
    }

    Ok(())
}
