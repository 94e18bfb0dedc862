//! Account-policy evaluation: expiry and failed-attempt lockout.

use dn_core::AuthStatus;
use dn_store::AccountState;
use thiserror::Error;
use tracing::debug;

use crate::text::PolicyText;

/// Why an account failed policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccountPolicyError {
    /// The account was already disabled, or this evaluation disabled it.
    #[error("account disabled")]
    Disabled,
    /// The password has outlived `maxMinutesUntilChangePassword`.
    #[error("password expired")]
    PasswordExpired,
}

impl From<AccountPolicyError> for AuthStatus {
    fn from(_: AccountPolicyError) -> Self {
        Self::AccountDisabled
    }
}

/// Evaluates expiry and lockout for one account.
///
/// On success the failed-attempt counter is reset to zero. On crossing the
/// lockout threshold the account is marked disabled in `state`. Nothing is
/// persisted here - the dispatcher writes state once, at the end of the
/// call, if it changed.
///
/// ## Errors
///
/// [`AccountPolicyError::Disabled`] or
/// [`AccountPolicyError::PasswordExpired`]; both surface to callers as
/// `AccountDisabled`.
pub fn evaluate_account(
    policy: &PolicyText,
    state: &mut AccountState,
    now: i64,
) -> Result<(), AccountPolicyError> {
    if state.disabled {
        return Err(AccountPolicyError::Disabled);
    }
    if policy.is_disabled.unwrap_or(false) {
        state.disabled = true;
        return Err(AccountPolicyError::Disabled);
    }

    let max_minutes = policy.max_minutes_until_change_password.unwrap_or(0);
    if max_minutes > 0 && state.password_modified_at > 0 {
        let age_minutes = (now - state.password_modified_at) / 60;
        if age_minutes >= max_minutes {
            debug!(age_minutes, max_minutes, "password expired");
            state.disabled = true;
            return Err(AccountPolicyError::PasswordExpired);
        }
    }

    let threshold = policy.max_failed_login_attempts.unwrap_or(0);
    if threshold > 0 && state.failed_attempts >= threshold {
        debug!(
            failed_attempts = state.failed_attempts,
            threshold, "failed-attempt lockout"
        );
        state.disabled = true;
        return Err(AccountPolicyError::Disabled);
    }

    state.failed_attempts = 0;
    Ok(())
}
