//! Policy text parsing and merging.
//!
//! The wire/storage form is space-separated `key=value` pairs, e.g.
//! `minChars=8 requiresNumeric=1 maxFailedLoginAttempts=5`. Unknown keys
//! are ignored for forward compatibility; unparsable values are not.

use dn_core::AuthStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A policy-text value that failed to parse.
#[derive(Debug, Error)]
#[error("bad policy value for '{key}'")]
pub struct PolicyParseError {
    /// The offending key.
    pub key: String,
}

impl From<PolicyParseError> for AuthStatus {
    fn from(_: PolicyParseError) -> Self {
        Self::ParameterError
    }
}

/// Parsed policy options. `None` means "not set here" and defers to the
/// next layer down (record policy defers to node defaults, node defaults
/// defer to built-ins).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyText {
    /// Minimum password length in characters.
    pub min_chars: Option<u32>,
    /// Maximum password length in characters.
    pub max_chars: Option<u32>,
    /// Require at least one alphabetic character.
    pub requires_alpha: Option<bool>,
    /// Require at least one decimal digit.
    pub requires_numeric: Option<bool>,
    /// Require both upper- and lowercase characters.
    pub requires_mixed_case: Option<bool>,
    /// Require at least one non-alphanumeric character.
    pub requires_symbol: Option<bool>,
    /// Reject passwords containing the username.
    pub password_cannot_be_name: Option<bool>,
    /// Number of previous passwords that may not be reused (0 = off).
    pub using_history: Option<u32>,
    /// Password lifetime in minutes (0 = never expires).
    pub max_minutes_until_change_password: Option<i64>,
    /// Failed-attempt lockout threshold (0 = off).
    pub max_failed_login_attempts: Option<u16>,
    /// Administratively disabled.
    pub is_disabled: Option<bool>,
    /// A password change is required at next login.
    pub new_password_required: Option<bool>,
}

fn parse_flag(key: &str, value: &str) -> Result<bool, PolicyParseError> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(PolicyParseError {
            key: key.to_string(),
        }),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, PolicyParseError> {
    value.parse().map_err(|_| PolicyParseError {
        key: key.to_string(),
    })
}

impl PolicyText {
    /// Parses policy text. An empty or all-whitespace string is the empty
    /// policy.
    ///
    /// ## Errors
    ///
    /// Returns [`PolicyParseError`] for a recognized key with an
    /// unparsable value.
    pub fn parse(text: &str) -> Result<Self, PolicyParseError> {
        let mut policy = Self::default();
        for pair in text.split_whitespace() {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            match key {
                "minChars" => policy.min_chars = Some(parse_num(key, value)?),
                "maxChars" => policy.max_chars = Some(parse_num(key, value)?),
                "requiresAlpha" => policy.requires_alpha = Some(parse_flag(key, value)?),
                "requiresNumeric" => policy.requires_numeric = Some(parse_flag(key, value)?),
                "requiresMixedCase" => policy.requires_mixed_case = Some(parse_flag(key, value)?),
                "requiresSymbol" => policy.requires_symbol = Some(parse_flag(key, value)?),
                "passwordCannotBeName" => {
                    policy.password_cannot_be_name = Some(parse_flag(key, value)?);
                }
                "usingHistory" => policy.using_history = Some(parse_num(key, value)?),
                "maxMinutesUntilChangePassword" => {
                    policy.max_minutes_until_change_password = Some(parse_num(key, value)?);
                }
                "maxFailedLoginAttempts" => {
                    policy.max_failed_login_attempts = Some(parse_num(key, value)?);
                }
                "isDisabled" => policy.is_disabled = Some(parse_flag(key, value)?),
                "newPasswordRequired" => {
                    policy.new_password_required = Some(parse_flag(key, value)?);
                }
                _ => {}
            }
        }
        Ok(policy)
    }

    /// Overlays this policy on `defaults`: every key set here wins, every
    /// unset key falls through.
    #[must_use]
    pub fn merged_over(&self, defaults: &Self) -> Self {
        macro_rules! pick {
            ($field:ident) => {
                self.$field.or(defaults.$field)
            };
        }
        Self {
            min_chars: pick!(min_chars),
            max_chars: pick!(max_chars),
            requires_alpha: pick!(requires_alpha),
            requires_numeric: pick!(requires_numeric),
            requires_mixed_case: pick!(requires_mixed_case),
            requires_symbol: pick!(requires_symbol),
            password_cannot_be_name: pick!(password_cannot_be_name),
            using_history: pick!(using_history),
            max_minutes_until_change_password: pick!(max_minutes_until_change_password),
            max_failed_login_attempts: pick!(max_failed_login_attempts),
            is_disabled: pick!(is_disabled),
            new_password_required: pick!(new_password_required),
        }
    }

    /// Renders the set keys back to policy text, in a stable order.
    #[must_use]
    pub fn render(&self) -> String {
        let mut pairs: Vec<String> = Vec::new();
        let flag = |v: bool| if v { "1" } else { "0" };
        if let Some(v) = self.min_chars {
            pairs.push(format!("minChars={v}"));
        }
        if let Some(v) = self.max_chars {
            pairs.push(format!("maxChars={v}"));
        }
        if let Some(v) = self.requires_alpha {
            pairs.push(format!("requiresAlpha={}", flag(v)));
        }
        if let Some(v) = self.requires_numeric {
            pairs.push(format!("requiresNumeric={}", flag(v)));
        }
        if let Some(v) = self.requires_mixed_case {
            pairs.push(format!("requiresMixedCase={}", flag(v)));
        }
        if let Some(v) = self.requires_symbol {
            pairs.push(format!("requiresSymbol={}", flag(v)));
        }
        if let Some(v) = self.password_cannot_be_name {
            pairs.push(format!("passwordCannotBeName={}", flag(v)));
        }
        if let Some(v) = self.using_history {
            pairs.push(format!("usingHistory={v}"));
        }
        if let Some(v) = self.max_minutes_until_change_password {
            pairs.push(format!("maxMinutesUntilChangePassword={v}"));
        }
        if let Some(v) = self.max_failed_login_attempts {
            pairs.push(format!("maxFailedLoginAttempts={v}"));
        }
        if let Some(v) = self.is_disabled {
            pairs.push(format!("isDisabled={}", flag(v)));
        }
        if let Some(v) = self.new_password_required {
            pairs.push(format!("newPasswordRequired={}", flag(v)));
        }
        pairs.join(" ")
    }
}
