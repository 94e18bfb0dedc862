//! Per-account state: the companion `.state` file.
//!
//! The state file is a fixed 28-byte little-endian record. The layout is
//! deliberately explicit (no serde format) because dirtiness is decided by
//! comparing the serialized bytes against the as-loaded snapshot.

use crate::error::StoreError;

/// Serialized length of an account-state record.
pub const STATE_LEN: usize = 28;

/// Mutable per-account bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountState {
    /// Account is administratively or automatically disabled.
    pub disabled: bool,
    /// The next successful verification must be followed by a password
    /// change.
    pub new_password_required: bool,
    /// Consecutive failed verification attempts.
    pub failed_attempts: u16,
    /// Record creation time, unix seconds.
    pub created_at: i64,
    /// Last successful login, unix seconds (0 = never).
    pub last_login_at: i64,
    /// Last password modification, unix seconds.
    pub password_modified_at: i64,
}

impl AccountState {
    /// Fresh defaults for an account whose state file does not exist yet.
    #[must_use]
    pub const fn new(now: i64) -> Self {
        Self {
            disabled: false,
            new_password_required: false,
            failed_attempts: 0,
            created_at: now,
            last_login_at: 0,
            password_modified_at: now,
        }
    }

    /// Serializes to the fixed on-disk layout.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; STATE_LEN] {
        let mut out = [0u8; STATE_LEN];
        out[0] = u8::from(self.disabled);
        out[1] = u8::from(self.new_password_required);
        out[2..4].copy_from_slice(&self.failed_attempts.to_le_bytes());
        out[4..12].copy_from_slice(&self.created_at.to_le_bytes());
        out[12..20].copy_from_slice(&self.last_login_at.to_le_bytes());
        out[20..28].copy_from_slice(&self.password_modified_at.to_le_bytes());
        out
    }

    /// Deserializes from the fixed on-disk layout.
    ///
    /// ## Errors
    ///
    /// Returns [`StoreError::Corrupt`] for a wrong-sized record or flag
    /// bytes outside {0, 1}.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        if bytes.len() != STATE_LEN {
            return Err(StoreError::Corrupt("account state length"));
        }
        if bytes[0] > 1 || bytes[1] > 1 {
            return Err(StoreError::Corrupt("account state flags"));
        }
        Ok(Self {
            disabled: bytes[0] == 1,
            new_password_required: bytes[1] == 1,
            failed_attempts: u16::from_le_bytes([bytes[2], bytes[3]]),
            created_at: i64::from_le_bytes(bytes[4..12].try_into().expect("8-byte slice")),
            last_login_at: i64::from_le_bytes(bytes[12..20].try_into().expect("8-byte slice")),
            password_modified_at: i64::from_le_bytes(
                bytes[20..28].try_into().expect("8-byte slice"),
            ),
        })
    }
}
