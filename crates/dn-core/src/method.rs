//! Authentication method codes.
//!
//! The enclosing request pipeline hands the engine a numeric method code
//! alongside the raw request buffer; [`AuthMethod::from_code`] is the only
//! place that mapping lives.

use crate::status::AuthStatus;

/// Operations the engine can be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AuthMethod {
    /// Verify a cleartext password against the stored credential.
    VerifyPassword = 1,
    /// Verify the old password, then establish a new one.
    ChangePassword = 2,
    /// Establish a password without knowing the old one (privileged).
    SetPasswordAsRoot = 3,
    /// Read the record's own policy text.
    GetPolicy = 4,
    /// Replace the record's policy text.
    SetPolicy = 5,
    /// Replace the record's policy text (privileged).
    SetPolicyAsRoot = 6,
    /// Read the record policy merged over the node defaults.
    GetEffectivePolicy = 7,
    /// Read the node-global default policy.
    GetGlobalPolicy = 8,
    /// Replace the node-global default policy (privileged).
    SetGlobalPolicy = 9,
    /// Verify an NT challenge response (24-byte DES construction).
    SmbNtKey = 10,
    /// Verify a LAN Manager challenge response.
    SmbLmKey = 11,
    /// Verify an NTLMv2 response.
    Ntlmv2 = 12,
    /// Verify an MSCHAPv2 response and emit the authenticator response.
    MsChapV2 = 13,
    /// Verify a CRAM-MD5 digest.
    CramMd5 = 14,
    /// Verify an APOP digest.
    Apop = 15,
    /// DIGEST-MD5 mutual verification (two-round, uses a continuation).
    DigestMd5 = 16,
    /// Derive the PPTP/MPPE master session keys.
    PptpMasterKeys = 17,
    /// Derive the legacy workstation-credential session key.
    WorkstationKey = 18,
    /// Derive the strong workstation-credential session key.
    SecureWorkstationKey = 19,
    /// Release a continuation token.
    ReleaseContinuation = 20,
}

impl AuthMethod {
    /// Maps a wire method code to a method.
    ///
    /// ## Errors
    ///
    /// Returns [`AuthStatus::AuthMethodNotSupported`] for unknown codes.
    pub const fn from_code(code: u32) -> Result<Self, AuthStatus> {
        Ok(match code {
            1 => Self::VerifyPassword,
            2 => Self::ChangePassword,
            3 => Self::SetPasswordAsRoot,
            4 => Self::GetPolicy,
            5 => Self::SetPolicy,
            6 => Self::SetPolicyAsRoot,
            7 => Self::GetEffectivePolicy,
            8 => Self::GetGlobalPolicy,
            9 => Self::SetGlobalPolicy,
            10 => Self::SmbNtKey,
            11 => Self::SmbLmKey,
            12 => Self::Ntlmv2,
            13 => Self::MsChapV2,
            14 => Self::CramMd5,
            15 => Self::Apop,
            16 => Self::DigestMd5,
            17 => Self::PptpMasterKeys,
            18 => Self::WorkstationKey,
            19 => Self::SecureWorkstationKey,
            20 => Self::ReleaseContinuation,
            _ => return Err(AuthStatus::AuthMethodNotSupported),
        })
    }

    /// Returns the wire code for this method.
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// True for pure policy reads.
    ///
    /// These skip the uniform post-dispatch account-policy step entirely.
    #[must_use]
    pub const fn is_policy_read(self) -> bool {
        matches!(
            self,
            Self::GetPolicy | Self::GetEffectivePolicy | Self::GetGlobalPolicy
        )
    }

    /// True for interactive credential-verification paths.
    ///
    /// Only these feed the failure throttle; policy and administrative
    /// operations never incur a backoff delay.
    #[must_use]
    pub const fn is_interactive_verify(self) -> bool {
        matches!(
            self,
            Self::VerifyPassword
                | Self::ChangePassword
                | Self::SmbNtKey
                | Self::SmbLmKey
                | Self::Ntlmv2
                | Self::MsChapV2
                | Self::CramMd5
                | Self::Apop
                | Self::DigestMd5
        )
    }

    /// True for methods that establish a password rather than verify one.
    ///
    /// Establishment tolerates a missing stored credential; verification
    /// does not.
    #[must_use]
    pub const fn establishes_password(self) -> bool {
        matches!(self, Self::SetPasswordAsRoot)
    }

    /// True for methods that require root or record-administrator privilege.
    #[must_use]
    pub const fn requires_privilege(self) -> bool {
        matches!(
            self,
            Self::SetPasswordAsRoot | Self::SetPolicyAsRoot | Self::SetGlobalPolicy
        )
    }
}
