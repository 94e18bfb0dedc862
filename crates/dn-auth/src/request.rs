//! Request buffer decoding.
//!
//! Every method carries its inputs in one opaque buffer of
//! length-prefixed items: a little-endian `u32` byte count followed by
//! that many bytes, repeated. Which items a method expects, and how they
//! are typed, lives here and nowhere else.

use dn_core::{AuthMethod, AuthResult, AuthStatus};
use dn_crypto::hashes::MAX_PASSWORD_LEN;

/// Largest accepted single item. Anything bigger is a capacity error, not
/// a format error.
const MAX_ITEM_LEN: usize = 64 * 1024;

/// Sequential reader over a length-prefixed item buffer.
#[derive(Debug)]
pub struct BufferReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BufferReader<'a> {
    /// Wraps `data` without copying.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Reads the next item as raw bytes.
    ///
    /// ## Errors
    ///
    /// [`AuthStatus::InvalidBufferFormat`] for a truncated prefix or body,
    /// [`AuthStatus::MemoryError`] for an item over the size cap.
    pub fn next_bytes(&mut self) -> AuthResult<&'a [u8]> {
        let rest = &self.data[self.pos..];
        if rest.len() < 4 {
            return Err(AuthStatus::InvalidBufferFormat);
        }
        let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        if len > MAX_ITEM_LEN {
            return Err(AuthStatus::MemoryError);
        }
        if rest.len() - 4 < len {
            return Err(AuthStatus::InvalidBufferFormat);
        }
        self.pos += 4 + len;
        Ok(&rest[4..4 + len])
    }

    /// Reads the next item as UTF-8 text.
    ///
    /// ## Errors
    ///
    /// As [`Self::next_bytes`], plus [`AuthStatus::InvalidBufferFormat`]
    /// for non-UTF-8 content.
    pub fn next_str(&mut self) -> AuthResult<&'a str> {
        std::str::from_utf8(self.next_bytes()?).map_err(|_| AuthStatus::InvalidBufferFormat)
    }

    /// Reads the next item as a password.
    ///
    /// The length cap is enforced here, before any comparison or hashing
    /// sees the candidate.
    ///
    /// ## Errors
    ///
    /// As [`Self::next_str`], plus [`AuthStatus::PasswordTooLong`] past
    /// the cap.
    pub fn next_password(&mut self) -> AuthResult<&'a str> {
        let text = self.next_str()?;
        if text.len() > MAX_PASSWORD_LEN {
            return Err(AuthStatus::PasswordTooLong);
        }
        Ok(text)
    }

    /// Reads the next item and requires exactly `len` bytes.
    ///
    /// ## Errors
    ///
    /// As [`Self::next_bytes`], plus [`AuthStatus::InvalidBufferFormat`]
    /// for a wrong-sized item.
    pub fn next_exact(&mut self, len: usize) -> AuthResult<&'a [u8]> {
        let bytes = self.next_bytes()?;
        if bytes.len() != len {
            return Err(AuthStatus::InvalidBufferFormat);
        }
        Ok(bytes)
    }

    /// True once every byte has been consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.pos == self.data.len()
    }
}

/// Appends one length-prefixed item to `buf`.
///
/// The inverse of [`BufferReader`]; used to build request buffers and to
/// repack a request for forwarding.
pub fn append_item(buf: &mut Vec<u8>, item: &[u8]) {
    buf.extend_from_slice(&(item.len() as u32).to_le_bytes());
    buf.extend_from_slice(item);
}

/// A method's inputs, decoded and typed.
#[derive(Debug, PartialEq, Eq)]
pub enum ParsedRequest<'a> {
    /// Cleartext verification.
    Verify {
        /// Target username.
        username: &'a str,
        /// Candidate password.
        password: &'a str,
    },
    /// Old-for-new password change.
    Change {
        /// Target username.
        username: &'a str,
        /// Current password.
        old_password: &'a str,
        /// Replacement password.
        new_password: &'a str,
    },
    /// Privileged password establishment.
    SetAsRoot {
        /// Target username.
        username: &'a str,
        /// Replacement password.
        new_password: &'a str,
    },
    /// Policy read or effective-policy read.
    PolicyGet {
        /// Target username.
        username: &'a str,
    },
    /// Policy replacement.
    PolicySet {
        /// Target username.
        username: &'a str,
        /// New policy text.
        policy: &'a str,
    },
    /// Node-global policy read.
    GlobalGet,
    /// Node-global policy replacement.
    GlobalSet {
        /// New policy text.
        policy: &'a str,
    },
    /// NT or LAN Manager challenge response.
    P24 {
        /// Target username.
        username: &'a str,
        /// 8-byte server challenge.
        challenge: &'a [u8],
        /// 24-byte response.
        response: &'a [u8],
    },
    /// NTLMv2 response.
    Ntlmv2 {
        /// Target username.
        username: &'a str,
        /// Client-supplied domain.
        domain: &'a str,
        /// 8-byte server challenge.
        server_challenge: &'a [u8],
        /// Variable-length client blob.
        client_blob: &'a [u8],
        /// 16-byte response MAC.
        response: &'a [u8],
    },
    /// MSCHAPv2 response.
    MsChap {
        /// Target username.
        username: &'a str,
        /// 16-byte authenticator challenge.
        auth_challenge: &'a [u8],
        /// 16-byte peer challenge.
        peer_challenge: &'a [u8],
        /// 24-byte NT response.
        response: &'a [u8],
    },
    /// CRAM-MD5 digest.
    Cram {
        /// Target username.
        username: &'a str,
        /// Server challenge text.
        challenge: &'a [u8],
        /// Hex digest from the client.
        response_hex: &'a str,
    },
    /// APOP digest.
    Apop {
        /// Target username.
        username: &'a str,
        /// Timestamp challenge, angle brackets included.
        challenge: &'a [u8],
        /// Hex digest from the client.
        response_hex: &'a str,
    },
    /// DIGEST-MD5 round one: mint a nonce and a continuation.
    DigestStart {
        /// Target username.
        username: &'a str,
    },
    /// DIGEST-MD5 round two: verify against the held continuation.
    DigestFinish {
        /// Target username.
        username: &'a str,
        /// The client's `digest-response` string.
        response: &'a str,
    },
    /// PPTP/MPPE session key derivation.
    Pptp {
        /// Target username.
        username: &'a str,
        /// 24-byte NT response from the tunnel handshake.
        nt_response: &'a [u8],
    },
    /// Workstation session key derivation, both strengths.
    Workstation {
        /// Target username.
        username: &'a str,
        /// 8-byte client challenge.
        client_challenge: &'a [u8],
        /// 8-byte server challenge.
        server_challenge: &'a [u8],
    },
    /// Continuation release; the token travels out of band.
    Release,
}

impl<'a> ParsedRequest<'a> {
    /// The username this request targets, when it targets one.
    #[must_use]
    pub fn username(&self) -> Option<&'a str> {
        match self {
            Self::Verify { username, .. }
            | Self::Change { username, .. }
            | Self::SetAsRoot { username, .. }
            | Self::PolicyGet { username }
            | Self::PolicySet { username, .. }
            | Self::P24 { username, .. }
            | Self::Ntlmv2 { username, .. }
            | Self::MsChap { username, .. }
            | Self::Cram { username, .. }
            | Self::Apop { username, .. }
            | Self::DigestStart { username }
            | Self::DigestFinish { username, .. }
            | Self::Pptp { username, .. }
            | Self::Workstation { username, .. } => Some(username),
            Self::GlobalGet | Self::GlobalSet { .. } | Self::Release => None,
        }
    }
}

/// Decodes `buffer` according to `method`.
///
/// `has_continuation` selects between the two DIGEST-MD5 rounds.
///
/// ## Errors
///
/// [`AuthStatus::InvalidBufferFormat`] for a buffer that does not match
/// the method's item layout, plus the per-item errors of [`BufferReader`].
pub fn parse_request<'a>(
    method: AuthMethod,
    buffer: &'a [u8],
    has_continuation: bool,
) -> AuthResult<ParsedRequest<'a>> {
    let mut reader = BufferReader::new(buffer);
    let parsed = match method {
        AuthMethod::VerifyPassword => ParsedRequest::Verify {
            username: reader.next_str()?,
            password: reader.next_password()?,
        },
        AuthMethod::ChangePassword => ParsedRequest::Change {
            username: reader.next_str()?,
            old_password: reader.next_password()?,
            new_password: reader.next_password()?,
        },
        AuthMethod::SetPasswordAsRoot => ParsedRequest::SetAsRoot {
            username: reader.next_str()?,
            new_password: reader.next_password()?,
        },
        AuthMethod::GetPolicy | AuthMethod::GetEffectivePolicy => ParsedRequest::PolicyGet {
            username: reader.next_str()?,
        },
        AuthMethod::SetPolicy | AuthMethod::SetPolicyAsRoot => ParsedRequest::PolicySet {
            username: reader.next_str()?,
            policy: reader.next_str()?,
        },
        AuthMethod::GetGlobalPolicy => ParsedRequest::GlobalGet,
        AuthMethod::SetGlobalPolicy => ParsedRequest::GlobalSet {
            policy: reader.next_str()?,
        },
        AuthMethod::SmbNtKey | AuthMethod::SmbLmKey => ParsedRequest::P24 {
            username: reader.next_str()?,
            challenge: reader.next_exact(8)?,
            response: reader.next_exact(24)?,
        },
        AuthMethod::Ntlmv2 => ParsedRequest::Ntlmv2 {
            username: reader.next_str()?,
            domain: reader.next_str()?,
            server_challenge: reader.next_exact(8)?,
            client_blob: reader.next_bytes()?,
            response: reader.next_exact(16)?,
        },
        AuthMethod::MsChapV2 => ParsedRequest::MsChap {
            username: reader.next_str()?,
            auth_challenge: reader.next_exact(16)?,
            peer_challenge: reader.next_exact(16)?,
            response: reader.next_exact(24)?,
        },
        AuthMethod::CramMd5 => ParsedRequest::Cram {
            username: reader.next_str()?,
            challenge: reader.next_bytes()?,
            response_hex: reader.next_str()?,
        },
        AuthMethod::Apop => ParsedRequest::Apop {
            username: reader.next_str()?,
            challenge: reader.next_bytes()?,
            response_hex: reader.next_str()?,
        },
        AuthMethod::DigestMd5 => {
            if has_continuation {
                ParsedRequest::DigestFinish {
                    username: reader.next_str()?,
                    response: reader.next_str()?,
                }
            } else {
                ParsedRequest::DigestStart {
                    username: reader.next_str()?,
                }
            }
        }
        AuthMethod::PptpMasterKeys => ParsedRequest::Pptp {
            username: reader.next_str()?,
            nt_response: reader.next_exact(24)?,
        },
        AuthMethod::WorkstationKey | AuthMethod::SecureWorkstationKey => {
            ParsedRequest::Workstation {
                username: reader.next_str()?,
                client_challenge: reader.next_exact(8)?,
                server_challenge: reader.next_exact(8)?,
            }
        }
        AuthMethod::ReleaseContinuation => ParsedRequest::Release,
    };

    if !reader.is_exhausted() && !matches!(parsed, ParsedRequest::Release) {
        return Err(AuthStatus::InvalidBufferFormat);
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(items: &[&[u8]]) -> Vec<u8> {
        let mut buf = Vec::new();
        for item in items {
            append_item(&mut buf, item);
        }
        buf
    }

    #[test]
    fn verify_round_trip() {
        let buf = buffer(&[b"alice", b"Secret1"]);
        match parse_request(AuthMethod::VerifyPassword, &buf, false).unwrap() {
            ParsedRequest::Verify { username, password } => {
                assert_eq!(username, "alice");
                assert_eq!(password, "Secret1");
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn truncated_prefix_is_malformed() {
        assert_eq!(
            parse_request(AuthMethod::VerifyPassword, &[5, 0, 0], false),
            Err(AuthStatus::InvalidBufferFormat)
        );
    }

    #[test]
    fn prefix_overrunning_body_is_malformed() {
        // Claims 100 bytes, supplies 3.
        let mut buf = 100u32.to_le_bytes().to_vec();
        buf.extend_from_slice(b"abc");
        assert_eq!(
            parse_request(AuthMethod::VerifyPassword, &buf, false),
            Err(AuthStatus::InvalidBufferFormat)
        );
    }

    #[test]
    fn oversize_item_is_a_capacity_error() {
        let buf = (MAX_ITEM_LEN as u32 + 1).to_le_bytes().to_vec();
        assert_eq!(
            parse_request(AuthMethod::VerifyPassword, &buf, false),
            Err(AuthStatus::MemoryError)
        );
    }

    #[test]
    fn trailing_garbage_is_malformed() {
        let mut buf = buffer(&[b"alice", b"Secret1"]);
        buf.push(0);
        assert_eq!(
            parse_request(AuthMethod::VerifyPassword, &buf, false),
            Err(AuthStatus::InvalidBufferFormat)
        );
    }

    #[test]
    fn password_cap_is_enforced_at_parse_time() {
        let long = vec![b'a'; MAX_PASSWORD_LEN + 1];
        let buf = buffer(&[b"alice", &long]);
        assert_eq!(
            parse_request(AuthMethod::VerifyPassword, &buf, false),
            Err(AuthStatus::PasswordTooLong)
        );

        let edge = vec![b'a'; MAX_PASSWORD_LEN];
        let buf = buffer(&[b"alice", &edge]);
        assert!(parse_request(AuthMethod::VerifyPassword, &buf, false).is_ok());
    }

    #[test]
    fn challenge_sizes_are_checked() {
        let buf = buffer(&[b"alice", &[0u8; 7], &[0u8; 24]]);
        assert_eq!(
            parse_request(AuthMethod::SmbNtKey, &buf, false),
            Err(AuthStatus::InvalidBufferFormat)
        );
    }

    #[test]
    fn digest_round_is_picked_by_continuation() {
        let buf = buffer(&[b"chris"]);
        assert!(matches!(
            parse_request(AuthMethod::DigestMd5, &buf, false).unwrap(),
            ParsedRequest::DigestStart { username: "chris" }
        ));

        let buf = buffer(&[b"chris", b"username=\"chris\""]);
        assert!(matches!(
            parse_request(AuthMethod::DigestMd5, &buf, true).unwrap(),
            ParsedRequest::DigestFinish { .. }
        ));
    }
}
