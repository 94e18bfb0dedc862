//! Workstation-credential session key derivation (secure-channel setup).
//!
//! Both variants derive a session key from the NT hash and the two 8-byte
//! challenges exchanged during workstation credential setup. The legacy
//! variant is DES-based and yields 8 bytes; the strong variant is
//! HMAC-MD5-based and yields 16.

use hmac::{Hmac, Mac as _};
use md5::{Digest as _, Md5};

use crate::error::CryptoError;
use crate::ntlm::des_encrypt_with_7byte_key;

type HmacMd5 = Hmac<Md5>;

/// Length of each workstation challenge.
pub const CHALLENGE_LEN: usize = 8;

fn challenge_pair(
    client: &[u8],
    server: &[u8],
) -> Result<([u8; CHALLENGE_LEN], [u8; CHALLENGE_LEN]), CryptoError> {
    let client: [u8; CHALLENGE_LEN] = client.try_into().map_err(|_| CryptoError::Malformed {
        context: "client challenge",
        expected: CHALLENGE_LEN,
        got: client.len(),
    })?;
    let server: [u8; CHALLENGE_LEN] = server.try_into().map_err(|_| CryptoError::Malformed {
        context: "server challenge",
        expected: CHALLENGE_LEN,
        got: server.len(),
    })?;
    Ok((client, server))
}

/// Legacy DES session key: the challenges are summed as two little-endian
/// 32-bit words and the result is DES-folded under two 7-byte keys taken
/// from the NT hash.
///
/// ## Errors
///
/// Returns [`CryptoError::Malformed`] for wrong-sized challenges.
pub fn legacy_session_key(
    nt_hash: &[u8; 16],
    client_challenge: &[u8],
    server_challenge: &[u8],
) -> Result<[u8; 8], CryptoError> {
    let (client, server) = challenge_pair(client_challenge, server_challenge)?;

    let mut sum = [0u8; 8];
    for half in 0..2 {
        let range = half * 4..half * 4 + 4;
        let c = u32::from_le_bytes(client[range.clone()].try_into().expect("4-byte slice"));
        let s = u32::from_le_bytes(server[range.clone()].try_into().expect("4-byte slice"));
        sum[range].copy_from_slice(&c.wrapping_add(s).to_le_bytes());
    }

    let mut key = [0u8; 7];
    key.copy_from_slice(&nt_hash[..7]);
    let first = des_encrypt_with_7byte_key(&key, &sum);
    key.copy_from_slice(&nt_hash[9..16]);
    Ok(des_encrypt_with_7byte_key(&key, &first))
}

/// Strong session key: HMAC-MD5 keyed by the NT hash over
/// MD5(zero4 || client challenge || server challenge).
///
/// ## Errors
///
/// Returns [`CryptoError::Malformed`] for wrong-sized challenges.
pub fn strong_session_key(
    nt_hash: &[u8; 16],
    client_challenge: &[u8],
    server_challenge: &[u8],
) -> Result<[u8; 16], CryptoError> {
    let (client, server) = challenge_pair(client_challenge, server_challenge)?;

    let mut inner = Md5::new();
    inner.update([0u8; 4]);
    inner.update(client);
    inner.update(server);
    let inner = inner.finalize();

    let mut mac = HmacMd5::new_from_slice(nt_hash).expect("HMAC accepts any key length");
    mac.update(&inner);
    let mut out = [0u8; 16];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}
