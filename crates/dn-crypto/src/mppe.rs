//! PPTP/MPPE master session key derivation (RFC 3079 §3).

use md4::{Digest as _, Md4};
use sha1::Sha1;

use crate::error::CryptoError;
use crate::ntlm::P24_LEN;

const MAGIC1: &[u8; 27] = b"This is the MPPE Master Key";
const MAGIC2: &[u8; 84] =
    b"On the client side, this is the send key; on the server side, it is the receive key.";
const MAGIC3: &[u8; 84] =
    b"On the client side, this is the receive key; on the server side, it is the send key.";

const SHA_PAD1: [u8; 40] = [0x00; 40];
const SHA_PAD2: [u8; 40] = [0xf2; 40];

/// Derives the 16-byte MPPE master key from the NT hash and the client's
/// 24-byte NT response.
#[must_use]
pub fn master_key(nt_hash: &[u8; 16], nt_response: &[u8; P24_LEN]) -> [u8; 16] {
    let hash_hash = Md4::digest(nt_hash);

    let mut hasher = Sha1::new();
    hasher.update(hash_hash);
    hasher.update(nt_response);
    hasher.update(MAGIC1);
    let digest = hasher.finalize();

    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..16]);
    out
}

fn asymmetric_start_key(master: &[u8; 16], magic: &[u8; 84]) -> [u8; 16] {
    let mut hasher = Sha1::new();
    hasher.update(master);
    hasher.update(SHA_PAD1);
    hasher.update(magic);
    hasher.update(SHA_PAD2);
    let digest = hasher.finalize();

    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..16]);
    out
}

/// Derives the server-side (send, receive) session key pair.
///
/// ## Errors
///
/// Returns [`CryptoError::Malformed`] when the NT response has the wrong
/// size.
pub fn server_session_keys(
    nt_hash: &[u8; 16],
    nt_response: &[u8],
) -> Result<([u8; 16], [u8; 16]), CryptoError> {
    let nt_response: &[u8; P24_LEN] =
        nt_response
            .try_into()
            .map_err(|_| CryptoError::Malformed {
                context: "NT response",
                expected: P24_LEN,
                got: nt_response.len(),
            })?;
    let master = master_key(nt_hash, nt_response);
    // Server send is the client's receive key and vice versa.
    let send = asymmetric_start_key(&master, MAGIC3);
    let recv = asymmetric_start_key(&master, MAGIC2);
    Ok((send, recv))
}
