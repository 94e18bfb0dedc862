//! NT / LAN Manager challenge responses and NTLMv2.
//!
//! The "P24" construction pads a 16-byte hash to 21 bytes and DES-encrypts
//! the 8-byte server challenge under three 7-byte keys taken from it.
//! NTLMv2 replaces that with HMAC-MD5 over the NT hash keyed by user and
//! domain.

use des::cipher::generic_array::GenericArray;
use des::cipher::{BlockEncrypt as _, KeyInit as _};
use des::Des;
use hmac::{Hmac, Mac as _};
use md5::Md5;
use subtle::ConstantTimeEq as _;

use crate::error::CryptoError;
use crate::hashes::utf16le_bytes;

type HmacMd5 = Hmac<Md5>;

/// Length of a P24 challenge response.
pub const P24_LEN: usize = 24;
/// Length of the peer challenge in P24-family exchanges.
pub const CHALLENGE_LEN: usize = 8;

/// Spreads a 7-byte key over 8 bytes the way DES expects, parity bits in
/// the low position.
fn expand_des_key(key7: &[u8; 7]) -> [u8; 8] {
    let c = key7;
    let mut key8 = [
        c[0] >> 1,
        ((c[0] & 0x01) << 6) | (c[1] >> 2),
        ((c[1] & 0x03) << 5) | (c[2] >> 3),
        ((c[2] & 0x07) << 4) | (c[3] >> 4),
        ((c[3] & 0x0f) << 3) | (c[4] >> 5),
        ((c[4] & 0x1f) << 2) | (c[5] >> 6),
        ((c[5] & 0x3f) << 1) | (c[6] >> 7),
        c[6] & 0x7f,
    ];
    for byte in &mut key8 {
        *byte <<= 1;
    }
    key8
}

/// Single-DES encryption of one block under a 7-byte key.
pub(crate) fn des_encrypt_with_7byte_key(key7: &[u8; 7], block: &[u8; 8]) -> [u8; 8] {
    let key8 = expand_des_key(key7);
    let cipher = Des::new(GenericArray::from_slice(&key8));
    let mut data = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut data);
    let mut out = [0u8; 8];
    out.copy_from_slice(&data);
    out
}

/// Computes the 24-byte P24 response for a 16-byte hash and an 8-byte
/// challenge.
#[must_use]
pub fn p24_response(hash16: &[u8; 16], challenge: &[u8; CHALLENGE_LEN]) -> [u8; P24_LEN] {
    let mut padded = [0u8; 21];
    padded[..16].copy_from_slice(hash16);

    let mut out = [0u8; P24_LEN];
    for i in 0..3 {
        let mut key = [0u8; 7];
        key.copy_from_slice(&padded[i * 7..i * 7 + 7]);
        out[i * 8..i * 8 + 8].copy_from_slice(&des_encrypt_with_7byte_key(&key, challenge));
    }
    out
}

/// Verifies a presented P24 response.
///
/// ## Errors
///
/// Returns [`CryptoError::Malformed`] for wrong-sized inputs and
/// [`CryptoError::Mismatch`] when the response does not match.
pub fn verify_p24(
    hash16: &[u8; 16],
    challenge: &[u8],
    response: &[u8],
) -> Result<(), CryptoError> {
    let challenge: &[u8; CHALLENGE_LEN] =
        challenge
            .try_into()
            .map_err(|_| CryptoError::Malformed {
                context: "challenge",
                expected: CHALLENGE_LEN,
                got: challenge.len(),
            })?;
    if response.len() != P24_LEN {
        return Err(CryptoError::Malformed {
            context: "challenge response",
            expected: P24_LEN,
            got: response.len(),
        });
    }
    let expected = p24_response(hash16, challenge);
    if expected.ct_eq(response).into() {
        Ok(())
    } else {
        Err(CryptoError::Mismatch)
    }
}

/// NTLMv2 hash: HMAC-MD5 over UTF-16LE(upper(user) || domain), keyed by the
/// NT hash.
#[must_use]
pub fn ntlmv2_hash(nt_hash: &[u8; 16], user: &str, domain: &str) -> [u8; 16] {
    let identity = format!("{}{}", user.to_uppercase(), domain);
    let encoded = utf16le_bytes(&identity);

    let mut mac = <HmacMd5 as hmac::Mac>::new_from_slice(nt_hash).expect("HMAC accepts any key length");
    mac.update(&encoded);
    let mut out = [0u8; 16];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Computes the NTLMv2 response MAC over the server challenge and the
/// client blob.
#[must_use]
pub fn ntlmv2_response(
    nt_hash: &[u8; 16],
    user: &str,
    domain: &str,
    server_challenge: &[u8; CHALLENGE_LEN],
    client_blob: &[u8],
) -> [u8; 16] {
    let v2_hash = ntlmv2_hash(nt_hash, user, domain);
    let mut mac = <HmacMd5 as hmac::Mac>::new_from_slice(&v2_hash).expect("HMAC accepts any key length");
    mac.update(server_challenge);
    mac.update(client_blob);
    let mut out = [0u8; 16];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Verifies a presented NTLMv2 response MAC.
///
/// ## Errors
///
/// Returns [`CryptoError::Malformed`] for wrong-sized inputs and
/// [`CryptoError::Mismatch`] when the MAC does not match.
pub fn verify_ntlmv2(
    nt_hash: &[u8; 16],
    user: &str,
    domain: &str,
    server_challenge: &[u8],
    client_blob: &[u8],
    presented_mac: &[u8],
) -> Result<(), CryptoError> {
    let server_challenge: &[u8; CHALLENGE_LEN] =
        server_challenge
            .try_into()
            .map_err(|_| CryptoError::Malformed {
                context: "server challenge",
                expected: CHALLENGE_LEN,
                got: server_challenge.len(),
            })?;
    if presented_mac.len() != 16 {
        return Err(CryptoError::Malformed {
            context: "NTLMv2 response",
            expected: 16,
            got: presented_mac.len(),
        });
    }
    let expected = ntlmv2_response(nt_hash, user, domain, server_challenge, client_blob);
    if expected.ct_eq(presented_mac).into() {
        Ok(())
    } else {
        Err(CryptoError::Mismatch)
    }
}
