//! MSCHAPv2 (RFC 2759) response verification and authenticator response.

use md4::{Digest as _, Md4};
use sha1::Sha1;
use subtle::ConstantTimeEq as _;

use crate::error::CryptoError;
use crate::ntlm::{p24_response, P24_LEN};

/// Length of the authenticator and peer challenges.
pub const CHALLENGE_LEN: usize = 16;
/// Length of the "S=..." authenticator response string.
pub const AUTHENTICATOR_LEN: usize = 42;

const MAGIC1: &[u8; 39] = b"Magic server to client signing constant";
const MAGIC2: &[u8; 41] = b"Pad to make it do more than one iteration";

/// The 8-byte challenge hash: SHA1(peer || authenticator || username).
#[must_use]
pub fn challenge_hash(
    peer_challenge: &[u8; CHALLENGE_LEN],
    auth_challenge: &[u8; CHALLENGE_LEN],
    user: &str,
) -> [u8; 8] {
    let mut hasher = Sha1::new();
    hasher.update(peer_challenge);
    hasher.update(auth_challenge);
    hasher.update(user.as_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Computes the 24-byte NT response.
#[must_use]
pub fn nt_response(
    nt_hash: &[u8; 16],
    auth_challenge: &[u8; CHALLENGE_LEN],
    peer_challenge: &[u8; CHALLENGE_LEN],
    user: &str,
) -> [u8; P24_LEN] {
    let challenge = challenge_hash(peer_challenge, auth_challenge, user);
    p24_response(nt_hash, &challenge)
}

/// Builds the `S=<40 hex>` authenticator response for mutual auth.
#[must_use]
pub fn authenticator_response(
    nt_hash: &[u8; 16],
    response: &[u8; P24_LEN],
    auth_challenge: &[u8; CHALLENGE_LEN],
    peer_challenge: &[u8; CHALLENGE_LEN],
    user: &str,
) -> String {
    let hash_hash = Md4::digest(nt_hash);

    let mut first = Sha1::new();
    first.update(hash_hash);
    first.update(response);
    first.update(MAGIC1);
    let first = first.finalize();

    let challenge = challenge_hash(peer_challenge, auth_challenge, user);

    let mut second = Sha1::new();
    second.update(first);
    second.update(challenge);
    second.update(MAGIC2);
    let digest = second.finalize();

    format!("S={}", hex::encode_upper(digest))
}

/// Verifies a presented MSCHAPv2 response; on success returns the
/// authenticator response the server must echo back.
///
/// ## Errors
///
/// Returns [`CryptoError::Malformed`] for wrong-sized inputs and
/// [`CryptoError::Mismatch`] when the response does not match.
pub fn verify(
    nt_hash: &[u8; 16],
    auth_challenge: &[u8],
    peer_challenge: &[u8],
    response: &[u8],
    user: &str,
) -> Result<String, CryptoError> {
    let auth_challenge: &[u8; CHALLENGE_LEN] =
        auth_challenge
            .try_into()
            .map_err(|_| CryptoError::Malformed {
                context: "authenticator challenge",
                expected: CHALLENGE_LEN,
                got: auth_challenge.len(),
            })?;
    let peer_challenge: &[u8; CHALLENGE_LEN] =
        peer_challenge
            .try_into()
            .map_err(|_| CryptoError::Malformed {
                context: "peer challenge",
                expected: CHALLENGE_LEN,
                got: peer_challenge.len(),
            })?;
    let response: &[u8; P24_LEN] = response.try_into().map_err(|_| CryptoError::Malformed {
        context: "MSCHAPv2 response",
        expected: P24_LEN,
        got: response.len(),
    })?;

    let expected = nt_response(nt_hash, auth_challenge, peer_challenge, user);
    if !bool::from(expected.ct_eq(response)) {
        return Err(CryptoError::Mismatch);
    }

    Ok(authenticator_response(
        nt_hash,
        response,
        auth_challenge,
        peer_challenge,
        user,
    ))
}
