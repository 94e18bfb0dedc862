//! CRAM-MD5 verification from stored key material.
//!
//! The credential record does not hold the plaintext for CRAM-MD5; it holds
//! the two 16-byte interim HMAC-MD5 pad digests, MD5(k ^ ipad) and
//! MD5(k ^ opad), derived once when the password is set. Verification
//! resumes the keyed construction from those digests, so the plaintext is
//! never needed at verify time. The material is password-equivalent - it
//! must be protected exactly like a hash.

use md5::{Digest as _, Md5};
use subtle::ConstantTimeEq as _;
use zeroize::Zeroizing;

use crate::blob::CRAM_LEN;
use crate::error::CryptoError;

const BLOCK_LEN: usize = 64;

/// Derives the stored key material for a password.
#[must_use]
pub fn derive_key_material(password: &[u8]) -> [u8; CRAM_LEN] {
    let mut key = Zeroizing::new([0u8; BLOCK_LEN]);
    if password.len() > BLOCK_LEN {
        let digest = Md5::digest(password);
        key[..16].copy_from_slice(&digest);
    } else {
        key[..password.len()].copy_from_slice(password);
    }

    let mut ipad = Zeroizing::new([0u8; BLOCK_LEN]);
    let mut opad = Zeroizing::new([0u8; BLOCK_LEN]);
    for i in 0..BLOCK_LEN {
        ipad[i] = key[i] ^ 0x36;
        opad[i] = key[i] ^ 0x5c;
    }

    let mut out = [0u8; CRAM_LEN];
    out[..16].copy_from_slice(&Md5::digest(&*ipad));
    out[16..].copy_from_slice(&Md5::digest(&*opad));
    out
}

/// Computes the response digest for a challenge from stored key material.
fn response_digest(material: &[u8; CRAM_LEN], challenge: &[u8]) -> [u8; 16] {
    let mut inner = Md5::new();
    inner.update(&material[..16]);
    inner.update(challenge);
    let inner = inner.finalize();

    let mut outer = Md5::new();
    outer.update(&material[16..]);
    outer.update(inner);

    let mut out = [0u8; 16];
    out.copy_from_slice(&outer.finalize());
    out
}

/// Verifies a client's hex response digest against the stored material.
///
/// The digest is hex per the CRAM exchange; case is not significant.
///
/// ## Errors
///
/// Returns [`CryptoError::Malformed`] when the stored material has the
/// wrong size, [`CryptoError::Invalid`] for non-hex responses and
/// [`CryptoError::Mismatch`] when the digest does not match.
pub fn verify(
    material: &[u8],
    challenge: &[u8],
    response_hex: &str,
) -> Result<(), CryptoError> {
    let material: &[u8; CRAM_LEN] = material.try_into().map_err(|_| CryptoError::Malformed {
        context: "CRAM-MD5 key material",
        expected: CRAM_LEN,
        got: material.len(),
    })?;

    let presented: Vec<u8> =
        hex::decode(response_hex.trim()).map_err(|_| CryptoError::Invalid("CRAM-MD5 digest"))?;
    if presented.len() != 16 {
        return Err(CryptoError::Malformed {
            context: "CRAM-MD5 digest",
            expected: 16,
            got: presented.len(),
        });
    }

    let expected = response_digest(material, challenge);
    if expected.ct_eq(&presented).into() {
        Ok(())
    } else {
        Err(CryptoError::Mismatch)
    }
}

/// Computes the hex response a client would send; used by tests and by the
/// cached-user two-phase path when replaying against the network node.
#[must_use]
pub fn respond(material: &[u8; CRAM_LEN], challenge: &[u8]) -> String {
    hex::encode(response_digest(material, challenge))
}
