//! Password to hash-set generation and comparison.
//!
//! [`generate_hashes`] derives the multi-algorithm credential record from a
//! cleartext password; [`hashes_equal`] compares two records in constant
//! time after normalizing their length class.

use md4::{Digest as _, Md4};
use rand::Rng as _;
use sha1::Sha1;
use subtle::ConstantTimeEq as _;
use zeroize::Zeroizing;

use crate::blob::{
    CredentialBlob, CRAM_LEN, LM_LEN, NT_LEN, RECOVERABLE_LEN, SALTED_LEN, SECURE_LEN,
};
use crate::cram;
use crate::error::CryptoError;
use crate::mask::AlgorithmMask;
use crate::ntlm::des_encrypt_with_7byte_key;

/// Maximum password length in bytes.
///
/// Requests carrying a longer password are rejected before any comparison
/// runs.
pub const MAX_PASSWORD_LEN: usize = 511;

/// Fixed key for the recoverable-password field.
///
/// The recoverable field is reversible obfuscation, not protection: every
/// node shares this compiled-in key. Kept for compatibility with protocols
/// that need the plaintext to compute their own challenge (APOP,
/// DIGEST-MD5).
const RECOVERABLE_KEY: [u8; 16] = [
    0x78, 0x56, 0x34, 0x12, 0xf2, 0xd1, 0xc0, 0xb3, 0x9e, 0x8d, 0x7c, 0x6f, 0x5a, 0x49, 0x38,
    0x2b,
];

/// The constant LAN Manager plaintext.
const LM_MAGIC: [u8; 8] = *b"KGS!@#$%";

/// UTF-16LE encoding of a password, zeroized on drop.
pub(crate) fn utf16le_bytes(text: &str) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(Vec::with_capacity(text.len() * 2));
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

/// NT hash: MD4 over the UTF-16LE password.
#[must_use]
pub fn nt_hash(password: &str) -> [u8; NT_LEN] {
    let encoded = utf16le_bytes(password);
    let digest = Md4::digest(&*encoded);
    let mut out = [0u8; NT_LEN];
    out.copy_from_slice(&digest);
    out
}

/// LAN Manager hash: DES of a constant under two 7-byte keys taken from the
/// uppercased OEM password.
#[must_use]
pub fn lm_hash(password: &str) -> [u8; LM_LEN] {
    let mut padded = Zeroizing::new([0u8; 14]);
    for (slot, byte) in padded.iter_mut().zip(password.bytes()) {
        *slot = byte.to_ascii_uppercase();
    }

    let mut out = [0u8; LM_LEN];
    let mut key = [0u8; 7];
    key.copy_from_slice(&padded[..7]);
    out[..8].copy_from_slice(&des_encrypt_with_7byte_key(&key, &LM_MAGIC));
    key.copy_from_slice(&padded[7..14]);
    out[8..].copy_from_slice(&des_encrypt_with_7byte_key(&key, &LM_MAGIC));
    out
}

/// Salted SHA-1 field: 4-byte salt followed by SHA1(salt || password).
#[must_use]
pub fn salted_sha1(password: &str, salt: [u8; 4]) -> [u8; SALTED_LEN] {
    let mut hasher = Sha1::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();

    let mut out = [0u8; SALTED_LEN];
    out[..4].copy_from_slice(&salt);
    out[4..].copy_from_slice(&digest);
    out
}

/// Recoverable-password field: AES-128-CBC under the fixed key, zero IV,
/// 4-byte little-endian length prefix then the password bytes, zero padded.
///
/// Returns `None` when the password cannot fit the fixed field.
#[must_use]
pub fn recoverable_field(password: &str) -> Option<[u8; RECOVERABLE_LEN]> {
    use aes::cipher::{BlockEncrypt as _, KeyInit as _};

    let body_len = 4 + password.len();
    if body_len > RECOVERABLE_LEN {
        return None;
    }

    let mut plain = Zeroizing::new([0u8; RECOVERABLE_LEN]);
    plain[..4].copy_from_slice(&(password.len() as u32).to_le_bytes());
    plain[4..4 + password.len()].copy_from_slice(password.as_bytes());

    let cipher = aes::Aes128::new((&RECOVERABLE_KEY).into());
    let mut out = [0u8; RECOVERABLE_LEN];
    let mut prev = [0u8; 16];
    for (chunk_in, chunk_out) in plain.chunks_exact(16).zip(out.chunks_exact_mut(16)) {
        let mut block = [0u8; 16];
        for (i, byte) in block.iter_mut().enumerate() {
            *byte = chunk_in[i] ^ prev[i];
        }
        let mut block = aes::cipher::generic_array::GenericArray::from(block);
        cipher.encrypt_block(&mut block);
        chunk_out.copy_from_slice(&block);
        prev.copy_from_slice(&block);
    }
    Some(out)
}

/// Decodes the recoverable-password field back to the plaintext.
///
/// ## Errors
///
/// Returns [`CryptoError::FieldAbsent`] for an all-zero field and
/// [`CryptoError::Invalid`] when the decrypted length prefix or content is
/// inconsistent.
pub fn recover_password(field: &[u8]) -> Result<Zeroizing<String>, CryptoError> {
    use aes::cipher::{BlockDecrypt as _, KeyInit as _};

    if field.len() != RECOVERABLE_LEN {
        return Err(CryptoError::Malformed {
            context: "recoverable field",
            expected: RECOVERABLE_LEN,
            got: field.len(),
        });
    }
    if field.iter().all(|&b| b == 0) {
        return Err(CryptoError::FieldAbsent);
    }

    let cipher = aes::Aes128::new((&RECOVERABLE_KEY).into());
    let mut plain = Zeroizing::new([0u8; RECOVERABLE_LEN]);
    let mut prev = [0u8; 16];
    for (chunk_in, chunk_out) in field.chunks_exact(16).zip(plain.chunks_exact_mut(16)) {
        let mut block =
            aes::cipher::generic_array::GenericArray::clone_from_slice(chunk_in);
        cipher.decrypt_block(&mut block);
        for (i, byte) in chunk_out.iter_mut().enumerate() {
            *byte = block[i] ^ prev[i];
        }
        prev.copy_from_slice(chunk_in);
    }

    let len = u32::from_le_bytes([plain[0], plain[1], plain[2], plain[3]]) as usize;
    if 4 + len > RECOVERABLE_LEN {
        return Err(CryptoError::Invalid("recoverable length prefix"));
    }
    let text = std::str::from_utf8(&plain[4..4 + len])
        .map_err(|_| CryptoError::Invalid("recoverable content"))?;
    Ok(Zeroizing::new(text.to_string()))
}

/// Derives the credential record for `password`.
///
/// Computes exactly the subset of fields selected by `mask`; every other
/// field stays zero. Deterministic given an identical `existing_salt`.
/// `lan_manager_enabled` is the node-generation switch: when off, the LM
/// field is suppressed regardless of the mask.
///
/// ## Errors
///
/// Returns [`CryptoError::PasswordTooLong`] before computing anything when
/// the password exceeds [`MAX_PASSWORD_LEN`].
pub fn generate_hashes(
    password: &str,
    mask: AlgorithmMask,
    existing_salt: Option<[u8; 4]>,
    lan_manager_enabled: bool,
) -> Result<CredentialBlob, CryptoError> {
    if password.len() > MAX_PASSWORD_LEN {
        return Err(CryptoError::PasswordTooLong);
    }

    let mut blob = CredentialBlob::zeroed();

    if mask.contains(AlgorithmMask::NT) {
        blob.set_nt(&nt_hash(password));
    }
    if mask.contains(AlgorithmMask::LM) && lan_manager_enabled {
        blob.set_lm(&lm_hash(password));
    }
    if mask.contains(AlgorithmMask::SECURE) {
        let digest = Sha1::digest(password.as_bytes());
        let mut secure = [0u8; SECURE_LEN];
        secure.copy_from_slice(&digest);
        blob.set_secure(&secure);
    }
    if mask.contains(AlgorithmMask::CRAM_MD5) {
        let mut material: [u8; CRAM_LEN] = cram::derive_key_material(password.as_bytes());
        blob.set_cram(&material);
        material.fill(0);
    }
    if mask.contains(AlgorithmMask::SALTED_SHA1) {
        let salt = existing_salt.unwrap_or_else(|| {
            let mut salt = [0u8; 4];
            rand::rng().fill(&mut salt[..]);
            salt
        });
        blob.set_salted_sha1(&salted_sha1(password, salt));
    }
    if mask.contains(AlgorithmMask::RECOVERABLE) {
        // Passwords near the length cap cannot fit the fixed field; the
        // field stays zero rather than failing the whole set.
        if let Some(field) = recoverable_field(password) {
            blob.set_recoverable(&field);
        }
    }

    Ok(blob)
}

/// Constant-time equality over two credential records.
///
/// Both inputs are normalized to the stored record's length class first, so
/// a legacy record compares only over its three fields.
#[must_use]
pub fn hashes_equal(stored: &CredentialBlob, candidate: &CredentialBlob) -> bool {
    let candidate = candidate.normalized_to(stored.len());
    stored
        .as_bytes()
        .ct_eq(candidate.as_bytes())
        .into()
}
