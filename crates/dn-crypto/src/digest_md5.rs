//! DIGEST-MD5 mutual verification (RFC 2831, `qop=auth` subset).
//!
//! Requires the plaintext password (via the recoverable credential field):
//! the digest is keyed by `MD5(username:realm:password)`. The server side
//! is two-round - round one mints the nonce, round two verifies the
//! client's `digest-response` and answers with `rspauth`.

use md5::{Digest as _, Md5};
use subtle::ConstantTimeEq as _;

use crate::error::CryptoError;

/// Parsed fields of a client `digest-response` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestResponse {
    /// Authenticating username.
    pub username: String,
    /// Realm the client selected.
    pub realm: String,
    /// Server nonce echoed back.
    pub nonce: String,
    /// Client nonce.
    pub cnonce: String,
    /// Nonce count, as the literal 8-digit field.
    pub nc: String,
    /// Quality of protection; only `auth` is served.
    pub qop: String,
    /// Digest URI.
    pub digest_uri: String,
    /// The 32-hex-digit response.
    pub response: String,
}

impl DigestResponse {
    /// Parses a comma-separated `key=value` digest-response string; values
    /// may be quoted.
    ///
    /// ## Errors
    ///
    /// Returns [`CryptoError::Invalid`] when a required field is missing or
    /// the syntax is broken.
    pub fn parse(text: &str) -> Result<Self, CryptoError> {
        let mut username = None;
        let mut realm = None;
        let mut nonce = None;
        let mut cnonce = None;
        let mut nc = None;
        let mut qop = None;
        let mut digest_uri = None;
        let mut response = None;

        for pair in split_pairs(text) {
            let (key, value) = pair
                .split_once('=')
                .ok_or(CryptoError::Invalid("digest-response pair"))?;
            let value = value.trim().trim_matches('"').to_string();
            match key.trim() {
                "username" => username = Some(value),
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "cnonce" => cnonce = Some(value),
                "nc" => nc = Some(value),
                "qop" => qop = Some(value),
                "digest-uri" => digest_uri = Some(value),
                "response" => response = Some(value),
                // charset, maxbuf and friends are irrelevant to the digest
                _ => {}
            }
        }

        Ok(Self {
            username: username.ok_or(CryptoError::Invalid("digest-response username"))?,
            realm: realm.unwrap_or_default(),
            nonce: nonce.ok_or(CryptoError::Invalid("digest-response nonce"))?,
            cnonce: cnonce.ok_or(CryptoError::Invalid("digest-response cnonce"))?,
            nc: nc.unwrap_or_else(|| "00000001".to_string()),
            qop: qop.unwrap_or_else(|| "auth".to_string()),
            digest_uri: digest_uri.ok_or(CryptoError::Invalid("digest-response digest-uri"))?,
            response: response.ok_or(CryptoError::Invalid("digest-response response"))?,
        })
    }
}

/// Splits on commas that are not inside quoted values.
fn split_pairs(text: &str) -> Vec<&str> {
    let mut pairs = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, c) in text.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                pairs.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pairs.push(&text[start..]);
    pairs.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect()
}

fn ha1_hex(password: &str, fields: &DigestResponse) -> String {
    let mut user_hash = Md5::new();
    user_hash.update(fields.username.as_bytes());
    user_hash.update(b":");
    user_hash.update(fields.realm.as_bytes());
    user_hash.update(b":");
    user_hash.update(password.as_bytes());
    let user_hash = user_hash.finalize();

    let mut a1 = Md5::new();
    a1.update(user_hash);
    a1.update(b":");
    a1.update(fields.nonce.as_bytes());
    a1.update(b":");
    a1.update(fields.cnonce.as_bytes());
    hex::encode(a1.finalize())
}

fn response_hex(password: &str, fields: &DigestResponse, a2_method: &str) -> String {
    let ha1 = ha1_hex(password, fields);
    let ha2 = hex::encode(Md5::digest(
        format!("{}:{}", a2_method, fields.digest_uri).as_bytes(),
    ));
    let kd = format!(
        "{}:{}:{}:{}:{}:{}",
        ha1, fields.nonce, fields.nc, fields.cnonce, fields.qop, ha2
    );
    hex::encode(Md5::digest(kd.as_bytes()))
}

/// Verifies the client response and, on success, returns the `rspauth`
/// value for mutual authentication.
///
/// `expected_nonce` is the nonce minted in round one; a response carrying
/// any other nonce is a replay and fails outright.
///
/// ## Errors
///
/// Returns [`CryptoError::Invalid`] for an unsupported `qop` or a nonce
/// mismatch and [`CryptoError::Mismatch`] when the digest is wrong.
pub fn verify_mutual(
    password: &str,
    fields: &DigestResponse,
    expected_nonce: &str,
) -> Result<String, CryptoError> {
    if fields.qop != "auth" {
        return Err(CryptoError::Invalid("digest qop"));
    }
    if fields.nonce != expected_nonce {
        return Err(CryptoError::Invalid("digest nonce"));
    }

    let expected = response_hex(password, fields, "AUTHENTICATE");
    let presented = fields.response.to_lowercase();
    if !bool::from(expected.as_bytes().ct_eq(presented.as_bytes())) {
        return Err(CryptoError::Mismatch);
    }

    // rspauth drops the method half of A2.
    Ok(response_hex(password, fields, ""))
}
