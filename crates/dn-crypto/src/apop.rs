//! APOP verification (RFC 1939 §7).
//!
//! APOP is MD5 over the server's timestamp banner concatenated with the
//! plaintext password, so it can only be served for records whose
//! recoverable-password field is populated.

use md5::{Digest as _, Md5};
use subtle::ConstantTimeEq as _;

use crate::error::CryptoError;

/// Verifies an APOP hex digest.
///
/// `challenge` is the full `<...>` timestamp banner as sent to the client.
///
/// ## Errors
///
/// Returns [`CryptoError::Invalid`]/[`CryptoError::Malformed`] for a
/// non-hex or wrong-sized digest and [`CryptoError::Mismatch`] on failure.
pub fn verify(password: &str, challenge: &[u8], response_hex: &str) -> Result<(), CryptoError> {
    let presented: Vec<u8> =
        hex::decode(response_hex.trim()).map_err(|_| CryptoError::Invalid("APOP digest"))?;
    if presented.len() != 16 {
        return Err(CryptoError::Malformed {
            context: "APOP digest",
            expected: 16,
            got: presented.len(),
        });
    }

    let mut hasher = Md5::new();
    hasher.update(challenge);
    hasher.update(password.as_bytes());
    let expected = hasher.finalize();

    if expected.as_slice().ct_eq(&presented).into() {
        Ok(())
    } else {
        Err(CryptoError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The worked example from RFC 1939 §7.
    #[test]
    fn rfc_1939_example() {
        let challenge = b"<1896.697170952@dbc.mtview.ca.us>";
        assert!(verify(
            "tanstaaf",
            challenge,
            "c4c9334bac560ecc979e58001b3e22fb"
        )
        .is_ok());
    }

    #[test]
    fn wrong_password_fails() {
        let challenge = b"<1896.697170952@dbc.mtview.ca.us>";
        assert!(matches!(
            verify("wrong", challenge, "c4c9334bac560ecc979e58001b3e22fb"),
            Err(CryptoError::Mismatch)
        ));
    }

    #[test]
    fn non_hex_digest_is_invalid() {
        assert!(matches!(
            verify("x", b"<c>", "zz"),
            Err(CryptoError::Invalid(_))
        ));
    }
}
