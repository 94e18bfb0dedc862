//! The Basic variant: legacy attribute-held secrets.
//!
//! Records predating credential files carry a hex-encoded salted SHA-1
//! secret in their `password` attribute. Verification compares against
//! that secret; the first success migrates the record to a credential
//! file and tells the caller to rewrite the authority attribute to
//! ShadowHash. Policy operations never needed the secret and delegate
//! straight to the shadow module.

use dn_core::{AuthResult, AuthStatus};
use dn_crypto::hashes::salted_sha1;
use dn_policy::check_password;
use subtle::ConstantTimeEq as _;
use tracing::{info, warn};

use crate::engine::{AuthOutcome, AuthRequest, Engine, Session};
use crate::request::ParsedRequest;
use crate::variants::shadow;

/// The record attribute holding the legacy secret.
const SECRET_ATTRIBUTE: &str = "password";

/// Hex-decoded secret size: 4 salt bytes plus a SHA-1 digest.
const SECRET_LEN: usize = 24;

pub(crate) fn handle(
    engine: &Engine,
    request: &AuthRequest<'_>,
    parsed: &ParsedRequest<'_>,
    session: &mut Option<Session>,
) -> AuthResult<AuthOutcome> {
    match parsed {
        ParsedRequest::Verify { username, password } => {
            verify_secret(request, password)?;
            migrate(engine, request, username, password, session)
        }
        ParsedRequest::Change {
            username,
            old_password,
            new_password,
        } => {
            verify_secret(request, old_password)?;
            let policy = engine.merged_policy(request.record_id);
            check_password(&policy, username, new_password, &[])?;
            migrate(engine, request, username, new_password, session)
        }
        ParsedRequest::SetAsRoot {
            username,
            new_password,
        } => migrate(engine, request, username, new_password, session),
        ParsedRequest::PolicyGet { .. } | ParsedRequest::PolicySet { .. } => {
            shadow::handle(engine, request, parsed, "", session)
        }
        // No derived credential fields exist for the protocol methods.
        _ => Err(AuthStatus::AuthMethodNotSupported),
    }
}

/// Compares `password` against the attribute-held secret.
fn verify_secret(request: &AuthRequest<'_>, password: &str) -> AuthResult<()> {
    let stored = request
        .record_attributes
        .get(SECRET_ATTRIBUTE)
        .ok_or(AuthStatus::NotFound)?;
    let raw = hex::decode(stored.trim()).map_err(|_| {
        warn!(record_id = request.record_id, "legacy secret is not hex");
        AuthStatus::AuthFailed
    })?;
    if raw.len() != SECRET_LEN {
        warn!(
            record_id = request.record_id,
            len = raw.len(),
            "legacy secret has unexpected size"
        );
        return Err(AuthStatus::AuthFailed);
    }

    let mut salt = [0u8; 4];
    salt.copy_from_slice(&raw[..4]);
    let expected = salted_sha1(password, salt);
    if expected.ct_eq(&raw[..]).into() {
        Ok(())
    } else {
        Err(AuthStatus::AuthFailed)
    }
}

/// Writes a credential file for `password` and hands back the ShadowHash
/// authority entry the caller must store on the record.
fn migrate(
    engine: &Engine,
    request: &AuthRequest<'_>,
    username: &str,
    password: &str,
    session: &mut Option<Session>,
) -> AuthResult<AuthOutcome> {
    shadow::establish(engine, request, username, password, "", None, session)?;
    info!(username, "legacy record migrated to credential file");
    Ok(AuthOutcome {
        output: Vec::new(),
        continuation: None,
        updated_authority: Some(vec![";1;ShadowHash;".to_string()]),
    })
}
