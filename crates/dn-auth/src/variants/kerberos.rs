//! The Kerberos and KerberosCert variants.
//!
//! Local credential operations behave exactly like ShadowHash; what this
//! variant adds is principal synchronization on password-set operations.
//! The entry data names the realm principal (`name` or `name@REALM`).
//! When the principal no longer matches the username - a rename - the
//! stale principal is deleted first, as is any colliding principal
//! already holding the new name.

use dn_core::AuthResult;
use tracing::{debug, warn};

use crate::authority::AuthorityEntry;
use crate::collaborators::RealmError;
use crate::engine::{AuthOutcome, AuthRequest, Engine, Session};
use crate::request::ParsedRequest;
use crate::variants::shadow;

pub(crate) fn handle(
    engine: &Engine,
    request: &AuthRequest<'_>,
    parsed: &ParsedRequest<'_>,
    entry: &AuthorityEntry,
    session: &mut Option<Session>,
) -> AuthResult<AuthOutcome> {
    let sets_password = matches!(
        parsed,
        ParsedRequest::Change { .. } | ParsedRequest::SetAsRoot { .. }
    );
    let username = parsed.username();

    // Delete stale principals before the shadow path upserts the new one.
    if sets_password && !request.auth_only {
        if let Some(username) = username {
            retire_stale_principals(engine, entry, username);
        }
    }

    let mut outcome = shadow::handle(engine, request, parsed, "", session)?;

    if sets_password {
        if let Some(username) = username {
            if let Some(renamed) = renamed_entry(engine, entry, username) {
                outcome.updated_authority = Some(vec![renamed]);
            }
        }
    }
    Ok(outcome)
}

/// The principal name carried in the entry data, without any realm part.
fn data_principal(entry: &AuthorityEntry) -> &str {
    let data = entry.data.trim();
    data.split('@').next().unwrap_or(data)
}

/// Removes the outdated principal on a rename, plus any collision holding
/// the new name. Missing principals and missing realms are fine.
fn retire_stale_principals(engine: &Engine, entry: &AuthorityEntry, username: &str) {
    let realm = match engine.realm_name() {
        Ok(realm) => realm,
        Err(RealmError::Unavailable | RealmError::PrincipalMissing) => {
            debug!(username, "no realm resolved, principal cleanup skipped");
            return;
        }
    };
    let stale = data_principal(entry);
    if !stale.is_empty() && stale != username {
        for principal in [stale, username] {
            match engine.realm_sync().delete_principal(principal, &realm) {
                Ok(()) | Err(RealmError::PrincipalMissing) => {}
                Err(err) => {
                    warn!(principal, realm, error = %err, "stale principal not deleted");
                }
            }
        }
    }
}

/// When the entry named a different principal, the caller must rewrite
/// the authority to the new `username@REALM` form.
fn renamed_entry(engine: &Engine, entry: &AuthorityEntry, username: &str) -> Option<String> {
    let stale = data_principal(entry);
    if stale.is_empty() || stale == username {
        return None;
    }
    let realm = engine.realm_name().ok()?;
    let updated = AuthorityEntry {
        version: entry.version.clone(),
        tag: entry.tag,
        data: format!("{username}@{realm}"),
    };
    Some(updated.render())
}
