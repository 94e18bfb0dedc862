//! The DisabledUser wrapper variant.
//!
//! The entry data holds the record's original authority entry minus its
//! version segment, e.g. `;ShadowHash;HASHLIST:<...>`. Only policy reads
//! and the two root-only recovery operations pass through to the wrapped
//! variant; everything else is refused without even parsing the wrapped
//! data. A wrapped cached-network record is re-enabled transparently the
//! moment its authoritative node is reachable again.

use dn_core::{AuthMethod, AuthResult, AuthStatus};
use tracing::info;

use crate::authority::{AuthorityEntry, AuthorityTag};
use crate::engine::{AuthOutcome, AuthRequest, Engine, Session};
use crate::request::ParsedRequest;

/// Operations a disabled record still answers.
fn passes_through(method: AuthMethod) -> bool {
    matches!(
        method,
        AuthMethod::GetPolicy
            | AuthMethod::GetEffectivePolicy
            | AuthMethod::SetPolicyAsRoot
            | AuthMethod::SetPasswordAsRoot
    )
}

pub(crate) fn handle(
    engine: &Engine,
    request: &AuthRequest<'_>,
    parsed: &ParsedRequest<'_>,
    entry: &AuthorityEntry,
    session: &mut Option<Session>,
) -> AuthResult<AuthOutcome> {
    // The wrapped data is only consulted for operations that may pass.
    if !passes_through(request.method) {
        if let Some(wrapped) = parse_wrapped(entry) {
            if let Some(outcome) = try_reenable(engine, request, parsed, &wrapped, session)? {
                return Ok(outcome);
            }
        }
        return Err(AuthStatus::AccountDisabled);
    }

    let wrapped = parse_wrapped(entry).ok_or(AuthStatus::AccountDisabled)?;
    engine.dispatch(&wrapped, request, parsed, session)
}

/// Parses the wrapped entry out of the data segment. The wrapper's own
/// version segment is reused since the data carries none.
fn parse_wrapped(entry: &AuthorityEntry) -> Option<AuthorityEntry> {
    let data = entry.data.trim();
    let rest = data.strip_prefix(';')?;
    let (tag_text, wrapped_data) = match rest.split_once(';') {
        Some((tag_text, wrapped_data)) => (tag_text, wrapped_data),
        None => (rest, ""),
    };
    // Never unwrap into another wrapper.
    let wrapped = AuthorityEntry::parse(&format!(
        ";{};{};{}",
        entry.version, tag_text, wrapped_data
    ))?;
    if wrapped.tag == AuthorityTag::DisabledUser {
        return None;
    }
    Some(wrapped)
}

/// A disabled cached-network record whose authoritative node answers
/// again is re-enabled: the request runs against the wrapped variant and
/// the caller is told to drop the wrapper from the authority attribute.
fn try_reenable(
    engine: &Engine,
    request: &AuthRequest<'_>,
    parsed: &ParsedRequest<'_>,
    wrapped: &AuthorityEntry,
    session: &mut Option<Session>,
) -> AuthResult<Option<AuthOutcome>> {
    if wrapped.tag != AuthorityTag::LocalCachedUser {
        return Ok(None);
    }
    let node = wrapped.data.trim();
    if node.is_empty() || !engine.reachability().is_reachable(node) {
        return Ok(None);
    }
    info!(
        record_id = request.record_id,
        node, "network node reachable again, re-enabling record"
    );
    let mut outcome = engine.dispatch(wrapped, request, parsed, session)?;
    outcome.updated_authority = Some(vec![wrapped.render()]);
    Ok(Some(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_entry_is_reconstructed() {
        let entry = AuthorityEntry::parse(";1;DisabledUser;;ShadowHash;").unwrap();
        let wrapped = parse_wrapped(&entry).unwrap();
        assert_eq!(wrapped.tag, AuthorityTag::ShadowHash);
        assert_eq!(wrapped.data, "");
    }

    #[test]
    fn wrapped_hash_list_survives() {
        let entry =
            AuthorityEntry::parse(";1;DisabledUser;;ShadowHash;HASHLIST:<SMB-NT>").unwrap();
        let wrapped = parse_wrapped(&entry).unwrap();
        assert_eq!(wrapped.data, "HASHLIST:<SMB-NT>");
    }

    #[test]
    fn nested_wrapper_is_rejected() {
        let entry =
            AuthorityEntry::parse(";1;DisabledUser;;DisabledUser;;ShadowHash;").unwrap();
        assert!(parse_wrapped(&entry).is_none());
    }

    #[test]
    fn pass_through_set_is_exact() {
        assert!(passes_through(AuthMethod::GetPolicy));
        assert!(passes_through(AuthMethod::GetEffectivePolicy));
        assert!(passes_through(AuthMethod::SetPolicyAsRoot));
        assert!(passes_through(AuthMethod::SetPasswordAsRoot));
        assert!(!passes_through(AuthMethod::VerifyPassword));
        assert!(!passes_through(AuthMethod::SetPolicy));
        assert!(!passes_through(AuthMethod::ChangePassword));
    }
}
