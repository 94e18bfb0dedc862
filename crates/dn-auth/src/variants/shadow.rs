//! The ShadowHash variant: local multi-algorithm credential files.
//!
//! Every local sub-operation lives here: cleartext verify and change,
//! privileged set, record policy read/write, and the challenge/response
//! and key-derivation protocols of the credential blob. The realm,
//! disabled and cached variants all funnel their local work through this
//! module.

use dn_core::{AuthMethod, AuthResult, AuthStatus};
use dn_crypto::blob::SALTED_LEN;
use dn_crypto::hashes::{generate_hashes, hashes_equal, recover_password};
use dn_crypto::{apop, cram, digest_md5, mppe, mschap, netlogon, ntlm};
use dn_crypto::{AlgorithmMask, CredentialBlob};
use dn_policy::check_password;
use dn_store::AccountState;
use rand::Rng as _;
use tracing::{debug, warn};

use crate::continuation::Continuation;
use crate::engine::{AuthOutcome, AuthRequest, Engine, Session};
use crate::request::ParsedRequest;

/// A credential as loaded for one operation.
struct Loaded {
    blob: CredentialBlob,
    from_legacy_path: bool,
}

/// Executes one local operation against a ShadowHash record.
///
/// `hash_list` is the authority entry's data: a `HASHLIST:<...>` string,
/// the legacy literal, or empty for the node default.
pub(crate) fn handle(
    engine: &Engine,
    request: &AuthRequest<'_>,
    parsed: &ParsedRequest<'_>,
    hash_list: &str,
    session: &mut Option<Session>,
) -> AuthResult<AuthOutcome> {
    match parsed {
        ParsedRequest::Verify { username, password } => {
            verify_cleartext(engine, request, username, password, hash_list, session)?;
            Ok(AuthOutcome::empty())
        }
        ParsedRequest::Change {
            username,
            old_password,
            new_password,
        } => {
            let prior = verify_cleartext(engine, request, username, old_password, hash_list, session)?;
            check_quality(engine, request, username, new_password, &prior, session)?;
            establish(engine, request, username, new_password, hash_list, Some(&prior), session)?;
            Ok(AuthOutcome::empty())
        }
        ParsedRequest::SetAsRoot {
            username,
            new_password,
        } => {
            // Administrative set: no old password, no quality checks.
            let loaded = open(engine, username, request.record_id, session)?;
            let prior = loaded.map(|l| l.blob);
            establish(
                engine,
                request,
                username,
                new_password,
                hash_list,
                prior.as_ref(),
                session,
            )?;
            Ok(AuthOutcome::empty())
        }
        ParsedRequest::PolicyGet { .. } => policy_get(engine, request),
        ParsedRequest::PolicySet { policy, .. } => policy_set(engine, request, policy),
        ParsedRequest::P24 {
            username,
            challenge,
            response,
        } => {
            let required = if request.method == AuthMethod::SmbLmKey {
                AlgorithmMask::LM
            } else {
                AlgorithmMask::NT
            };
            let loaded = load_for_protocol(engine, request, username, hash_list, required, session)?;
            let hash16 = if request.method == AuthMethod::SmbLmKey {
                field16(loaded.blob.lm())?
            } else {
                field16(loaded.blob.nt())?
            };
            ntlm::verify_p24(&hash16, challenge, response)?;
            Ok(AuthOutcome::empty())
        }
        ParsedRequest::Ntlmv2 {
            username,
            domain,
            server_challenge,
            client_blob,
            response,
        } => {
            let loaded =
                load_for_protocol(engine, request, username, hash_list, AlgorithmMask::NT, session)?;
            let nt = field16(loaded.blob.nt())?;
            ntlm::verify_ntlmv2(&nt, username, domain, server_challenge, client_blob, response)?;
            Ok(AuthOutcome::empty())
        }
        ParsedRequest::MsChap {
            username,
            auth_challenge,
            peer_challenge,
            response,
        } => {
            let loaded =
                load_for_protocol(engine, request, username, hash_list, AlgorithmMask::NT, session)?;
            let nt = field16(loaded.blob.nt())?;
            let authenticator =
                mschap::verify(&nt, auth_challenge, peer_challenge, response, username)?;
            Ok(AuthOutcome::with_output(authenticator.into_bytes()))
        }
        ParsedRequest::Cram {
            username,
            challenge,
            response_hex,
        } => {
            let loaded = load_for_protocol(
                engine,
                request,
                username,
                hash_list,
                AlgorithmMask::CRAM_MD5,
                session,
            )?;
            let material = loaded.blob.cram().ok_or(AuthStatus::AuthFailed)?;
            cram::verify(material, challenge, response_hex)?;
            Ok(AuthOutcome::empty())
        }
        ParsedRequest::Apop {
            username,
            challenge,
            response_hex,
        } => {
            let loaded = load_for_protocol(
                engine,
                request,
                username,
                hash_list,
                AlgorithmMask::RECOVERABLE,
                session,
            )?;
            let password = recoverable(&loaded.blob)?;
            apop::verify(&password, challenge, response_hex)?;
            Ok(AuthOutcome::empty())
        }
        ParsedRequest::DigestStart { username } => {
            let loaded = load_for_protocol(
                engine,
                request,
                username,
                hash_list,
                AlgorithmMask::RECOVERABLE,
                session,
            )?;
            // Fail round one already if the plaintext cannot be recovered.
            drop(recoverable(&loaded.blob)?);

            let mut raw = [0u8; 16];
            rand::rng().fill(&mut raw[..]);
            let nonce = hex::encode(raw);
            let challenge = format!(
                "nonce=\"{nonce}\",qop=\"auth\",algorithm=md5-sess,charset=utf-8"
            );
            let token = engine.continuations().insert(Continuation::DigestMd5 {
                username: (*username).to_string(),
                nonce,
            });
            Ok(AuthOutcome {
                output: challenge.into_bytes(),
                continuation: Some(token),
                updated_authority: None,
            })
        }
        ParsedRequest::DigestFinish { username, response } => {
            let token = request.continuation.ok_or(AuthStatus::ContinueDataBad)?;
            let Some(Continuation::DigestMd5 {
                username: started_for,
                nonce,
            }) = engine.continuations().take(&token)
            else {
                return Err(AuthStatus::ContinueDataBad);
            };
            if started_for != *username {
                return Err(AuthStatus::ContinueDataBad);
            }
            let loaded = load_for_protocol(
                engine,
                request,
                username,
                hash_list,
                AlgorithmMask::RECOVERABLE,
                session,
            )?;
            let password = recoverable(&loaded.blob)?;
            let fields = digest_md5::DigestResponse::parse(response)?;
            let rspauth = digest_md5::verify_mutual(&password, &fields, &nonce)?;
            Ok(AuthOutcome::with_output(rspauth.into_bytes()))
        }
        ParsedRequest::Pptp {
            username,
            nt_response,
        } => {
            let loaded =
                load_for_protocol(engine, request, username, hash_list, AlgorithmMask::NT, session)?;
            let nt = field16(loaded.blob.nt())?;
            let (send, recv) = mppe::server_session_keys(&nt, nt_response)?;
            let mut output = Vec::with_capacity(32);
            output.extend_from_slice(&send);
            output.extend_from_slice(&recv);
            Ok(AuthOutcome::with_output(output))
        }
        ParsedRequest::Workstation {
            username,
            client_challenge,
            server_challenge,
        } => {
            let loaded =
                load_for_protocol(engine, request, username, hash_list, AlgorithmMask::NT, session)?;
            let nt = field16(loaded.blob.nt())?;
            let output = if request.method == AuthMethod::SecureWorkstationKey {
                netlogon::strong_session_key(&nt, client_challenge, server_challenge)?.to_vec()
            } else {
                netlogon::legacy_session_key(&nt, client_challenge, server_challenge)?.to_vec()
            };
            Ok(AuthOutcome::with_output(output))
        }
        ParsedRequest::GlobalGet | ParsedRequest::GlobalSet { .. } | ParsedRequest::Release => {
            Err(AuthStatus::AuthMethodNotSupported)
        }
    }
}

/// Verifies `password` against the stored credential and returns the
/// stored blob for callers that need it afterwards.
///
/// Comparison runs over the intersection of the effective mask and the
/// populated fields; an empty intersection can never verify. A successful
/// verify against a legacy-length or legacy-named record opportunistically
/// rewrites it in current form.
fn verify_cleartext(
    engine: &Engine,
    request: &AuthRequest<'_>,
    username: &str,
    password: &str,
    hash_list: &str,
    session: &mut Option<Session>,
) -> AuthResult<CredentialBlob> {
    let loaded = require(open(engine, username, request.record_id, session)?)?;
    let effective = effective_mask(engine, hash_list, request.allowed_mask)?;
    let comparison = effective.intersect(loaded.blob.populated_mask());
    if comparison.is_empty() {
        debug!(username, "no comparable credential fields");
        return Err(AuthStatus::AuthFailed);
    }

    let candidate = generate_hashes(
        password,
        comparison,
        loaded.blob.salted_sha1_salt(),
        engine.config().lan_manager_enabled,
    )?;
    if !hashes_equal(&loaded.blob.restricted_to(comparison), &candidate) {
        return Err(AuthStatus::AuthFailed);
    }

    if loaded.blob.is_legacy() || loaded.from_legacy_path {
        upgrade_stored_format(engine, request, username, password, hash_list, &loaded.blob);
    }
    Ok(loaded.blob)
}

/// Rewrites a verified legacy record in current form, preserving the
/// stored NT field. Failures are logged and swallowed; the verify already
/// succeeded.
fn upgrade_stored_format(
    engine: &Engine,
    request: &AuthRequest<'_>,
    username: &str,
    password: &str,
    hash_list: &str,
    stored: &CredentialBlob,
) {
    let mask = match record_mask(engine, hash_list) {
        Ok(mask) => mask,
        Err(_) => return,
    };
    match generate_hashes(password, mask, None, engine.config().lan_manager_enabled) {
        Ok(mut full) => {
            if let Ok(nt) = field16(stored.nt()) {
                full.set_nt(&nt);
            }
            debug!(username, "upgrading legacy credential format");
            if let Err(err) = engine.store().store(username, request.record_id, &full) {
                warn!(username, error = %err, "legacy credential not upgraded");
            }
        }
        Err(err) => warn!(username, error = %err, "legacy upgrade skipped"),
    }
}

/// Quality-checks a replacement password against the merged policy and
/// the reuse history. The current salted-SHA1 field counts as the most
/// recent history entry.
fn check_quality(
    engine: &Engine,
    request: &AuthRequest<'_>,
    username: &str,
    candidate: &str,
    prior: &CredentialBlob,
    session: &Option<Session>,
) -> AuthResult<()> {
    let policy = session
        .as_ref()
        .map_or_else(|| engine.merged_policy(request.record_id), |s| s.policy.clone());

    let mut history = engine
        .store()
        .load_history(request.record_id)
        .unwrap_or_else(|err| {
            warn!(username, error = %err, "password history unreadable");
            Vec::new()
        });
    if policy.using_history.unwrap_or(0) > 0 {
        if let Some(entry) = salted_entry(prior) {
            history.insert(0, entry);
        }
    }

    check_password(&policy, username, candidate, &history)?;
    Ok(())
}

/// Generates and stores a new credential for `new_password`.
///
/// Updates the session's modification bookkeeping, appends the prior
/// salted-SHA1 entry to the reuse history and notifies the realm-sync
/// collaborator. History and realm failures are logged, not fatal.
pub(crate) fn establish(
    engine: &Engine,
    request: &AuthRequest<'_>,
    username: &str,
    new_password: &str,
    hash_list: &str,
    prior: Option<&CredentialBlob>,
    session: &mut Option<Session>,
) -> AuthResult<()> {
    let mask = record_mask(engine, hash_list)?;
    let blob = generate_hashes(new_password, mask, None, engine.config().lan_manager_enabled)?;
    engine.store().store(username, request.record_id, &blob)?;

    if session.is_none() {
        *session = Some(fresh_session(engine, username, request.record_id));
    }
    if let Some(session) = session.as_mut() {
        let now = engine.clock().now_unix();
        session.state.password_modified_at = now;
        session.state.new_password_required = false;

        let depth = session.policy.using_history.unwrap_or(0) as usize;
        if depth > 0 {
            if let Some(entry) = prior.and_then(salted_entry) {
                if let Err(err) = engine.store().push_history(request.record_id, entry, depth) {
                    warn!(username, error = %err, "password history not updated");
                }
            }
        }
    }

    if !request.auth_only {
        notify_realm(engine, username, new_password);
    }
    Ok(())
}

/// Tells the realm about a changed secret; a node without a realm skips
/// this silently.
fn notify_realm(engine: &Engine, username: &str, new_password: &str) {
    match engine.realm_name() {
        Ok(realm) => {
            if let Err(err) = engine
                .realm_sync()
                .upsert_principal(username, new_password, &realm)
            {
                warn!(username, realm, error = %err, "realm principal not updated");
            }
        }
        Err(_) => debug!(username, "no realm configured, principal not synchronized"),
    }
}

fn policy_get(engine: &Engine, request: &AuthRequest<'_>) -> AuthResult<AuthOutcome> {
    let text = match request.method {
        AuthMethod::GetEffectivePolicy => engine.merged_policy(request.record_id).render(),
        _ => engine
            .store()
            .load_policy(request.record_id)
            .map_err(AuthStatus::from)?
            .unwrap_or_default(),
    };
    Ok(AuthOutcome::with_output(text.into_bytes()))
}

fn policy_set(engine: &Engine, request: &AuthRequest<'_>, policy: &str) -> AuthResult<AuthOutcome> {
    // SetPolicyAsRoot privilege is enforced before dispatch; the plain
    // variant still requires administrator rights over the record.
    if request.method == AuthMethod::SetPolicy
        && !(request.caller_is_admin || request.effective_uid == 0)
    {
        return Err(AuthStatus::PermissionError);
    }
    let validated = dn_policy::PolicyText::parse(policy)?;
    engine
        .store()
        .store_policy(request.record_id, &validated.render())
        .map_err(AuthStatus::from)?;
    Ok(AuthOutcome::empty())
}

/// Loads the credential and opens the call's session.
///
/// A missing credential is not an error here; establishment paths
/// tolerate it. When no companion state file existed, the credential
/// file's modification time stands in for the password-set time.
fn open(
    engine: &Engine,
    username: &str,
    record_id: &str,
    session: &mut Option<Session>,
) -> AuthResult<Option<Loaded>> {
    let now = engine.clock().now_unix();
    match engine.store().load(username, record_id, now) {
        Ok(loaded) => {
            let mut state = loaded.state;
            if loaded.state_snapshot == AccountState::new(now).to_bytes() {
                state.password_modified_at = loaded.mod_time;
            }
            *session = Some(Session {
                username: username.to_string(),
                record_id: record_id.to_string(),
                state,
                snapshot: loaded.state_snapshot,
                policy: engine.merged_policy(record_id),
            });
            Ok(Some(Loaded {
                blob: loaded.blob,
                from_legacy_path: loaded.from_legacy_path,
            }))
        }
        Err(dn_store::StoreError::NotFound) => {
            *session = Some(fresh_session(engine, username, record_id));
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

fn fresh_session(engine: &Engine, username: &str, record_id: &str) -> Session {
    let now = engine.clock().now_unix();
    let state = AccountState::new(now);
    Session {
        username: username.to_string(),
        record_id: record_id.to_string(),
        snapshot: state.to_bytes(),
        state,
        policy: engine.merged_policy(record_id),
    }
}

fn require(loaded: Option<Loaded>) -> AuthResult<Loaded> {
    loaded.ok_or(AuthStatus::NotFound)
}

/// Loads for a challenge/response protocol: the credential must exist and
/// the effective mask must allow the algorithm class the protocol needs.
fn load_for_protocol(
    engine: &Engine,
    request: &AuthRequest<'_>,
    username: &str,
    hash_list: &str,
    required: AlgorithmMask,
    session: &mut Option<Session>,
) -> AuthResult<Loaded> {
    let effective = effective_mask(engine, hash_list, request.allowed_mask)?;
    if !effective.contains(required) {
        return Err(AuthStatus::AuthMethodNotSupported);
    }
    require(open(engine, username, request.record_id, session)?)
}

/// The record's configured mask: its own allow-list else the node
/// default, with LAN Manager gated by node configuration.
fn record_mask(engine: &Engine, hash_list: &str) -> AuthResult<AlgorithmMask> {
    let mask = if hash_list.trim().is_empty() {
        engine.default_mask()
    } else {
        AlgorithmMask::parse_hash_list(hash_list).map_err(AuthStatus::from)?
    };
    Ok(if engine.config().lan_manager_enabled {
        mask
    } else {
        mask.without(AlgorithmMask::LM)
    })
}

/// The record mask further narrowed by the caller's restriction.
fn effective_mask(
    engine: &Engine,
    hash_list: &str,
    allowed: Option<AlgorithmMask>,
) -> AuthResult<AlgorithmMask> {
    let mask = record_mask(engine, hash_list)?;
    Ok(match allowed {
        Some(allowed) => mask.intersect(allowed),
        None => mask,
    })
}

fn field16(field: &[u8]) -> AuthResult<[u8; 16]> {
    if field.iter().all(|&b| b == 0) {
        return Err(AuthStatus::AuthFailed);
    }
    Ok(field.try_into().expect("fixed-width credential field"))
}

fn recoverable(blob: &CredentialBlob) -> AuthResult<zeroize::Zeroizing<String>> {
    let field = blob.recoverable().ok_or(AuthStatus::AuthFailed)?;
    Ok(recover_password(field)?)
}

fn salted_entry(blob: &CredentialBlob) -> Option<[u8; SALTED_LEN]> {
    let field = blob.salted_sha1()?;
    if field.iter().all(|&b| b == 0) {
        return None;
    }
    Some(field.try_into().expect("fixed-width credential field"))
}
