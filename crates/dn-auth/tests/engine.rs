//! End-to-end engine tests over a real on-disk store, a fake clock and
//! scripted collaborators.

use std::collections::HashMap;
use std::sync::Arc;

use dn_auth::clock::{Clock, FakeClock};
use dn_auth::collaborators::{Reachability, RealmError, RealmSync, RemoteAuthNode, RemoteError};
use dn_auth::engine::{AuthOutcome, AuthRequest, Collaborators, Engine};
use dn_auth::request::append_item;
use dn_core::{AuthMethod, AuthResult, AuthStatus, NodeConfig};
use dn_crypto::hashes::nt_hash;
use dn_crypto::{blob, generate_hashes, AlgorithmMask, CredentialBlob};
use parking_lot::Mutex;
use tempfile::TempDir;

struct TestNode {
    _dir: TempDir,
    engine: Engine,
    clock: Arc<FakeClock>,
}

fn node() -> TestNode {
    node_with(|_| {}, Collaborators::default())
}

fn node_with(
    tweak: impl FnOnce(&mut NodeConfig),
    mut collaborators: Collaborators,
) -> TestNode {
    let dir = TempDir::new().unwrap();
    let mut config = NodeConfig {
        credential_root: dir.path().to_path_buf(),
        ..NodeConfig::default()
    };
    tweak(&mut config);
    let clock = Arc::new(FakeClock::at(1_700_000_000));
    collaborators.clock = clock.clone();
    let engine = Engine::new(config, collaborators).unwrap();
    TestNode {
        _dir: dir,
        engine,
        clock,
    }
}

fn buf(items: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for item in items {
        append_item(&mut out, item);
    }
    out
}

fn authority(entries: &[&str]) -> Vec<String> {
    entries.iter().map(|e| (*e).to_string()).collect()
}

fn seed(engine: &Engine, username: &str, record_id: &str, password: &str, list: &str) {
    let mask = AlgorithmMask::parse_hash_list(list).unwrap();
    let blob = generate_hashes(password, mask, None, false).unwrap();
    engine.store().store(username, record_id, &blob).unwrap();
}

fn call(
    node: &TestNode,
    method: AuthMethod,
    authority: &[String],
    record_id: &str,
    buffer: &[u8],
    attrs: &HashMap<String, String>,
) -> AuthResult<AuthOutcome> {
    let request = AuthRequest::new(method, authority, record_id, buffer, attrs);
    node.engine.authenticate(&request)
}

fn verify(
    node: &TestNode,
    authority: &[String],
    record_id: &str,
    username: &str,
    password: &str,
) -> AuthResult<AuthOutcome> {
    let attrs = HashMap::new();
    let buffer = buf(&[username.as_bytes(), password.as_bytes()]);
    call(
        node,
        AuthMethod::VerifyPassword,
        authority,
        record_id,
        &buffer,
        &attrs,
    )
}

const SHADOW: &str = ";1;ShadowHash;HASHLIST:<SMB-NT,SALTED-SHA1>";

#[test]
fn verify_accepts_the_right_password_only() {
    let node = node();
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT,SALTED-SHA1>");
    let auth = authority(&[SHADOW]);

    assert!(verify(&node, &auth, "rec-alice", "alice", "Secret1").is_ok());
    assert_eq!(
        verify(&node, &auth, "rec-alice", "alice", "secret1").unwrap_err(),
        AuthStatus::AuthFailed
    );
}

#[test]
fn password_length_edge() {
    let node = node();
    let long = "a".repeat(511);
    seed(&node.engine, "alice", "rec-alice", &long, "HASHLIST:<SMB-NT,SALTED-SHA1>");
    let auth = authority(&[SHADOW]);

    assert!(verify(&node, &auth, "rec-alice", "alice", &long).is_ok());

    // One byte past the cap fails before any comparison happens: wiping
    // the credential file does not change the status.
    node.engine.store().remove("alice", "rec-alice", true);
    let too_long = "a".repeat(512);
    assert_eq!(
        verify(&node, &auth, "rec-alice", "alice", &too_long).unwrap_err(),
        AuthStatus::PasswordTooLong
    );
}

#[test]
fn missing_record_is_not_found() {
    let node = node();
    let auth = authority(&[SHADOW]);
    assert_eq!(
        verify(&node, &auth, "rec-ghost", "ghost", "x").unwrap_err(),
        AuthStatus::NotFound
    );
}

#[test]
fn caller_mask_restriction_can_empty_the_intersection() {
    let node = node();
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT>");
    let auth = authority(&[SHADOW]);
    let attrs = HashMap::new();
    let buffer = buf(&[b"alice", b"Secret1"]);

    let mut request = AuthRequest::new(
        AuthMethod::VerifyPassword,
        &auth,
        "rec-alice",
        &buffer,
        &attrs,
    );
    request.allowed_mask = Some(AlgorithmMask::SALTED_SHA1);
    assert_eq!(
        node.engine.authenticate(&request).unwrap_err(),
        AuthStatus::AuthFailed
    );
}

#[test]
fn legacy_blob_is_upgraded_on_successful_verify() {
    let node = node();
    let mut legacy = vec![0u8; blob::LEGACY_LEN];
    legacy[..16].copy_from_slice(&nt_hash("Secret1"));
    let legacy = CredentialBlob::from_bytes(legacy).unwrap();
    node.engine.store().store("alice", "rec-alice", &legacy).unwrap();

    let auth = authority(&[SHADOW]);
    assert!(verify(&node, &auth, "rec-alice", "alice", "Secret1").is_ok());

    let upgraded = node
        .engine
        .store()
        .load("alice", "rec-alice", node.clock.now_unix())
        .unwrap()
        .blob;
    assert_eq!(upgraded.len(), blob::CURRENT_LEN);
    assert_eq!(upgraded.nt(), &nt_hash("Secret1")[..]);
    assert!(upgraded.salted_sha1().unwrap().iter().any(|&b| b != 0));
}

#[test]
fn legacy_username_file_moves_to_stable_id() {
    let node = node();
    let mask = AlgorithmMask::parse_hash_list("HASHLIST:<SMB-NT,SALTED-SHA1>").unwrap();
    let blob = generate_hashes("Secret1", mask, None, false).unwrap();
    std::fs::write(
        node.engine.store().root().join("alice"),
        hex::encode(blob.as_bytes()),
    )
    .unwrap();

    let auth = authority(&[SHADOW]);
    assert!(verify(&node, &auth, "rec-alice", "alice", "Secret1").is_ok());
    assert!(node.engine.store().root().join("rec-alice").is_file());
    assert!(!node.engine.store().root().join("alice").exists());
}

#[test]
fn change_password_enforces_policy_and_history() {
    let node = node();
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT,SALTED-SHA1>");
    node.engine
        .store()
        .store_policy("rec-alice", "minChars=6 usingHistory=2")
        .unwrap();
    let auth = authority(&[SHADOW]);
    let attrs = HashMap::new();

    let too_short = buf(&[b"alice", b"Secret1", b"abc"]);
    assert_eq!(
        call(&node, AuthMethod::ChangePassword, &auth, "rec-alice", &too_short, &attrs)
            .unwrap_err(),
        AuthStatus::PasswordTooShort
    );

    let change = buf(&[b"alice", b"Secret1", b"Secret2"]);
    assert!(call(&node, AuthMethod::ChangePassword, &auth, "rec-alice", &change, &attrs).is_ok());
    assert!(verify(&node, &auth, "rec-alice", "alice", "Secret2").is_ok());

    // Reusing the previous password violates the history rule.
    let back = buf(&[b"alice", b"Secret2", b"Secret1"]);
    assert_eq!(
        call(&node, AuthMethod::ChangePassword, &auth, "rec-alice", &back, &attrs).unwrap_err(),
        AuthStatus::PolicyViolation
    );
}

#[test]
fn set_as_root_requires_privilege_and_skips_quality_checks() {
    let node = node();
    node.engine
        .store()
        .store_policy("rec-alice", "minChars=12")
        .unwrap();
    let auth = authority(&[SHADOW]);
    let attrs = HashMap::new();
    let buffer = buf(&[b"alice", b"tiny"]);

    assert_eq!(
        call(&node, AuthMethod::SetPasswordAsRoot, &auth, "rec-alice", &buffer, &attrs)
            .unwrap_err(),
        AuthStatus::PermissionError
    );

    let mut request = AuthRequest::new(
        AuthMethod::SetPasswordAsRoot,
        &auth,
        "rec-alice",
        &buffer,
        &attrs,
    );
    request.caller_is_admin = true;
    assert!(node.engine.authenticate(&request).is_ok());
    assert!(verify(&node, &auth, "rec-alice", "alice", "tiny").is_ok());
}

#[test]
fn lockout_disables_after_threshold_failures() {
    let node = node();
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT,SALTED-SHA1>");
    node.engine
        .store()
        .store_policy("rec-alice", "maxFailedLoginAttempts=3")
        .unwrap();
    let auth = authority(&[SHADOW]);

    for _ in 0..2 {
        assert_eq!(
            verify(&node, &auth, "rec-alice", "alice", "wrong").unwrap_err(),
            AuthStatus::AuthFailed
        );
    }
    // Crossing the threshold upgrades the failure.
    assert_eq!(
        verify(&node, &auth, "rec-alice", "alice", "wrong").unwrap_err(),
        AuthStatus::AccountDisabled
    );
    // Even the right password no longer gets in.
    assert_eq!(
        verify(&node, &auth, "rec-alice", "alice", "Secret1").unwrap_err(),
        AuthStatus::AccountDisabled
    );
}

#[test]
fn success_resets_the_failure_counter() {
    let node = node();
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT,SALTED-SHA1>");
    node.engine
        .store()
        .store_policy("rec-alice", "maxFailedLoginAttempts=3")
        .unwrap();
    let auth = authority(&[SHADOW]);

    for _ in 0..2 {
        let _ = verify(&node, &auth, "rec-alice", "alice", "wrong");
    }
    assert!(verify(&node, &auth, "rec-alice", "alice", "Secret1").is_ok());
    // The earlier failures no longer count toward the threshold.
    for _ in 0..2 {
        assert_eq!(
            verify(&node, &auth, "rec-alice", "alice", "wrong").unwrap_err(),
            AuthStatus::AuthFailed
        );
    }
    assert!(verify(&node, &auth, "rec-alice", "alice", "Secret1").is_ok());
}

#[test]
fn sixth_rapid_failure_is_throttled() {
    let node = node();
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT,SALTED-SHA1>");
    let auth = authority(&[SHADOW]);

    for _ in 0..5 {
        let _ = verify(&node, &auth, "rec-alice", "alice", "wrong");
    }
    assert!(node.clock.sleeps().is_empty());

    let _ = verify(&node, &auth, "rec-alice", "alice", "wrong");
    let sleeps = node.clock.sleeps();
    assert_eq!(sleeps.len(), 1);
    assert!(sleeps[0].as_secs() >= 2);
}

#[test]
fn quiet_gap_resets_the_throttle_streak() {
    let node = node();
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT,SALTED-SHA1>");
    let auth = authority(&[SHADOW]);

    for _ in 0..5 {
        let _ = verify(&node, &auth, "rec-alice", "alice", "wrong");
    }
    node.clock.advance(121);
    let _ = verify(&node, &auth, "rec-alice", "alice", "wrong");
    assert!(node.clock.sleeps().is_empty());
}

#[test]
fn smb_nt_challenge_response() {
    let node = node();
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT,SALTED-SHA1>");
    let auth = authority(&[SHADOW]);
    let attrs = HashMap::new();

    let challenge = [0x11u8; 8];
    let response = dn_crypto::ntlm::p24_response(&nt_hash("Secret1"), &challenge);
    let buffer = buf(&[b"alice", &challenge, &response]);
    assert!(call(&node, AuthMethod::SmbNtKey, &auth, "rec-alice", &buffer, &attrs).is_ok());

    let bad = dn_crypto::ntlm::p24_response(&nt_hash("wrong"), &challenge);
    let buffer = buf(&[b"alice", &challenge, &bad]);
    assert_eq!(
        call(&node, AuthMethod::SmbNtKey, &auth, "rec-alice", &buffer, &attrs).unwrap_err(),
        AuthStatus::AuthFailed
    );
}

#[test]
fn lan_manager_is_refused_while_disabled() {
    let node = node();
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT,SMB-LAN-MANAGER>");
    let auth = authority(&[";1;ShadowHash;HASHLIST:<SMB-NT,SMB-LAN-MANAGER>"]);
    let attrs = HashMap::new();

    let buffer = buf(&[b"alice", &[0u8; 8], &[0u8; 24]]);
    assert_eq!(
        call(&node, AuthMethod::SmbLmKey, &auth, "rec-alice", &buffer, &attrs).unwrap_err(),
        AuthStatus::AuthMethodNotSupported
    );
}

#[test]
fn mschap_v2_returns_the_rfc_authenticator() {
    let node = node();
    seed(&node.engine, "User", "rec-user", "clientPass", "HASHLIST:<SMB-NT>");
    let auth = authority(&[";1;ShadowHash;HASHLIST:<SMB-NT>"]);
    let attrs = HashMap::new();

    // RFC 2759 §9.2 worked example.
    let auth_challenge = [
        0x5B, 0x5D, 0x7C, 0x7D, 0x7B, 0x3F, 0x2F, 0x3E, 0x3C, 0x2C, 0x60, 0x21, 0x32, 0x26,
        0x26, 0x28,
    ];
    let peer_challenge = [
        0x21, 0x40, 0x23, 0x24, 0x25, 0x5E, 0x26, 0x2A, 0x28, 0x29, 0x5F, 0x2B, 0x3A, 0x33,
        0x7C, 0x7E,
    ];
    let response = [
        0x82, 0x30, 0x9E, 0xCD, 0x8D, 0x70, 0x8B, 0x5E, 0xA0, 0x8F, 0xAA, 0x39, 0x81, 0xCD,
        0x83, 0x54, 0x42, 0x33, 0x11, 0x4A, 0x3D, 0x85, 0xD6, 0xDF,
    ];
    let buffer = buf(&[b"User", &auth_challenge, &peer_challenge, &response]);
    let outcome =
        call(&node, AuthMethod::MsChapV2, &auth, "rec-user", &buffer, &attrs).unwrap();
    assert_eq!(
        outcome.output,
        b"S=407A5589115FD0D6209F510FE9C04566932CDA56".to_vec()
    );
}

#[test]
fn cram_md5_round_trip() {
    let node = node();
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT,CRAM-MD5>");
    let auth = authority(&[";1;ShadowHash;HASHLIST:<SMB-NT,CRAM-MD5>"]);
    let attrs = HashMap::new();

    let material = dn_crypto::cram::derive_key_material(b"Secret1");
    let challenge = b"<1896.697170952@postoffice.example.net>";
    let response = dn_crypto::cram::respond(&material, challenge);
    let buffer = buf(&[b"alice", challenge, response.as_bytes()]);
    assert!(call(&node, AuthMethod::CramMd5, &auth, "rec-alice", &buffer, &attrs).is_ok());
}

#[test]
fn ntlmv2_checks_the_response_mac() {
    let node = node();
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT>");
    let auth = authority(&[";1;ShadowHash;HASHLIST:<SMB-NT>"]);
    let attrs = HashMap::new();

    let server_challenge = [0x22u8; 8];
    let client_blob = b"client-blob-with-timestamp";
    let mac = dn_crypto::ntlm::ntlmv2_response(
        &nt_hash("Secret1"),
        "alice",
        "WORKGROUP",
        &server_challenge,
        client_blob,
    );
    let buffer = buf(&[b"alice", b"WORKGROUP", &server_challenge, client_blob, &mac]);
    assert!(call(&node, AuthMethod::Ntlmv2, &auth, "rec-alice", &buffer, &attrs).is_ok());

    // The domain is part of the keyed identity, so a mismatch fails.
    let buffer = buf(&[b"alice", b"OTHERDOMAIN", &server_challenge, client_blob, &mac]);
    assert_eq!(
        call(&node, AuthMethod::Ntlmv2, &auth, "rec-alice", &buffer, &attrs).unwrap_err(),
        AuthStatus::AuthFailed
    );
}

#[test]
fn apop_serves_records_with_a_recoverable_password() {
    let node = node();
    seed(
        &node.engine,
        "alice",
        "rec-alice",
        "tanstaaf",
        "HASHLIST:<SMB-NT,RECOVERABLE>",
    );
    let auth = authority(&[";1;ShadowHash;HASHLIST:<SMB-NT,RECOVERABLE>"]);
    let attrs = HashMap::new();

    // RFC 1939 §7 worked example.
    let challenge = b"<1896.697170952@dbc.mtview.ca.us>";
    let buffer = buf(&[b"alice", challenge, b"c4c9334bac560ecc979e58001b3e22fb"]);
    assert!(call(&node, AuthMethod::Apop, &auth, "rec-alice", &buffer, &attrs).is_ok());

    let buffer = buf(&[b"alice", challenge, b"00000000000000000000000000000000"]);
    assert_eq!(
        call(&node, AuthMethod::Apop, &auth, "rec-alice", &buffer, &attrs).unwrap_err(),
        AuthStatus::AuthFailed
    );
}

#[test]
fn pptp_returns_the_session_key_pair() {
    let node = node();
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT>");
    let auth = authority(&[";1;ShadowHash;HASHLIST:<SMB-NT>"]);
    let attrs = HashMap::new();

    let nt_response = [0x33u8; 24];
    let (send, recv) =
        dn_crypto::mppe::server_session_keys(&nt_hash("Secret1"), &nt_response).unwrap();

    let buffer = buf(&[b"alice", &nt_response]);
    let outcome =
        call(&node, AuthMethod::PptpMasterKeys, &auth, "rec-alice", &buffer, &attrs).unwrap();
    assert_eq!(outcome.output[..16], send);
    assert_eq!(outcome.output[16..], recv);
}

#[test]
fn workstation_key_strengths_differ() {
    let node = node();
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT>");
    let auth = authority(&[";1;ShadowHash;HASHLIST:<SMB-NT>"]);
    let attrs = HashMap::new();

    let client = [0x44u8; 8];
    let server = [0x55u8; 8];
    let buffer = buf(&[b"alice", &client, &server]);

    let legacy =
        call(&node, AuthMethod::WorkstationKey, &auth, "rec-alice", &buffer, &attrs).unwrap();
    assert_eq!(
        legacy.output,
        dn_crypto::netlogon::legacy_session_key(&nt_hash("Secret1"), &client, &server)
            .unwrap()
            .to_vec()
    );

    let strong = call(
        &node,
        AuthMethod::SecureWorkstationKey,
        &auth,
        "rec-alice",
        &buffer,
        &attrs,
    )
    .unwrap();
    assert_eq!(
        strong.output,
        dn_crypto::netlogon::strong_session_key(&nt_hash("Secret1"), &client, &server)
            .unwrap()
            .to_vec()
    );
}

#[test]
fn digest_md5_needs_the_recoverable_field() {
    let node = node();
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT>");
    let auth = authority(&[";1;ShadowHash;HASHLIST:<SMB-NT>"]);
    let attrs = HashMap::new();

    let buffer = buf(&[b"alice"]);
    assert_eq!(
        call(&node, AuthMethod::DigestMd5, &auth, "rec-alice", &buffer, &attrs).unwrap_err(),
        AuthStatus::AuthMethodNotSupported
    );
}

#[test]
fn digest_md5_round_one_parks_a_continuation() {
    let node = node();
    seed(
        &node.engine,
        "alice",
        "rec-alice",
        "Secret1",
        "HASHLIST:<SMB-NT,RECOVERABLE>",
    );
    let auth = authority(&[";1;ShadowHash;HASHLIST:<SMB-NT,RECOVERABLE>"]);
    let attrs = HashMap::new();

    let buffer = buf(&[b"alice"]);
    let outcome =
        call(&node, AuthMethod::DigestMd5, &auth, "rec-alice", &buffer, &attrs).unwrap();
    let token = outcome.continuation.expect("round one parks state");
    let challenge = String::from_utf8(outcome.output).unwrap();
    assert!(challenge.contains("nonce=\""));
    assert_eq!(node.engine.pending_continuations(), 1);

    // A garbage second round consumes the token and fails the exchange.
    let response = b"username=\"alice\",realm=\"r\",nonce=\"x\",cnonce=\"y\",nc=00000001,\
qop=auth,digest-uri=\"imap/r\",response=00000000000000000000000000000000";
    let buffer = buf(&[b"alice", response]);
    let mut request = AuthRequest::new(
        AuthMethod::DigestMd5,
        &auth,
        "rec-alice",
        &buffer,
        &attrs,
    );
    request.continuation = Some(token);
    assert!(node.engine.authenticate(&request).is_err());
    assert_eq!(node.engine.pending_continuations(), 0);
}

#[test]
fn releasing_an_unknown_continuation_fails() {
    let node = node();
    let attrs = HashMap::new();
    let auth = authority(&[SHADOW]);
    let mut request = AuthRequest::new(
        AuthMethod::ReleaseContinuation,
        &auth,
        "rec-alice",
        &[],
        &attrs,
    );
    request.continuation = Some(uuid::Uuid::new_v4());
    assert_eq!(
        node.engine.authenticate(&request).unwrap_err(),
        AuthStatus::ContinueDataBad
    );
}

#[test]
fn disabled_wrapper_blocks_everything_outside_the_allow_list() {
    let node = node();
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT,SALTED-SHA1>");
    let auth = authority(&[";1;DisabledUser;;ShadowHash;"]);
    let attrs = HashMap::new();

    assert_eq!(
        verify(&node, &auth, "rec-alice", "alice", "Secret1").unwrap_err(),
        AuthStatus::AccountDisabled
    );
    let change = buf(&[b"alice", b"Secret1", b"Other2"]);
    assert_eq!(
        call(&node, AuthMethod::ChangePassword, &auth, "rec-alice", &change, &attrs)
            .unwrap_err(),
        AuthStatus::AccountDisabled
    );

    // Policy reads pass through to the wrapped variant.
    let read = buf(&[b"alice"]);
    assert!(call(&node, AuthMethod::GetPolicy, &auth, "rec-alice", &read, &attrs).is_ok());

    // So does the privileged recovery set.
    let set = buf(&[b"alice", b"Rescue1"]);
    let mut request = AuthRequest::new(
        AuthMethod::SetPasswordAsRoot,
        &auth,
        "rec-alice",
        &set,
        &attrs,
    );
    request.caller_is_admin = true;
    assert!(node.engine.authenticate(&request).is_ok());

    let enabled = authority(&[SHADOW]);
    assert!(verify(&node, &enabled, "rec-alice", "alice", "Rescue1").is_ok());
}

#[test]
fn basic_record_migrates_on_first_success() {
    let node = node();
    let salt = [1u8, 2, 3, 4];
    let secret = hex::encode(dn_crypto::hashes::salted_sha1("Secret1", salt));
    let mut attrs = HashMap::new();
    attrs.insert("password".to_string(), secret);

    // No authority attribute at all selects the Basic path.
    let auth: Vec<String> = Vec::new();
    let buffer = buf(&[b"alice", b"Secret1"]);
    let outcome = call(
        &node,
        AuthMethod::VerifyPassword,
        &auth,
        "rec-alice",
        &buffer,
        &attrs,
    )
    .unwrap();
    assert_eq!(
        outcome.updated_authority,
        Some(vec![";1;ShadowHash;".to_string()])
    );

    // The migrated credential now answers on the ShadowHash path.
    let migrated = authority(&[";1;ShadowHash;"]);
    assert!(verify(&node, &migrated, "rec-alice", "alice", "Secret1").is_ok());
}

#[test]
fn basic_record_rejects_the_wrong_password() {
    let node = node();
    let salt = [1u8, 2, 3, 4];
    let secret = hex::encode(dn_crypto::hashes::salted_sha1("Secret1", salt));
    let mut attrs = HashMap::new();
    attrs.insert("password".to_string(), secret);

    let auth: Vec<String> = Vec::new();
    let buffer = buf(&[b"alice", b"nope"]);
    assert_eq!(
        call(&node, AuthMethod::VerifyPassword, &auth, "rec-alice", &buffer, &attrs)
            .unwrap_err(),
        AuthStatus::AuthFailed
    );
    assert!(node
        .engine
        .store()
        .load("alice", "rec-alice", node.clock.now_unix())
        .is_err());
}

#[test]
fn unrecognized_authority_tags_are_skipped_not_fatal() {
    let node = node();
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT,SALTED-SHA1>");
    let auth = authority(&[";1;SomeFutureTag;opaque", SHADOW]);
    assert!(verify(&node, &auth, "rec-alice", "alice", "Secret1").is_ok());

    let none_recognized = authority(&[";1;SomeFutureTag;opaque"]);
    assert_eq!(
        verify(&node, &none_recognized, "rec-alice", "alice", "Secret1").unwrap_err(),
        AuthStatus::AuthMethodNotSupported
    );
}

#[test]
fn global_policy_round_trip_and_privilege() {
    let node = node();
    let attrs = HashMap::new();
    let auth: Vec<String> = Vec::new();

    let set = buf(&[b"minChars=8"]);
    assert_eq!(
        call(&node, AuthMethod::SetGlobalPolicy, &auth, "", &set, &attrs).unwrap_err(),
        AuthStatus::PermissionError
    );

    let mut request = AuthRequest::new(AuthMethod::SetGlobalPolicy, &auth, "", &set, &attrs);
    request.effective_uid = 0;
    assert!(node.engine.authenticate(&request).is_ok());

    let outcome = call(&node, AuthMethod::GetGlobalPolicy, &auth, "", &[], &attrs).unwrap();
    let text = String::from_utf8(outcome.output).unwrap();
    assert!(text.contains("minChars=8"));
}

#[test]
fn effective_policy_merges_record_over_global() {
    let node = node_with(
        |config| config.global_policy = "minChars=8 requiresNumeric=1".to_string(),
        Collaborators::default(),
    );
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT,SALTED-SHA1>");
    node.engine
        .store()
        .store_policy("rec-alice", "minChars=12")
        .unwrap();
    let attrs = HashMap::new();
    let auth = authority(&[SHADOW]);

    let read = buf(&[b"alice"]);
    let outcome = call(
        &node,
        AuthMethod::GetEffectivePolicy,
        &auth,
        "rec-alice",
        &read,
        &attrs,
    )
    .unwrap();
    let text = String::from_utf8(outcome.output).unwrap();
    assert!(text.contains("minChars=12"));
    assert!(text.contains("requiresNumeric=1"));
}

struct RecordingRealm {
    realm: String,
    ops: Mutex<Vec<String>>,
}

impl RecordingRealm {
    fn new(realm: &str) -> Arc<Self> {
        Arc::new(Self {
            realm: realm.to_string(),
            ops: Mutex::new(Vec::new()),
        })
    }
}

impl RealmSync for RecordingRealm {
    fn local_realm(&self) -> Result<String, RealmError> {
        Ok(self.realm.clone())
    }

    fn upsert_principal(&self, principal: &str, _: &str, realm: &str) -> Result<(), RealmError> {
        self.ops.lock().push(format!("upsert {principal}@{realm}"));
        Ok(())
    }

    fn delete_principal(&self, principal: &str, realm: &str) -> Result<(), RealmError> {
        self.ops.lock().push(format!("delete {principal}@{realm}"));
        Ok(())
    }
}

#[test]
fn kerberos_set_synchronizes_the_principal() {
    let realm = RecordingRealm::new("EXAMPLE.COM");
    let node = node_with(
        |_| {},
        Collaborators {
            realm: realm.clone(),
            ..Collaborators::default()
        },
    );
    let auth = authority(&[";1;Kerberos;alice@EXAMPLE.COM"]);
    let attrs = HashMap::new();
    let set = buf(&[b"alice", b"NewSecret1"]);
    let mut request =
        AuthRequest::new(AuthMethod::SetPasswordAsRoot, &auth, "rec-alice", &set, &attrs);
    request.caller_is_admin = true;
    let outcome = node.engine.authenticate(&request).unwrap();

    assert_eq!(*realm.ops.lock(), vec!["upsert alice@EXAMPLE.COM"]);
    // Principal already matches the username; nothing to rewrite.
    assert!(outcome.updated_authority.is_none());
    assert!(verify(&node, &auth, "rec-alice", "alice", "NewSecret1").is_ok());
}

#[test]
fn kerberos_rename_retires_stale_principals() {
    let realm = RecordingRealm::new("EXAMPLE.COM");
    let node = node_with(
        |_| {},
        Collaborators {
            realm: realm.clone(),
            ..Collaborators::default()
        },
    );
    let auth = authority(&[";1;Kerberos;olduser@EXAMPLE.COM"]);
    let attrs = HashMap::new();
    let set = buf(&[b"alice", b"NewSecret1"]);
    let mut request =
        AuthRequest::new(AuthMethod::SetPasswordAsRoot, &auth, "rec-alice", &set, &attrs);
    request.caller_is_admin = true;
    let outcome = node.engine.authenticate(&request).unwrap();

    assert_eq!(
        *realm.ops.lock(),
        vec![
            "delete olduser@EXAMPLE.COM",
            "delete alice@EXAMPLE.COM",
            "upsert alice@EXAMPLE.COM",
        ]
    );
    assert_eq!(
        outcome.updated_authority,
        Some(vec![";1;Kerberos;alice@EXAMPLE.COM".to_string()])
    );
}

struct ScriptedRemote {
    unreachable: Vec<String>,
    reject: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRemote {
    fn new(unreachable: &[&str], reject: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            unreachable: unreachable.iter().map(|a| (*a).to_string()).collect(),
            reject: reject.iter().map(|a| (*a).to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        })
    }
}

impl RemoteAuthNode for ScriptedRemote {
    fn forward(&self, address: &str, _payload: &[u8]) -> Result<Vec<u8>, RemoteError> {
        self.calls.lock().push(address.to_string());
        if self.unreachable.iter().any(|a| a == address) {
            Err(RemoteError::Unreachable)
        } else if self.reject.iter().any(|a| a == address) {
            Err(RemoteError::Status(AuthStatus::AuthFailed))
        } else {
            Ok(b"remote-ok".to_vec())
        }
    }
}

struct AllReachable;

impl Reachability for AllReachable {
    fn is_reachable(&self, _: &str) -> bool {
        true
    }
}

#[test]
fn password_server_fails_over_exactly_once() {
    let remote = ScriptedRemote::new(&["10.0.0.1"], &[]);
    let node = node_with(
        |_| {},
        Collaborators {
            remote: remote.clone(),
            ..Collaborators::default()
        },
    );
    let auth = authority(&[";1;PasswordServer;0x2a,10.0.0.1,10.0.0.2,10.0.0.3"]);
    let outcome = verify(&node, &auth, "rec-alice", "alice", "Secret1").unwrap();
    assert_eq!(outcome.output, b"remote-ok".to_vec());
    // Primary, then one failover; the third replica is never consulted.
    assert_eq!(*remote.calls.lock(), vec!["10.0.0.1", "10.0.0.2"]);
}

#[test]
fn password_server_passes_remote_statuses_through() {
    let remote = ScriptedRemote::new(&[], &["10.0.0.1"]);
    let node = node_with(
        |_| {},
        Collaborators {
            remote,
            ..Collaborators::default()
        },
    );
    let auth = authority(&[";1;PasswordServer;0x2a,10.0.0.1,10.0.0.2"]);
    assert_eq!(
        verify(&node, &auth, "rec-alice", "alice", "Secret1").unwrap_err(),
        AuthStatus::AuthFailed
    );
}

#[test]
fn cached_user_verifies_two_phase_when_reachable() {
    let remote = ScriptedRemote::new(&[], &[]);
    let node = node_with(
        |_| {},
        Collaborators {
            remote: remote.clone(),
            reachability: Arc::new(AllReachable),
            ..Collaborators::default()
        },
    );
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT,SALTED-SHA1>");
    let auth = authority(&[";1;LocalCachedUser;/LDAPv3/10.0.0.5"]);

    assert!(verify(&node, &auth, "rec-alice", "alice", "Secret1").is_ok());
    assert_eq!(*remote.calls.lock(), vec!["/LDAPv3/10.0.0.5"]);

    // A local mismatch never reaches the network node.
    let _ = verify(&node, &auth, "rec-alice", "alice", "wrong");
    assert_eq!(remote.calls.lock().len(), 1);
}

#[test]
fn cached_user_respects_the_network_verdict() {
    let remote = ScriptedRemote::new(&[], &["/LDAPv3/10.0.0.5"]);
    let node = node_with(
        |_| {},
        Collaborators {
            remote,
            reachability: Arc::new(AllReachable),
            ..Collaborators::default()
        },
    );
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT,SALTED-SHA1>");
    let auth = authority(&[";1;LocalCachedUser;/LDAPv3/10.0.0.5"]);
    assert_eq!(
        verify(&node, &auth, "rec-alice", "alice", "Secret1").unwrap_err(),
        AuthStatus::AuthFailed
    );
}

#[test]
fn cached_user_stands_alone_offline() {
    let node = node();
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT,SALTED-SHA1>");
    let auth = authority(&[";1;LocalCachedUser;/LDAPv3/10.0.0.5"]);
    assert!(verify(&node, &auth, "rec-alice", "alice", "Secret1").is_ok());
}

#[test]
fn disabled_cached_user_reenables_when_node_returns() {
    let remote = ScriptedRemote::new(&[], &[]);
    let node = node_with(
        |_| {},
        Collaborators {
            remote,
            reachability: Arc::new(AllReachable),
            ..Collaborators::default()
        },
    );
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT,SALTED-SHA1>");
    let auth = authority(&[";1;DisabledUser;;LocalCachedUser;/LDAPv3/10.0.0.5"]);

    let outcome = verify(&node, &auth, "rec-alice", "alice", "Secret1").unwrap();
    assert_eq!(
        outcome.updated_authority,
        Some(vec![";1;LocalCachedUser;/LDAPv3/10.0.0.5".to_string()])
    );
}

#[test]
fn disabled_cached_user_stays_disabled_offline() {
    let node = node();
    seed(&node.engine, "alice", "rec-alice", "Secret1", "HASHLIST:<SMB-NT,SALTED-SHA1>");
    let auth = authority(&[";1;DisabledUser;;LocalCachedUser;/LDAPv3/10.0.0.5"]);
    assert_eq!(
        verify(&node, &auth, "rec-alice", "alice", "Secret1").unwrap_err(),
        AuthStatus::AccountDisabled
    );
}

#[test]
fn malformed_buffer_is_rejected_before_dispatch() {
    let node = node();
    let auth = authority(&[SHADOW]);
    let attrs = HashMap::new();
    assert_eq!(
        call(
            &node,
            AuthMethod::VerifyPassword,
            &auth,
            "rec-alice",
            &[1, 2, 3],
            &attrs,
        )
        .unwrap_err(),
        AuthStatus::InvalidBufferFormat
    );
}
