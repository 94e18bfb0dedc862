//! The authentication engine and its dispatcher.
//!
//! One [`Engine::authenticate`] call runs start-to-finish on its calling
//! thread: parse the buffer, select the authority variant, execute, then
//! apply the uniform account-policy step and persist account state at
//! most once. The only status a caller sees is an [`AuthStatus`] kind.

use std::collections::HashMap;
use std::sync::Arc;

use dn_core::{AuthMethod, AuthResult, AuthStatus, NodeConfig};
use dn_crypto::AlgorithmMask;
use dn_policy::text::PolicyText;
use dn_policy::{evaluate_account, GlobalPolicyStore, MemoryGlobalPolicyStore};
use dn_store::state::STATE_LEN;
use dn_store::{AccountState, CredentialStore};
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::authority::{self, AuthorityEntry, AuthorityTag};
use crate::clock::{Clock, SystemClock};
use crate::collaborators::{
    NoRealm, NoRemote, Offline, Reachability, RealmError, RealmSync, RemoteAuthNode,
};
use crate::continuation::ContinuationTable;
use crate::request::{parse_request, ParsedRequest};
use crate::throttle::FailureThrottle;
use crate::variants;

/// External services the engine talks to.
///
/// The defaults describe a standalone node: in-memory global policy, no
/// realm, no remote nodes, every network node offline, system time.
pub struct Collaborators {
    /// Node-global default-policy storage.
    pub global_policy: Arc<dyn GlobalPolicyStore>,
    /// Realm principal synchronization.
    pub realm: Arc<dyn RealmSync>,
    /// Remote engine nodes for forwarded requests.
    pub remote: Arc<dyn RemoteAuthNode>,
    /// Network-node reachability probe.
    pub reachability: Arc<dyn Reachability>,
    /// Time source and sleeper.
    pub clock: Arc<dyn Clock>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            global_policy: Arc::new(MemoryGlobalPolicyStore::new()),
            realm: Arc::new(NoRealm),
            remote: Arc::new(NoRemote),
            reachability: Arc::new(Offline),
            clock: Arc::new(SystemClock),
        }
    }
}

/// One authentication request, as handed over by the enclosing request
/// pipeline.
#[derive(Debug)]
pub struct AuthRequest<'a> {
    /// The requested operation.
    pub method: AuthMethod,
    /// The record's authority attribute values, in order.
    pub authority: &'a [String],
    /// The length-prefixed input buffer.
    pub buffer: &'a [u8],
    /// The record's stable id; also the credential file name.
    pub record_id: &'a str,
    /// The record's type name, for diagnostics.
    pub record_type: &'a str,
    /// The record's other attributes, for variants that read them.
    pub record_attributes: &'a HashMap<String, String>,
    /// Caller-imposed restriction on which algorithms may be consulted.
    pub allowed_mask: Option<AlgorithmMask>,
    /// True when the caller holds record-administrator rights.
    pub caller_is_admin: bool,
    /// The calling process's effective uid; 0 unlocks root-only methods.
    pub effective_uid: u32,
    /// Verify only: skip login bookkeeping and realm notification.
    pub auth_only: bool,
    /// A re-verification inside an already-authenticated session; exempt
    /// from the failure throttle.
    pub is_secondary: bool,
    /// Continuation token from a previous round, if any.
    pub continuation: Option<Uuid>,
}

impl<'a> AuthRequest<'a> {
    /// A request with the common fields set and everything else at its
    /// least-privileged default.
    #[must_use]
    pub fn new(
        method: AuthMethod,
        authority: &'a [String],
        record_id: &'a str,
        buffer: &'a [u8],
        record_attributes: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            method,
            authority,
            buffer,
            record_id,
            record_type: "user",
            record_attributes,
            allowed_mask: None,
            caller_is_admin: false,
            effective_uid: 500,
            auth_only: false,
            is_secondary: false,
            continuation: None,
        }
    }
}

/// What a successful call hands back.
#[derive(Debug, Default)]
pub struct AuthOutcome {
    /// Method-specific output bytes (policy text, authenticator response,
    /// derived keys, round-one challenge). Empty for plain verifications.
    pub output: Vec<u8>,
    /// Token for the next round of a multi-round method.
    pub continuation: Option<Uuid>,
    /// Replacement authority attribute values the caller must write back
    /// to the record (migration, re-enable, principal rename).
    pub updated_authority: Option<Vec<String>>,
}

impl AuthOutcome {
    /// An outcome carrying nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// An outcome carrying only output bytes.
    #[must_use]
    pub fn with_output(output: Vec<u8>) -> Self {
        Self {
            output,
            ..Self::default()
        }
    }
}

/// Account bookkeeping carried across one call.
///
/// Built when a variant loads the record; consumed by the uniform
/// post-dispatch step, which persists it at most once.
pub(crate) struct Session {
    pub(crate) username: String,
    pub(crate) record_id: String,
    pub(crate) state: AccountState,
    pub(crate) snapshot: [u8; STATE_LEN],
    /// Record policy merged over the node-global defaults.
    pub(crate) policy: PolicyText,
}

/// The local password engine for one directory node.
pub struct Engine {
    config: NodeConfig,
    default_mask: AlgorithmMask,
    store: CredentialStore,
    global_policy: Arc<dyn GlobalPolicyStore>,
    realm: Arc<dyn RealmSync>,
    remote: Arc<dyn RemoteAuthNode>,
    reachability: Arc<dyn Reachability>,
    clock: Arc<dyn Clock>,
    throttle: FailureThrottle,
    continuations: ContinuationTable,
    realm_cache: Mutex<Option<(String, i64)>>,
}

impl Engine {
    /// Builds an engine over `config` and `collaborators`.
    ///
    /// ## Errors
    ///
    /// Returns [`AuthStatus::ParameterError`] when the configured default
    /// hash list contains an unknown token.
    pub fn new(config: NodeConfig, collaborators: Collaborators) -> AuthResult<Self> {
        let default_mask = AlgorithmMask::parse_tokens(&config.default_hash_list)
            .map_err(|_| AuthStatus::ParameterError)?;
        let store = CredentialStore::new(&config.credential_root);
        let throttle = FailureThrottle::new(collaborators.clock.clone());
        Ok(Self {
            config,
            default_mask,
            store,
            global_policy: collaborators.global_policy,
            realm: collaborators.realm,
            remote: collaborators.remote,
            reachability: collaborators.reachability,
            clock: collaborators.clock,
            throttle,
            continuations: ContinuationTable::new(),
            realm_cache: Mutex::new(None),
        })
    }

    /// The engine's credential store.
    #[must_use]
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Number of currently parked continuations.
    #[must_use]
    pub fn pending_continuations(&self) -> usize {
        self.continuations.len()
    }

    pub(crate) fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub(crate) fn default_mask(&self) -> AlgorithmMask {
        self.default_mask
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn realm_sync(&self) -> &dyn RealmSync {
        self.realm.as_ref()
    }

    pub(crate) fn remote(&self) -> &dyn RemoteAuthNode {
        self.remote.as_ref()
    }

    pub(crate) fn reachability(&self) -> &dyn Reachability {
        self.reachability.as_ref()
    }

    pub(crate) fn continuations(&self) -> &ContinuationTable {
        &self.continuations
    }

    /// The node's realm name, re-resolved at most once per TTL.
    pub(crate) fn realm_name(&self) -> Result<String, RealmError> {
        let now = self.clock.now_unix();
        if let Some((name, expires_at)) = self.realm_cache.lock().as_ref() {
            if *expires_at > now {
                return Ok(name.clone());
            }
        }
        let name = self.realm.local_realm()?;
        let ttl = self.config.realm_cache_ttl_secs as i64;
        *self.realm_cache.lock() = Some((name.clone(), now + ttl));
        Ok(name)
    }

    /// The node-global default policy, parsed. Falls back to the
    /// configured text when the external store holds nothing.
    pub(crate) fn global_policy(&self) -> PolicyText {
        let text = match self.global_policy.read_global() {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => self.config.global_policy.clone(),
            Err(err) => {
                warn!(error = %err, "global policy unavailable, using configured default");
                self.config.global_policy.clone()
            }
        };
        PolicyText::parse(&text).unwrap_or_else(|err| {
            warn!(error = %err, "ignoring unparsable global policy");
            PolicyText::default()
        })
    }

    /// The record's policy merged over the node-global defaults.
    pub(crate) fn merged_policy(&self, record_id: &str) -> PolicyText {
        let record = match self.store.load_policy(record_id) {
            Ok(Some(text)) => PolicyText::parse(&text).unwrap_or_else(|err| {
                warn!(record_id, error = %err, "ignoring unparsable record policy");
                PolicyText::default()
            }),
            Ok(None) => PolicyText::default(),
            Err(err) => {
                warn!(record_id, error = %err, "record policy unreadable");
                PolicyText::default()
            }
        };
        record.merged_over(&self.global_policy())
    }

    /// Executes one request.
    ///
    /// ## Errors
    ///
    /// Any [`AuthStatus`] kind; see the per-variant documentation. The
    /// uniform post-dispatch step may upgrade `AuthFailed` into
    /// `AccountDisabled` when the failure crosses the lockout threshold.
    pub fn authenticate(&self, request: &AuthRequest<'_>) -> AuthResult<AuthOutcome> {
        match request.method {
            AuthMethod::ReleaseContinuation => return self.release_continuation(request),
            AuthMethod::GetGlobalPolicy => {
                return Ok(AuthOutcome::with_output(
                    self.global_policy().render().into_bytes(),
                ));
            }
            AuthMethod::SetGlobalPolicy => return self.set_global_policy(request),
            _ => {}
        }

        if request.method.requires_privilege()
            && !(request.caller_is_admin || request.effective_uid == 0)
        {
            return Err(AuthStatus::PermissionError);
        }

        let parsed = parse_request(
            request.method,
            request.buffer,
            request.continuation.is_some(),
        )?;

        let entry = match authority::resolve(request.authority) {
            Some(entry) => entry,
            // Records predating authority attributes carry their secret
            // the Basic way.
            None if request.authority.is_empty() => AuthorityEntry {
                version: "1".to_string(),
                tag: AuthorityTag::Basic,
                data: String::new(),
            },
            None => return Err(AuthStatus::AuthMethodNotSupported),
        };
        debug!(
            method = ?request.method,
            tag = entry.tag.as_str(),
            record_id = request.record_id,
            record_type = request.record_type,
            "dispatching"
        );

        let mut session = None;
        let mut result = self.dispatch(&entry, request, &parsed, &mut session);

        if !request.method.is_policy_read() {
            if let Some(mut session) = session {
                self.post_dispatch(request, &mut session, &mut result);
                self.persist_state(&session);
            }
        }
        result
    }

    pub(crate) fn dispatch(
        &self,
        entry: &AuthorityEntry,
        request: &AuthRequest<'_>,
        parsed: &ParsedRequest<'_>,
        session: &mut Option<Session>,
    ) -> AuthResult<AuthOutcome> {
        match entry.tag {
            AuthorityTag::Basic => variants::basic::handle(self, request, parsed, session),
            AuthorityTag::ShadowHash => {
                variants::shadow::handle(self, request, parsed, &entry.data, session)
            }
            AuthorityTag::Kerberos | AuthorityTag::KerberosCert => {
                variants::kerberos::handle(self, request, parsed, entry, session)
            }
            AuthorityTag::PasswordServer => {
                variants::password_server::handle(self, request, &entry.data)
            }
            AuthorityTag::DisabledUser => {
                variants::disabled::handle(self, request, parsed, entry, session)
            }
            AuthorityTag::LocalCachedUser => {
                variants::cached::handle(self, request, parsed, entry, session)
            }
        }
    }

    /// The uniform post-dispatch step.
    ///
    /// Success runs account-policy evaluation (administrators bypass it,
    /// but still get their counter reset); credential failures feed the
    /// counter, the lockout threshold and the throttle.
    fn post_dispatch(
        &self,
        request: &AuthRequest<'_>,
        session: &mut Session,
        result: &mut AuthResult<AuthOutcome>,
    ) {
        let now = self.clock.now_unix();
        match result {
            Ok(_) => {
                if request.caller_is_admin {
                    session.state.failed_attempts = 0;
                } else if evaluate_account(&session.policy, &mut session.state, now).is_err() {
                    *result = Err(AuthStatus::AccountDisabled);
                    return;
                }
                if request.method.is_interactive_verify() {
                    if !request.auth_only {
                        session.state.last_login_at = now;
                    }
                    self.throttle.clear(&session.username);
                }
            }
            Err(status) if status.counts_as_auth_failure() => {
                if !request.method.is_interactive_verify() {
                    return;
                }
                session.state.failed_attempts = session.state.failed_attempts.saturating_add(1);
                let threshold = session.policy.max_failed_login_attempts.unwrap_or(0);
                if !request.caller_is_admin
                    && threshold > 0
                    && session.state.failed_attempts >= threshold
                    && !session.state.disabled
                {
                    warn!(
                        username = session.username,
                        failed_attempts = session.state.failed_attempts,
                        "lockout threshold crossed"
                    );
                    session.state.disabled = true;
                    *result = Err(AuthStatus::AccountDisabled);
                }
                if !request.is_secondary {
                    self.throttle
                        .record_failure(&session.username, self.config.min_failure_delay_secs);
                }
            }
            Err(_) => {}
        }
    }

    /// Writes account state at most once, and only when dirty.
    fn persist_state(&self, session: &Session) {
        if session.state.to_bytes() == session.snapshot {
            return;
        }
        if let Err(err) = self.store.store_state(&session.record_id, &session.state) {
            warn!(record_id = session.record_id, error = %err, "account state not persisted");
        }
    }

    fn release_continuation(&self, request: &AuthRequest<'_>) -> AuthResult<AuthOutcome> {
        let token = request.continuation.ok_or(AuthStatus::ContinueDataBad)?;
        if self.continuations.release(&token) {
            Ok(AuthOutcome::empty())
        } else {
            Err(AuthStatus::ContinueDataBad)
        }
    }

    fn set_global_policy(&self, request: &AuthRequest<'_>) -> AuthResult<AuthOutcome> {
        if !(request.caller_is_admin || request.effective_uid == 0) {
            return Err(AuthStatus::PermissionError);
        }
        let parsed = parse_request(request.method, request.buffer, false)?;
        let ParsedRequest::GlobalSet { policy } = parsed else {
            return Err(AuthStatus::InvalidBufferFormat);
        };
        let validated = PolicyText::parse(policy)?;
        self.global_policy
            .write_global(&validated.render())
            .map_err(|_| AuthStatus::MemoryError)?;
        Ok(AuthOutcome::empty())
    }
}
