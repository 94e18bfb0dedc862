//! The LocalCachedUser variant: a local replica of a network account.
//!
//! The entry data names the authoritative network node. Verification is
//! two-phase while that node is reachable: the local cache must agree
//! first, then the network node confirms. Offline, the local cache alone
//! decides. Password-set and policy operations act on the local cache
//! only; the enclosing sync layer reconciles them upstream.

use dn_core::AuthResult;
use tracing::{debug, warn};

use crate::authority::AuthorityEntry;
use crate::collaborators::RemoteError;
use crate::engine::{AuthOutcome, AuthRequest, Engine, Session};
use crate::request::{append_item, ParsedRequest};
use crate::variants::shadow;

pub(crate) fn handle(
    engine: &Engine,
    request: &AuthRequest<'_>,
    parsed: &ParsedRequest<'_>,
    entry: &AuthorityEntry,
    session: &mut Option<Session>,
) -> AuthResult<AuthOutcome> {
    let outcome = shadow::handle(engine, request, parsed, "", session)?;

    let is_verify = request.method.is_interactive_verify();
    if !is_verify {
        return Ok(outcome);
    }

    let node = entry.data.trim();
    if node.is_empty() || !engine.reachability().is_reachable(node) {
        debug!(
            record_id = request.record_id,
            node, "network node offline, local verification stands"
        );
        return Ok(outcome);
    }

    // Second phase: the authoritative node must agree.
    let mut payload = Vec::with_capacity(8 + request.buffer.len());
    append_item(&mut payload, &request.method.code().to_le_bytes());
    payload.extend_from_slice(request.buffer);
    match engine.remote().forward(node, &payload) {
        Ok(_) => Ok(outcome),
        Err(RemoteError::Status(status)) => {
            debug!(node, %status, "network node rejected cached verification");
            Err(status)
        }
        Err(RemoteError::Unreachable) => {
            // Reachability flapped between the probe and the call; treat
            // it the same as offline.
            warn!(node, "network node stopped answering mid-call");
            Ok(outcome)
        }
    }
}
