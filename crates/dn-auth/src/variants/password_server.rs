//! The PasswordServer variant: the credential lives on a remote node.
//!
//! The entry data is `keyId,address[,address...]`. The request is
//! repacked with its method code prefixed and forwarded; an unreachable
//! address fails over to the next one exactly once. Remote statuses pass
//! through unchanged.

use dn_core::{AuthResult, AuthStatus};
use tracing::{debug, warn};

use crate::collaborators::RemoteError;
use crate::engine::{AuthOutcome, AuthRequest, Engine};
use crate::request::append_item;

pub(crate) fn handle(
    engine: &Engine,
    request: &AuthRequest<'_>,
    data: &str,
) -> AuthResult<AuthOutcome> {
    let mut parts = data.split(',');
    let _key_id = parts.next();
    let addresses: Vec<&str> = parts.filter(|a| !a.is_empty()).collect();
    if addresses.is_empty() {
        return Err(AuthStatus::ParameterError);
    }

    let payload = repack(request);

    // One failover retry, never more.
    for (attempt, address) in addresses.iter().take(2).enumerate() {
        match engine.remote().forward(address, &payload) {
            Ok(output) => {
                debug!(address, attempt, "forwarded request answered");
                return Ok(AuthOutcome::with_output(output));
            }
            Err(RemoteError::Status(status)) => return Err(status),
            Err(RemoteError::Unreachable) => {
                warn!(address, attempt, "password server unreachable");
            }
        }
    }
    Err(AuthStatus::AuthFailed)
}

/// The forwarded form: the method code as one item, then the original
/// buffer verbatim.
fn repack(request: &AuthRequest<'_>) -> Vec<u8> {
    let mut payload = Vec::with_capacity(8 + request.buffer.len());
    append_item(&mut payload, &request.method.code().to_le_bytes());
    payload.extend_from_slice(request.buffer);
    payload
}
