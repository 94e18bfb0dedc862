//! Collaborator seams.
//!
//! Three concerns live outside this engine: the realm principal database,
//! remote engine nodes, and network reachability. Each is a trait so the
//! enclosing process supplies real transports and tests supply fakes. The
//! null implementations here are the defaults for a standalone node.

use dn_core::AuthStatus;
use thiserror::Error;

/// Failure talking to the realm principal database.
#[derive(Debug, Error)]
pub enum RealmError {
    /// The realm database cannot be reached or refused the operation.
    #[error("realm database unavailable")]
    Unavailable,
    /// The named principal does not exist.
    #[error("principal not found")]
    PrincipalMissing,
}

/// Keeps realm principals in sync with local password changes.
pub trait RealmSync: Send + Sync {
    /// The node's local realm name.
    ///
    /// ## Errors
    ///
    /// Returns [`RealmError::Unavailable`] when no realm is configured or
    /// reachable.
    fn local_realm(&self) -> Result<String, RealmError>;

    /// Creates or updates `principal` in `realm` with `secret`.
    ///
    /// ## Errors
    ///
    /// Returns [`RealmError::Unavailable`] on database failure.
    fn upsert_principal(&self, principal: &str, secret: &str, realm: &str)
        -> Result<(), RealmError>;

    /// Deletes `principal` from `realm`.
    ///
    /// ## Errors
    ///
    /// Returns [`RealmError::PrincipalMissing`] when it does not exist and
    /// [`RealmError::Unavailable`] on database failure.
    fn delete_principal(&self, principal: &str, realm: &str) -> Result<(), RealmError>;
}

/// Failure forwarding a request to a remote engine node.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The address did not answer; the caller may fail over.
    #[error("remote node unreachable")]
    Unreachable,
    /// The remote node answered with a status.
    #[error("remote node returned {0}")]
    Status(AuthStatus),
}

/// A remote engine node requests can be forwarded to.
pub trait RemoteAuthNode: Send + Sync {
    /// Forwards a method-code-prefixed request buffer to `address` and
    /// returns the remote output buffer.
    ///
    /// ## Errors
    ///
    /// [`RemoteError::Unreachable`] when the address does not answer,
    /// [`RemoteError::Status`] when it answers with a failure.
    fn forward(&self, address: &str, payload: &[u8]) -> Result<Vec<u8>, RemoteError>;
}

/// Answers whether a named network node is currently reachable.
pub trait Reachability: Send + Sync {
    /// True when `node` can be reached right now.
    fn is_reachable(&self, node: &str) -> bool;
}

/// No realm configured; every operation reports unavailability.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRealm;

impl RealmSync for NoRealm {
    fn local_realm(&self) -> Result<String, RealmError> {
        Err(RealmError::Unavailable)
    }

    fn upsert_principal(&self, _: &str, _: &str, _: &str) -> Result<(), RealmError> {
        Err(RealmError::Unavailable)
    }

    fn delete_principal(&self, _: &str, _: &str) -> Result<(), RealmError> {
        Err(RealmError::Unavailable)
    }
}

/// No remote transport; every forward is unreachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRemote;

impl RemoteAuthNode for NoRemote {
    fn forward(&self, _: &str, _: &[u8]) -> Result<Vec<u8>, RemoteError> {
        Err(RemoteError::Unreachable)
    }
}

/// Treats every network node as offline.
#[derive(Debug, Default, Clone, Copy)]
pub struct Offline;

impl Reachability for Offline {
    fn is_reachable(&self, _: &str) -> bool {
        false
    }
}
