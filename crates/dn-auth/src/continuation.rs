//! Continuation table for multi-round methods.
//!
//! DIGEST-MD5 spans two engine calls; the nonce minted in round one must
//! be the one the round-two response is checked against. The table keys
//! held state by an opaque token the caller echoes back, and the caller
//! is responsible for releasing tokens it abandons.

use dashmap::DashMap;
use uuid::Uuid;

/// State parked between rounds of one exchange.
#[derive(Debug, Clone)]
pub enum Continuation {
    /// DIGEST-MD5 round one state.
    DigestMd5 {
        /// The username round one was started for.
        username: String,
        /// The nonce minted in round one.
        nonce: String,
    },
}

/// Concurrent token-to-state table.
#[derive(Debug, Default)]
pub struct ContinuationTable {
    entries: DashMap<Uuid, Continuation>,
}

impl ContinuationTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks `state` and mints its token.
    #[must_use]
    pub fn insert(&self, state: Continuation) -> Uuid {
        let token = Uuid::new_v4();
        self.entries.insert(token, state);
        token
    }

    /// Removes and returns the state for `token`.
    #[must_use]
    pub fn take(&self, token: &Uuid) -> Option<Continuation> {
        self.entries.remove(token).map(|(_, state)| state)
    }

    /// Drops the state for `token`. True when a state was held.
    pub fn release(&self, token: &Uuid) -> bool {
        self.entries.remove(token).is_some()
    }

    /// Number of parked states.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is parked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_state() -> Continuation {
        Continuation::DigestMd5 {
            username: "chris".to_string(),
            nonce: "OA6MG9tEQGm2hh".to_string(),
        }
    }

    #[test]
    fn take_consumes_the_token() {
        let table = ContinuationTable::new();
        let token = table.insert(digest_state());
        assert!(table.take(&token).is_some());
        assert!(table.take(&token).is_none());
    }

    #[test]
    fn unknown_token_yields_nothing() {
        let table = ContinuationTable::new();
        assert!(table.take(&Uuid::new_v4()).is_none());
        assert!(!table.release(&Uuid::new_v4()));
    }

    #[test]
    fn release_drops_without_returning() {
        let table = ContinuationTable::new();
        let token = table.insert(digest_state());
        assert!(table.release(&token));
        assert!(table.is_empty());
    }
}
