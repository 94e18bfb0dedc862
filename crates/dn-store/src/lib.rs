//! # dn-store
//!
//! File-backed storage for the dirnode password engine: the hex-encoded
//! credential record, its companion binary account-state file, the record
//! policy text and the salted-SHA1 password history.
//!
//! The store performs no locking of its own - the enclosing record-access
//! layer serializes concurrent writers to the same record.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod files;
pub mod state;

pub use error::StoreError;
pub use files::CredentialStore;
pub use state::AccountState;
