//! # dn-policy
//!
//! Password-quality and account policy for the dirnode password engine.
//!
//! Policy is carried as space-separated `key=value` text on the record,
//! merged key-by-key over the node-global defaults. This crate parses that
//! text, checks candidate passwords against it, and evaluates account
//! expiry and lockout. Nothing here persists state: the dispatcher owns
//! the single end-of-call write.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod account;
pub mod global;
pub mod password;
pub mod text;

pub use account::{evaluate_account, AccountPolicyError};
pub use global::{FileGlobalPolicyStore, GlobalPolicyError, GlobalPolicyStore, MemoryGlobalPolicyStore};
pub use password::{check_password, PasswordViolation};
pub use text::{PolicyParseError, PolicyText};
