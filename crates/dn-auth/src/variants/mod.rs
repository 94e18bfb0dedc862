//! Authority-variant handlers.
//!
//! One module per recognized tag. `shadow` is the primary variant; the
//! realm, disabled and cached variants layer their own behavior on top of
//! its local operations.

pub(crate) mod basic;
pub(crate) mod cached;
pub(crate) mod disabled;
pub(crate) mod kerberos;
pub(crate) mod password_server;
pub(crate) mod shadow;
