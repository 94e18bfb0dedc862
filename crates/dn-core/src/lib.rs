//! # dn-core
//!
//! Core types for the dirnode local password engine.
//!
//! This crate defines the vocabulary shared by every other engine crate:
//! the status kinds returned to the enclosing request pipeline, the
//! authentication method codes, and the node-level configuration.
//!
//! ## Design
//!
//! The engine is a synchronous in-process library: one call runs
//! start-to-finish on its calling thread, and the only status a caller ever
//! sees is an [`AuthStatus`] kind. No internal detail (paths, stack state)
//! is carried in returned errors.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod method;
pub mod status;

pub use config::NodeConfig;
pub use method::AuthMethod;
pub use status::{AuthStatus, AuthResult};
