//! # dn-auth
//!
//! The dirnode local password engine: authority-tag dispatch over a
//! record's credential, policy and account state.
//!
//! The engine is a synchronous library. The enclosing request pipeline
//! hands [`engine::Engine::authenticate`] one method code, the record's
//! authority attribute and an opaque length-prefixed buffer; the first
//! recognized authority tag selects the handler, a uniform post-dispatch
//! step applies account policy and the failure throttle, and account
//! state is persisted at most once per call.
//!
//! External concerns - realm principals, remote nodes, reachability,
//! global policy storage and time - enter through the trait seams in
//! [`collaborators`] and [`clock`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod authority;
pub mod clock;
pub mod collaborators;
pub mod continuation;
pub mod engine;
pub mod request;
pub mod throttle;
mod variants;

pub use authority::{AuthorityEntry, AuthorityTag};
pub use clock::{Clock, FakeClock, SystemClock};
pub use engine::{AuthOutcome, AuthRequest, Collaborators, Engine};
pub use throttle::FailureThrottle;
