//! Warden
//!
//! Policy-gated sandbox execution engine. This package re-exports
//! [`warden_core`]; the `warden` binary lives in the `warden-cli` crate.

pub use warden_core::*;
