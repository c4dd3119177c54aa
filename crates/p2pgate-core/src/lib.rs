//! p2pgate-core: policy library for the p2pgate relay.
//!
//! Provides the destination allowlist index with its atomic snapshot handle,
//! /24 subnet diagnostic reporting, pluggable access-token verification, and
//! the shared error taxonomy. Everything here is runtime-agnostic; the
//! network-facing pieces live in `p2pgate-server`.

pub mod allowlist;
pub mod auth;
pub mod error;
pub mod subnet;

// Re-export commonly used items at crate root.
pub use allowlist::{Allowlist, AllowlistHandle, DEFAULT_ALLOWED_PORTS};
pub use auth::{AccessVerifier, AllowAll, StaticToken};
pub use error::{GateError, GateResult};
pub use subnet::{group_by_subnet24, render_report, sort_subnets};
