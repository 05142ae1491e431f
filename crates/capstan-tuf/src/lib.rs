#![forbid(unsafe_code)]

//! # capstan-tuf
//!
//! The trusted-metadata channel the update agent consumes.
//!
//! ## Public contract
//!
//! The [`TufRepo`] trait is the interface the orchestration core depends
//! on: refresh the metadata chain, look up a target's declared hash and
//! length, probe the local cache, and download a target into it.
//!
//! [`HttpTufRepo`] is the built-in client. It caches metadata files under
//! the local metadata directory, uses hash-prefixed target naming, and
//! enforces the declared sha256 and length on every target it touches.
//! Signature verification of the metadata chain itself is performed by the
//! repository tooling that signs and publishes it; a fully verifying
//! client implements the same trait and drops in unchanged.
//!
//! ## Trust-on-first-use
//!
//! [`bootstrap::ensure_trust_root`] fetches `1.root.json` from the
//! metadata base URL on the very first run and persists it. Subsequent
//! runs find the persisted root and skip the network round trip.

pub mod bootstrap;
pub mod error;
pub mod repo;
pub mod target;

pub use bootstrap::ensure_trust_root;
pub use error::{TufError, TufResult};
pub use repo::{HttpTufRepo, RepoOptions, TufRepo};
pub use target::TargetInfo;
