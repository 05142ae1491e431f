#![forbid(unsafe_code)]

//! # capstan-agent
//!
//! The update orchestration engine: a metadata poller that keeps the
//! local trusted index current, and a consent watcher that — once the
//! operator flips `update_requested` in the status mailbox — downloads,
//! verifies, unpacks, and activates the new service generation, then
//! restarts the managed unit.
//!
//! ## Safety invariants
//!
//! - An artifact whose sha256 disagrees with the trusted index is never
//!   promoted out of the staging area.
//! - A generation directory is fully populated before the active links
//!   are redirected to it.
//! - At most two generations remain after a successful apply; the links
//!   always resolve into the newest one.
//!
//! The TUF signature chain ([`capstan_tuf::TufRepo`]), the credential
//! exchange ([`capstan_net::TokenSource`]), and the init system
//! ([`ServiceController`]) are pluggable collaborators.

pub mod agent;
pub mod apply;
pub mod config;
pub mod error;
pub mod index;
pub mod poller;
pub mod status;
pub mod systemd;

pub use agent::UpdateAgent;
pub use apply::{discover_generations, ConsentWatcher, GenerationState, WatcherOptions};
pub use config::AgentConfig;
pub use error::{AgentError, AgentResult};
pub use index::{entry_for, parse_index, IndexEntry, IndexHashes, ServiceIndex};
pub use poller::{MetadataPoller, PollOutcome};
pub use status::{StatusRecord, UpdateStatus};
pub use systemd::{ServiceController, SystemctlController};
