#![forbid(unsafe_code)]

//! # capstan-install
//!
//! The on-disk convention that makes atomic service swaps possible:
//! versioned generation directories under a single install root, two
//! symbolic links that define the active installation, and at most two
//! generations retained at rest.
//!
//! ## Layout (normative)
//!
//! ```text
//! <install_root>/
//!   <version>/bin/<service>              executable
//!   <version>/config/<service>.yml       config
//!   tmp/                                 metadata cache + download staging
//!   data/<service>/<service>-index.json  cached trusted index
//!   <service>.zip                        promoted artifact (transient)
//!   update_status.json                   consent mailbox
//! ```
//!
//! `<version>` names match `vYYYY.MM.DD-sha.<7 hex>`; any directory with
//! such a name under the root is treated as an install generation.

pub mod error;
pub mod extract;
pub mod generations;
pub mod layout;
pub mod links;

pub use error::{InstallError, InstallResult};
pub use extract::extract_zip;
pub use generations::{is_generation_name, remove_generation, scan_generations};
pub use layout::InstallLayout;
pub use links::{link_destination, update_symlink};
