//! Push metadata from a media-board dataset export into a Stash catalog.
//!
//! Rows of the extracted CSV are matched to catalog images or scenes by
//! checksum, reconciled field by field, and written back through the Stash
//! GraphQL API. Every change is journaled first so a run can be undone with
//! [`backup::restore_file`].

pub mod backup;
pub mod config;
pub mod error;
pub mod import;
pub mod reconcile;
pub mod run_log;
pub mod stash;
pub mod sync;
pub mod tags;
pub mod tracing;

pub mod util {
    pub mod env;
}

pub use error::{ConfigError, StashError, SyncError};
