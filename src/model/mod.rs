//! Data model: SshConfig, Watcher, DiscoveryRecord, IndexedEvent.
//!
//! Attribute names are kept case-preserving and matching the wire schema in
//! spec §6, since `store::Entity` impls use them directly as column names.

mod discovery_record;
mod indexed_event;
mod ssh_config;
mod watcher;

pub use discovery_record::{ConsumptionStatus, DiscoveryRecord};
pub use indexed_event::{compute_md5_id, IndexedEvent};
pub use ssh_config::SshConfig;
pub use watcher::Watcher;

use chrono::{DateTime, Utc};

/// Shorthand used across the model for the "absolute instant" attributes
/// the spec describes (ctime, created/updated timestamps).
pub type Instant = DateTime<Utc>;
