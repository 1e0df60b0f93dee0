//! Reconciliation engine that mirrors a Cisco ACI fabric into NetBox.
//!
//! A pass walks a fixed, dependency-ordered list of entity kinds. For each
//! kind the engine reads the source snapshot, bulk-loads the matching
//! destination scope into a per-kind [`EntityCache`], and drives every
//! record through the same state machine:
//!
//! ```text
//! resolve scope → lookup → create | diff → update | unchanged → verify
//! ```
//!
//! Field comparison is table-driven ([`mapping`]) and normalizes value
//! representations ([`diff::values_equal`]), so a pass over an already
//! synchronized destination writes nothing.
//!
//! The source and destination are reached through the [`SourceClient`] and
//! [`Destination`] traits, implemented here for the `acisync-api` clients.

pub mod cache;
pub mod context;
pub mod destination;
pub mod diff;
pub mod engine;
pub mod error;
pub mod kind;
pub mod mapping;
mod modules;
pub mod orchestrator;
pub mod record;
pub mod settings;
pub mod source;
pub mod stats;

pub use cache::{EntityCache, Scope};
pub use destination::Destination;
pub use error::CoreError;
pub use kind::{EntityKind, Selection};
pub use orchestrator::Orchestrator;
pub use record::{DestId, DestRecord, SourceRecord};
pub use settings::{PreloadFailure, SyncSettings};
pub use source::SourceClient;
pub use stats::{Issue, KindReport, KindStats, KindStatus, RunReport};
