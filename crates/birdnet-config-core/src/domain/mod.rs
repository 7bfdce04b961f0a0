//! Configuration data model for a BirdNET-Go node.
//!
//! These modules only describe values: their types, defaults, document keys
//! and the self-contained checks each value can make about itself (a backup
//! target knows which of its fields are required; a retention age knows how
//! to parse itself).  Nothing here touches the file system, the environment
//! or global state.
//!
//! # How the pieces fit (for beginners)
//!
//! The configuration document is a tree.  [`settings::Settings`] is the root,
//! and each top-level table (`[main]`, `[birdnet]`, `[realtime]`, `[backup]`,
//! ...) maps onto a nested struct.  Every struct derives `Deserialize` with
//! `#[serde(default)]`, so any key missing from the document takes the
//! compiled-in default instead of failing the parse.

pub mod backup;
pub mod duration;
pub mod realtime;
pub mod retry;
pub mod settings;

/// Backup destinations and their per-kind validation.
///
/// See [`target::BackupTarget`] for the main type.
pub mod target;
