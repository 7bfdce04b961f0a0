//! Application layer: owning and sharing the current settings.
//!
//! # Sub-modules
//!
//! - **`settings_store`** – Loads, validates and installs settings behind a
//!   reader/writer lock; hands out immutable snapshots and saves changes.
//!
//! - **`global`** – A single process-wide store for code that cannot have
//!   one passed in.  Loaded lazily on first access.

pub mod global;
pub mod settings_store;
