//! Infrastructure layer: file-system access for the configuration document.
//!
//! **Dependency rule**: this layer may depend on `birdnet_config_core`, but
//! MUST NOT import from `application`.

pub mod storage;
