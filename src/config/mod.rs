//! Configuration Management Module
//!
//! Engine tunables (timeouts, chunk sizes, progress throttling, local
//! directories) and their persistence as JSON in the user config directory.

pub mod storage;
pub mod types;

pub use storage::{config_dir, config_file, ConfigStorage, StorageError};
pub use types::{EngineConfig, CONFIG_VERSION};
