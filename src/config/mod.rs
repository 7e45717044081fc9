//! Layered configuration
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config`)
//! 3. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::{ConvergeConfig, MAX_POLL_INTERVAL_MS};
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, SCHEMA_ID};
pub use merge::{merge_into, merge_layers};
