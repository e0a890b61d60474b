//! Configuration file parsing for the OpenHarmony tooling
//!
//! Supports `.fohos/config.toml` in the Flutter project root.

pub mod settings;
pub mod types;

pub use settings::{init_config_dir, load_settings, save_settings, FOHOS_DIR};
pub use types::*;
