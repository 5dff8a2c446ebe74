//! Configuration management.
//!
//! - TOML configuration with one table per concern
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only the changed table is rewritten)
//!
//! # Example
//!
//! ```no_run
//! use dubsync_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/dubsync.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Probes per run: {}", config.settings().detection.number_of_probes);
//!
//! config.settings_mut().detection.seed = Some(7);
//! config.update_section(ConfigSection::Detection).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, DetectionSettings, LoggingSettings, MergeSettings, Settings, ToolSettings,
};
