//! Sauti Common - Shared configuration, errors, and logging for the Sauti signal services.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - A runtime-overridable settings store
//! - Error types and handling utilities
//! - Logging setup
//! - Small text utilities

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod config_loader;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod util;
pub mod validation;

pub use config::{
    AlertsConfig, Config, DetectionConfig, NetworkConfig, NotificationsConfig,
    ObservabilityConfig, RealtimeConfig, RedFlagDedupMode, StakeholderConfig, StorageConfig,
};
pub use error::{Error, Result};
pub use runtime::{AlertChannelOverrides, ResolvedChannels, RuntimeConfigStore};
pub use validation::{Validate, ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::logging::init_logging;
    pub use crate::validation::{Validate, ValidationError};
}
