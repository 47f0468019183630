//! Configuration validation for Sauti services.
//!
//! Checks ranges and formats before the service starts, so a bad cron
//! expression or a zero TTL fails loudly instead of stalling a loop.

use std::str::FromStr;
use thiserror::Error;

use crate::config::{
    AlertsConfig, Config, DetectionConfig, NetworkConfig, NotificationsConfig,
    ObservabilityConfig, RealtimeConfig,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

impl From<ValidationError> for crate::error::Error {
    fn from(err: ValidationError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

/// Severity names accepted in configuration.
pub const SEVERITY_NAMES: &[&str] = &["low", "medium", "high", "critical"];

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let sections: [&dyn Validate; 6] = [
            &self.network,
            &self.observability,
            &self.detection,
            &self.alerts,
            &self.notifications,
            &self.realtime,
        ];

        let mut errors: Vec<ValidationError> = sections
            .iter()
            .filter_map(|section| section.validate().err())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}

fn positive(value: u64, field: &str) -> ValidationResult<()> {
    if value == 0 {
        return Err(ValidationError::InvalidValue {
            field: field.into(),
            reason: "must be greater than 0".into(),
        });
    }
    Ok(())
}

fn cron_expression(expr: &str, field: &str) -> ValidationResult<()> {
    cron::Schedule::from_str(expr)
        .map(|_| ())
        .map_err(|e| ValidationError::InvalidValue {
            field: field.into(),
            reason: format!("invalid cron expression '{expr}': {e}"),
        })
}

impl Validate for NetworkConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                port: self.port,
                field: "network.port".into(),
            });
        }
        if self.bind.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "network.bind".into(),
            });
        }
        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}

impl Validate for DetectionConfig {
    fn validate(&self) -> ValidationResult<()> {
        positive(u64::from(self.window_hours), "detection.window_hours")?;
        positive(self.cache_ttl_secs, "detection.cache_ttl_secs")?;
        positive(self.trending_threshold as u64, "detection.trending_threshold")?;
        cron_expression(&self.schedule, "detection.schedule")
    }
}

impl Validate for AlertsConfig {
    fn validate(&self) -> ValidationResult<()> {
        positive(
            u64::from(self.red_flag_window_hours),
            "alerts.red_flag_window_hours",
        )
    }
}

impl Validate for NotificationsConfig {
    fn validate(&self) -> ValidationResult<()> {
        positive(self.timeout_secs, "notifications.timeout_secs")?;
        positive(self.queue_capacity as u64, "notifications.queue_capacity")?;
        positive(self.max_concurrency as u64, "notifications.max_concurrency")?;

        for stakeholder in &self.stakeholders {
            if !SEVERITY_NAMES.contains(&stakeholder.min_severity.to_lowercase().as_str()) {
                return Err(ValidationError::InvalidValue {
                    field: format!("notifications.stakeholders.{}.min_severity", stakeholder.id),
                    reason: format!("must be one of: {}", SEVERITY_NAMES.join(", ")),
                });
            }
        }
        Ok(())
    }
}

impl Validate for RealtimeConfig {
    fn validate(&self) -> ValidationResult<()> {
        positive(self.cache_ttl_secs, "realtime.cache_ttl_secs")?;
        positive(self.feedback_limit as u64, "realtime.feedback_limit")?;
        cron_expression(&self.schedule, "realtime.schedule")
    }
}
