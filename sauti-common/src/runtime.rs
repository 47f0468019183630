//! Runtime-overridable settings.
//!
//! A small JSON document (`runtime.json`) whose values take precedence over
//! the static configuration and can be changed while the service runs. Only
//! the `alerts` section is defined today: the chat webhook and generic webhook
//! URLs used for alert notifications.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::config::NotificationsConfig;
use crate::config_loader::{load_json_file, merge_json, write_json_file};
use crate::util::non_empty;

const ALERTS_SECTION: &str = "alerts";

/// Overrides for the alert notification channels.
///
/// Empty strings mean "not overridden".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertChannelOverrides {
    #[serde(default)]
    pub slack_webhook_url: String,
    #[serde(default)]
    pub alert_webhook_url: String,
}

/// Channel URLs after applying overrides on top of static configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedChannels {
    pub slack_webhook_url: Option<String>,
    pub alert_webhook_url: Option<String>,
}

impl ResolvedChannels {
    /// True when no channel is configured at all.
    pub fn is_empty(&self) -> bool {
        self.slack_webhook_url.is_none() && self.alert_webhook_url.is_none()
    }
}

/// File-backed store for runtime overrides.
pub struct RuntimeConfigStore {
    path: Option<PathBuf>,
    document: RwLock<Value>,
}

impl RuntimeConfigStore {
    /// Open the store at `path`, reading existing overrides if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let document = load_json_file(&path)?.unwrap_or(Value::Object(Default::default()));
        Ok(Self {
            path: Some(path),
            document: RwLock::new(document),
        })
    }

    /// A store that keeps overrides in memory only.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            document: RwLock::new(Value::Object(Default::default())),
        }
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current alert channel overrides.
    pub fn alert_channels(&self) -> AlertChannelOverrides {
        let document = match self.document.read() {
            Ok(doc) => doc,
            Err(poisoned) => poisoned.into_inner(),
        };

        document
            .get(ALERTS_SECTION)
            .cloned()
            .and_then(|section| serde_json::from_value(section).ok())
            .unwrap_or_default()
    }

    /// Replace the alert channel overrides and persist them.
    ///
    /// Other sections of the document are preserved. On a failed write the
    /// previous overrides stay in effect.
    pub fn set_alert_channels(&self, overrides: &AlertChannelOverrides) -> Result<()> {
        let section = serde_json::to_value(overrides)?;
        let mut patch = serde_json::Map::new();
        patch.insert(ALERTS_SECTION.to_string(), section);

        let mut document = match self.document.write() {
            Ok(doc) => doc,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut updated = document.clone();
        merge_json(&mut updated, Value::Object(patch));

        // In-memory values only change once the file write succeeded.
        if let Some(path) = &self.path {
            write_json_file(path, &updated)?;
        }
        *document = updated;

        tracing::info!(
            slack = !overrides.slack_webhook_url.trim().is_empty(),
            webhook = !overrides.alert_webhook_url.trim().is_empty(),
            "Alert channel overrides updated"
        );
        Ok(())
    }

    /// Resolve channel URLs: a non-blank override wins, otherwise the static value.
    pub fn resolve_channels(&self, fallback: &NotificationsConfig) -> ResolvedChannels {
        let overrides = self.alert_channels();
        ResolvedChannels {
            slack_webhook_url: non_empty(Some(&overrides.slack_webhook_url))
                .or_else(|| non_empty(fallback.slack_webhook_url.as_deref())),
            alert_webhook_url: non_empty(Some(&overrides.alert_webhook_url))
                .or_else(|| non_empty(fallback.alert_webhook_url.as_deref())),
        }
    }
}
