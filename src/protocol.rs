use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// Events the platform helper forwards into the service. `channelId` /
/// `isVisible` aliases accept the helper's own field casing unchanged.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformEvent {
    Authorized {
        #[serde(alias = "channelId")]
        channel_id: String,
        #[serde(default)]
        token: Option<String>,
    },
    Context {
        #[serde(default)]
        data: Value,
    },
    Visibility {
        #[serde(alias = "isVisible")]
        visible: bool,
    },
}

pub fn parse_platform_event(text: &str) -> Result<PlatformEvent> {
    serde_json::from_str::<PlatformEvent>(text).context("payload did not match a platform event")
}
