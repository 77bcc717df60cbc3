use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::fetch::FallbackPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Bind address for the surface/ingest http server.
    pub bind: String,
    /// Primary loadout API base.
    pub api_base: String,
    /// Secondary base tried when the primary fails; may equal `api_base`.
    pub fallback_api_base: String,
    /// Fixed refresh period for all surfaces, seconds.
    pub refresh_secs: u64,
    /// Serve the bundled sample loadouts when every endpoint fails, instead
    /// of showing the error surface.
    pub use_sample_fallback: bool,
    /// Override for the local settings-fallback directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:38080".to_owned(),
            api_base: "https://cod-extension.netlify.app".to_owned(),
            fallback_api_base: "https://cod-extension.netlify.app".to_owned(),
            refresh_secs: 30,
            use_sample_fallback: false,
            data_dir: None,
        }
    }
}

impl OverlayConfig {
    pub fn load_or_create() -> Result<(Self, PathBuf)> {
        let config_dir = dirs::config_dir()
            .context("unable to locate OS config directory")?
            .join("loadout-overlay");
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("failed creating config dir at {}", config_dir.display()))?;

        let config_path = config_dir.join("config.json");
        if !config_path.exists() {
            let default = Self::default();
            default.save(&config_path)?;
            return Ok((default, config_path));
        }

        let text = fs::read_to_string(&config_path)
            .with_context(|| format!("failed reading {}", config_path.display()))?;
        let config = serde_json::from_str::<Self>(&text)
            .with_context(|| format!("invalid json in {}", config_path.display()))?;
        Ok((config, config_path))
    }

    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let payload = serde_json::to_string_pretty(self).context("failed serializing config")?;
        fs::write(path, payload).with_context(|| format!("failed writing {}", path.display()))?;
        Ok(())
    }

    pub fn fallback_policy(&self) -> FallbackPolicy {
        if self.use_sample_fallback {
            FallbackPolicy::SampleData
        } else {
            FallbackPolicy::Strict
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        Ok(dirs::data_dir()
            .context("unable to locate OS data directory")?
            .join("loadout-overlay"))
    }
}
