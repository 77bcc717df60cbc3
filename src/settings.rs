use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Per-channel extension settings, in the wire shape the backend and the
/// browser pages already agreed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
    pub overlay_enabled: bool,
    /// Seconds between surface refreshes.
    pub refresh_interval: u32,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            overlay_enabled: true,
            refresh_interval: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSource {
    Remote,
    LocalFallback,
    Defaults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Remote,
    LocalFallback,
}

/// Loads and saves channel settings against `{base}/api/config/{channel}`,
/// degrading to a per-channel JSON file under the data dir whenever the
/// remote side is unavailable. A save never hard-fails unless the local
/// write fails too.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    http: reqwest::Client,
    api_base: String,
    data_dir: PathBuf,
}

impl SettingsStore {
    pub fn new(api_base: &str, data_dir: PathBuf) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("failed building settings http client")?;
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed creating data dir at {}", data_dir.display()))?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_owned(),
            data_dir,
        })
    }

    fn config_url(&self, channel_id: &str) -> String {
        format!("{}/api/config/{channel_id}", self.api_base)
    }

    fn local_path(&self, channel_id: &str) -> PathBuf {
        self.data_dir.join(format!("config-{channel_id}.json"))
    }

    pub async fn load(
        &self,
        channel_id: &str,
        auth_token: Option<&str>,
    ) -> (ChannelSettings, SettingsSource) {
        match self.load_remote(channel_id, auth_token).await {
            Ok(Some(settings)) => return (settings, SettingsSource::Remote),
            Ok(None) => {
                // 404: the channel has never saved a config.
                return (ChannelSettings::default(), SettingsSource::Defaults);
            }
            Err(err) => {
                warn!(channel = %channel_id, error = %err, "remote config unavailable, trying local fallback");
            }
        }
        match load_local(&self.local_path(channel_id)) {
            Ok(Some(settings)) => (settings, SettingsSource::LocalFallback),
            Ok(None) => (ChannelSettings::default(), SettingsSource::Defaults),
            Err(err) => {
                warn!(channel = %channel_id, error = %err, "local config unreadable, using defaults");
                (ChannelSettings::default(), SettingsSource::Defaults)
            }
        }
    }

    pub async fn save(
        &self,
        channel_id: &str,
        auth_token: Option<&str>,
        settings: &ChannelSettings,
    ) -> Result<SaveOutcome> {
        match self.save_remote(channel_id, auth_token, settings).await {
            Ok(()) => {
                info!(channel = %channel_id, "configuration saved remotely");
                Ok(SaveOutcome::Remote)
            }
            Err(err) => {
                warn!(channel = %channel_id, error = %err, "remote save failed, persisting locally");
                save_local(&self.local_path(channel_id), settings)?;
                Ok(SaveOutcome::LocalFallback)
            }
        }
    }

    async fn load_remote(
        &self,
        channel_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Option<ChannelSettings>> {
        let mut request = self.http.get(self.config_url(channel_id));
        if let Some(token) = auth_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.context("config request failed")?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("config endpoint returned http {}", response.status());
        }
        let settings = response
            .json::<ChannelSettings>()
            .await
            .context("config endpoint returned invalid json")?;
        Ok(Some(settings))
    }

    async fn save_remote(
        &self,
        channel_id: &str,
        auth_token: Option<&str>,
        settings: &ChannelSettings,
    ) -> Result<()> {
        let mut request = self.http.post(self.config_url(channel_id)).json(settings);
        if let Some(token) = auth_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.context("config save request failed")?;
        if !response.status().is_success() {
            anyhow::bail!("config save returned http {}", response.status());
        }
        Ok(())
    }
}

fn load_local(path: &Path) -> Result<Option<ChannelSettings>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed reading settings at {}", path.display()))?;
    let parsed = serde_json::from_str::<ChannelSettings>(&text)
        .with_context(|| format!("invalid settings json at {}", path.display()))?;
    Ok(Some(parsed))
}

fn save_local(path: &Path, settings: &ChannelSettings) -> Result<()> {
    let payload =
        serde_json::to_string_pretty(settings).context("failed serializing settings")?;
    fs::write(path, payload)
        .with_context(|| format!("failed writing settings at {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{net::SocketAddr, path::PathBuf, time::SystemTime};

    use axum::{
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::get,
        Json, Router,
    };
    use tokio::net::TcpListener;

    use super::{ChannelSettings, SaveOutcome, SettingsSource, SettingsStore};

    fn temp_data_dir(tag: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("clock should be valid")
            .as_nanos();
        std::env::temp_dir().join(format!("loadout_overlay_{tag}_{unique}"))
    }

    async fn spawn_server(app: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("test listener should bind");
        let addr = listener.local_addr().expect("listener should have an addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("test server");
        });
        addr
    }

    /// An address nothing listens on: bind, read the port, drop the socket.
    async fn dead_endpoint() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("test listener should bind");
        listener.local_addr().expect("listener should have an addr")
    }

    #[test]
    fn wire_shape_uses_camel_case() {
        let parsed: ChannelSettings =
            serde_json::from_str(r#"{"overlayEnabled": false, "refreshInterval": 60}"#)
                .expect("settings should parse");
        assert!(!parsed.overlay_enabled);
        assert_eq!(parsed.refresh_interval, 60);

        let raw = serde_json::to_string(&ChannelSettings::default()).expect("serialize");
        assert!(raw.contains("overlayEnabled"));
        assert!(raw.contains("refreshInterval"));
    }

    #[tokio::test]
    async fn missing_remote_config_yields_defaults() {
        let addr = spawn_server(Router::new().route(
            "/api/config/{channel}",
            get(|| async { StatusCode::NOT_FOUND }),
        ))
        .await;
        let store = SettingsStore::new(&format!("http://{addr}"), temp_data_dir("defaults"))
            .expect("store");
        let (settings, source) = store.load("chan", None).await;
        assert_eq!(settings, ChannelSettings::default());
        assert_eq!(source, SettingsSource::Defaults);
    }

    #[tokio::test]
    async fn remote_config_wins_when_available() {
        let addr = spawn_server(Router::new().route(
            "/api/config/{channel}",
            get(|| async {
                Json(ChannelSettings {
                    overlay_enabled: false,
                    refresh_interval: 120,
                })
            }),
        ))
        .await;
        let store =
            SettingsStore::new(&format!("http://{addr}"), temp_data_dir("remote")).expect("store");
        let (settings, source) = store.load("chan", None).await;
        assert_eq!(source, SettingsSource::Remote);
        assert!(!settings.overlay_enabled);
        assert_eq!(settings.refresh_interval, 120);
    }

    #[tokio::test]
    async fn bearer_token_reaches_the_config_endpoint() {
        fn authorized(headers: &HeaderMap) -> bool {
            headers
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                == Some("Bearer sekrit")
        }
        let app = Router::new().route(
            "/api/config/{channel}",
            get(|headers: HeaderMap| async move {
                if authorized(&headers) {
                    Json(ChannelSettings::default()).into_response()
                } else {
                    StatusCode::UNAUTHORIZED.into_response()
                }
            })
            .post(|headers: HeaderMap, Json(_body): Json<ChannelSettings>| async move {
                if authorized(&headers) {
                    StatusCode::OK
                } else {
                    StatusCode::UNAUTHORIZED
                }
            }),
        );
        let addr = spawn_server(app).await;
        let store =
            SettingsStore::new(&format!("http://{addr}"), temp_data_dir("bearer")).expect("store");

        let (_, source) = store.load("chan", Some("sekrit")).await;
        assert_eq!(source, SettingsSource::Remote);

        let outcome = store
            .save("chan", Some("sekrit"), &ChannelSettings::default())
            .await
            .expect("authorized save should succeed");
        assert_eq!(outcome, SaveOutcome::Remote);
    }

    #[tokio::test]
    async fn failed_save_degrades_to_local_and_loads_back() {
        let dead = dead_endpoint().await;
        let dir = temp_data_dir("fallback");
        let store = SettingsStore::new(&format!("http://{dead}"), dir.clone()).expect("store");

        let settings = ChannelSettings {
            overlay_enabled: false,
            refresh_interval: 15,
        };
        let outcome = store
            .save("chan", Some("token"), &settings)
            .await
            .expect("local fallback save should succeed");
        assert_eq!(outcome, SaveOutcome::LocalFallback);

        let (loaded, source) = store.load("chan", Some("token")).await;
        assert_eq!(source, SettingsSource::LocalFallback);
        assert_eq!(loaded, settings);

        std::fs::remove_dir_all(&dir).ok();
    }
}
