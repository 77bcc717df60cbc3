use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    model::{Item, Loadout, Weapon},
    normalize::normalize,
};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("endpoint returned http {status}")]
    Http { status: StatusCode },
    #[error("all loadout endpoints failed")]
    AllEndpointsFailed {
        #[source]
        last: Box<FetchError>,
    },
}

/// What to do when every endpoint has failed. The original surfaces drifted
/// apart here (raise vs. hardcoded test data); the policy is now explicit
/// and shared, with `Strict` as the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    #[default]
    Strict,
    SampleData,
}

/// Fetches a channel's loadouts, trying the primary endpoint first and the
/// fallback endpoint on any transport error or non-2xx response.
#[derive(Debug, Clone)]
pub struct LoadoutClient {
    http: reqwest::Client,
    api_base: String,
    fallback_api_base: String,
}

impl LoadoutClient {
    pub fn new(api_base: &str, fallback_api_base: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("failed building http client")?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_owned(),
            fallback_api_base: fallback_api_base.trim_end_matches('/').to_owned(),
        })
    }

    fn endpoint_urls(&self, channel_id: &str) -> [String; 2] {
        [
            format!("{}/streamer/{channel_id}/loadouts", self.api_base),
            format!("{}/api/loadouts/{channel_id}", self.fallback_api_base),
        ]
    }

    pub async fn fetch_loadouts(
        &self,
        channel_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Vec<Loadout>, FetchError> {
        let mut last_error: Option<FetchError> = None;
        for url in self.endpoint_urls(channel_id) {
            match self.fetch_one(&url, auth_token).await {
                Ok(raw) => {
                    debug!(%url, "loadout endpoint answered");
                    return Ok(normalize(&raw));
                }
                Err(err) => {
                    warn!(%url, error = %err, "loadout endpoint failed, trying next");
                    last_error = Some(err);
                }
            }
        }
        Err(FetchError::AllEndpointsFailed {
            last: Box::new(last_error.unwrap_or(FetchError::Http {
                status: StatusCode::NOT_FOUND,
            })),
        })
    }

    /// Same as `fetch_loadouts` but applies the exhaustion policy.
    pub async fn fetch_with_policy(
        &self,
        channel_id: &str,
        auth_token: Option<&str>,
        policy: FallbackPolicy,
    ) -> Result<Vec<Loadout>, FetchError> {
        match self.fetch_loadouts(channel_id, auth_token).await {
            Ok(loadouts) => Ok(loadouts),
            Err(err @ FetchError::AllEndpointsFailed { .. })
                if policy == FallbackPolicy::SampleData =>
            {
                warn!(error = %err, "serving sample loadouts after endpoint exhaustion");
                Ok(sample_loadouts())
            }
            Err(err) => Err(err),
        }
    }

    /// Plain reachability probe against the primary API root, shown on the
    /// config surface as backend status.
    pub async fn backend_health(&self) -> Result<(), FetchError> {
        let response = self.http.get(format!("{}/", self.api_base)).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Http {
                status: response.status(),
            });
        }
        Ok(())
    }

    async fn fetch_one(&self, url: &str, auth_token: Option<&str>) -> Result<Value, FetchError> {
        let mut request = self.http.get(url);
        if let Some(token) = auth_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Http {
                status: response.status(),
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

/// Static dataset served under `FallbackPolicy::SampleData`, mirroring the
/// two demo loadouts the backend seeds for new channels.
pub fn sample_loadouts() -> Vec<Loadout> {
    vec![
        Loadout {
            name: "Aggressive AR".to_owned(),
            primary: Some(Weapon {
                name: "M4A1".to_owned(),
                category: Some("Assault Rifle".to_owned()),
                image_url: None,
                attachments: vec![
                    ("optic".to_owned(), Item::named("Red Dot Sight")),
                    ("barrel".to_owned(), Item::named("Corvus Custom Marksman")),
                    ("underbarrel".to_owned(), Item::named("Commando Foregrip")),
                ],
            }),
            secondary: Some(Weapon {
                name: "X16".to_owned(),
                category: Some("Handgun".to_owned()),
                ..Weapon::default()
            }),
            tactical: Some(Item::named("Flash Grenade")),
            lethal: Some(Item::named("Frag Grenade")),
            field_upgrade: Some(Item::named("Dead Silence")),
            perks: vec![
                Item::named("Double Time"),
                Item::named("Ghost"),
                Item::named("Amped"),
            ],
        },
        Loadout {
            name: "Long Range".to_owned(),
            primary: Some(Weapon {
                name: "HDR".to_owned(),
                category: Some("Sniper Rifle".to_owned()),
                image_url: None,
                attachments: vec![
                    ("optic".to_owned(), Item::named("Variable Zoom Scope")),
                    ("barrel".to_owned(), Item::named("26.9\" HDR Pro")),
                ],
            }),
            secondary: Some(Weapon {
                name: "Renetti".to_owned(),
                category: Some("Handgun".to_owned()),
                ..Weapon::default()
            }),
            tactical: Some(Item::named("Smoke Grenade")),
            lethal: Some(Item::named("Claymore")),
            field_upgrade: Some(Item::named("Munitions Box")),
            perks: vec![
                Item::named("Cold-Blooded"),
                Item::named("Overkill"),
                Item::named("Spotter"),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::get,
        Json, Router,
    };
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::{sample_loadouts, FallbackPolicy, FetchError, LoadoutClient};
    use crate::normalize::MAX_LOADOUTS;

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

    fn two_loadouts() -> serde_json::Value {
        json!([
            {"name": "Alpha", "primary": {"name": "M4A1"}},
            {"name": "Bravo", "primary": {"name": "HDR"}}
        ])
    }

    #[test]
    fn endpoint_urls_follow_primary_then_fallback() {
        let client =
            LoadoutClient::new("https://api.example/", "https://alt.example").expect("client");
        let urls = client.endpoint_urls("chan42");
        assert_eq!(urls[0], "https://api.example/streamer/chan42/loadouts");
        assert_eq!(urls[1], "https://alt.example/api/loadouts/chan42");
    }

    #[test]
    fn sample_data_respects_the_cap() {
        assert!(sample_loadouts().len() <= MAX_LOADOUTS);
    }

    #[tokio::test]
    async fn primary_500_falls_back_to_secondary() {
        let primary = spawn_server(Router::new().route(
            "/streamer/{channel}/loadouts",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        ))
        .await;
        let fallback = spawn_server(Router::new().route(
            "/api/loadouts/{channel}",
            get(|| async { Json(two_loadouts()) }),
        ))
        .await;

        let client = LoadoutClient::new(
            &format!("http://{primary}"),
            &format!("http://{fallback}"),
        )
        .expect("client");
        let loadouts = client
            .fetch_loadouts("chan", None)
            .await
            .expect("fallback endpoint should answer");
        assert_eq!(loadouts.len(), 2);
        assert_eq!(loadouts[0].name, "Alpha");
    }

    #[tokio::test]
    async fn bearer_token_is_forwarded_when_present() {
        let app = Router::new().route(
            "/streamer/{channel}/loadouts",
            get(|Path(channel): Path<String>, headers: HeaderMap| async move {
                assert_eq!(channel, "chan");
                let auth = headers
                    .get("authorization")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default()
                    .to_owned();
                if auth == "Bearer sekrit" {
                    Json(two_loadouts()).into_response()
                } else {
                    StatusCode::UNAUTHORIZED.into_response()
                }
            }),
        );
        let addr = spawn_server(app).await;

        let client = LoadoutClient::new(
            &format!("http://{addr}"),
            &format!("http://{addr}"),
        )
        .expect("client");
        let loadouts = client
            .fetch_loadouts("chan", Some("sekrit"))
            .await
            .expect("authorized fetch should succeed");
        assert_eq!(loadouts.len(), 2);
    }

    #[tokio::test]
    async fn exhaustion_is_all_endpoints_failed_under_strict() {
        let failing = spawn_server(Router::new().route(
            "/streamer/{channel}/loadouts",
            get(|| async { StatusCode::BAD_GATEWAY }),
        ))
        .await;

        let client = LoadoutClient::new(
            &format!("http://{failing}"),
            &format!("http://{failing}"),
        )
        .expect("client");
        let err = client
            .fetch_loadouts("chan", None)
            .await
            .expect_err("both endpoints should fail");
        assert!(matches!(err, FetchError::AllEndpointsFailed { .. }));
    }

    #[tokio::test]
    async fn exhaustion_serves_samples_under_sample_policy() {
        let failing = spawn_server(Router::new().route(
            "/streamer/{channel}/loadouts",
            get(|| async { StatusCode::BAD_GATEWAY }),
        ))
        .await;

        let client = LoadoutClient::new(
            &format!("http://{failing}"),
            &format!("http://{failing}"),
        )
        .expect("client");
        let loadouts = client
            .fetch_with_policy("chan", None, FallbackPolicy::SampleData)
            .await
            .expect("sample policy should absorb the failure");
        assert_eq!(loadouts, sample_loadouts());
    }

    #[tokio::test]
    async fn keyed_object_body_is_normalized() {
        let app = Router::new().route(
            "/streamer/{channel}/loadouts",
            get(|| async {
                Json(json!({
                    "a": {"name": "Alpha"},
                    "b": {"name": "Bravo"}
                }))
            }),
        );
        let addr = spawn_server(app).await;
        let client = LoadoutClient::new(
            &format!("http://{addr}"),
            &format!("http://{addr}"),
        )
        .expect("client");
        let loadouts = client.fetch_loadouts("chan", None).await.expect("fetch");
        assert_eq!(loadouts.len(), 2);
    }
}
