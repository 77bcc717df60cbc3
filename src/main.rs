mod config;
mod fetch;
mod model;
mod normalize;
mod protocol;
mod render;
mod settings;
mod surface;
mod view;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::Mutex, task::JoinHandle, time};
use tracing::{error, info, warn};

use crate::{
    config::OverlayConfig,
    fetch::LoadoutClient,
    protocol::{parse_platform_event, PlatformEvent},
    settings::{ChannelSettings, SaveOutcome, SettingsStore},
    surface::{
        refresh_config_surface, refresh_surface, spawn_refresh_worker, SharedSurface,
        SurfaceController, SurfaceKind, SurfaceOptions,
    },
};

#[derive(Clone)]
struct AppState {
    panel: SharedSurface,
    overlay: SharedSurface,
    config_surface: SharedSurface,
    client: LoadoutClient,
    store: SettingsStore,
}

impl AppState {
    fn surfaces(&self) -> [&SharedSurface; 3] {
        [&self.panel, &self.overlay, &self.config_surface]
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (config, config_path) = OverlayConfig::load_or_create()?;
    info!(path = %config_path.display(), "loaded configuration");

    let addr: SocketAddr = config
        .bind
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.bind))?;

    let client = LoadoutClient::new(&config.api_base, &config.fallback_api_base)?;
    let store = SettingsStore::new(&config.api_base, config.data_dir()?)?;

    let period = Duration::from_secs(config.refresh_secs.max(1));
    let mut options = SurfaceOptions::new(SurfaceKind::Panel);
    options.refresh_period = period;
    options.fallback_policy = config.fallback_policy();

    let panel = shared_surface(SurfaceKind::Panel, &options);
    let overlay = shared_surface(SurfaceKind::Overlay, &options);
    let config_surface = shared_surface(SurfaceKind::Config, &options);

    let state = AppState {
        panel,
        overlay,
        config_surface,
        client,
        store,
    };

    let mut handles = RefreshHandles {
        panel: Some(spawn_refresh_worker(
            state.panel.clone(),
            state.client.clone(),
            period,
        )),
        overlay: Some(spawn_refresh_worker(
            state.overlay.clone(),
            state.client.clone(),
            period,
        )),
        config: Some(spawn_config_worker(
            state.config_surface.clone(),
            state.client.clone(),
            state.store.clone(),
            period,
        )),
    };

    let app = router(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed binding listener on {addr}"))?;
    info!("surfaces available at http://{addr}/panel /overlay /config");
    info!("event ingest at ws://{addr}/events and http://{addr}/ingest");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("axum serve failed")?;

    // Teardown: no refresh may touch a discarded view.
    handles.abort_all();
    Ok(())
}

fn shared_surface(kind: SurfaceKind, base: &SurfaceOptions) -> SharedSurface {
    let mut options = base.clone();
    options.kind = kind;
    Arc::new(Mutex::new(SurfaceController::new(options)))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(?err, "failed waiting for shutdown signal");
    }
}

#[derive(Default)]
struct RefreshHandles {
    panel: Option<JoinHandle<()>>,
    overlay: Option<JoinHandle<()>>,
    config: Option<JoinHandle<()>>,
}

impl RefreshHandles {
    fn abort_all(&mut self) {
        abort_handle(&mut self.panel);
        abort_handle(&mut self.overlay);
        abort_handle(&mut self.config);
    }
}

fn abort_handle(handle: &mut Option<JoinHandle<()>>) {
    if let Some(task) = handle.take() {
        task.abort();
    }
}

fn spawn_config_worker(
    surface: SharedSurface,
    client: LoadoutClient,
    store: SettingsStore,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            refresh_config_surface(&surface, &client, &store).await;
        }
    })
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/panel", get(render_panel_page))
        .route("/panel/refresh", post(refresh_panel))
        .route("/overlay", get(render_overlay_page))
        .route("/overlay/refresh", post(refresh_overlay))
        .route("/overlay/next", post(overlay_next))
        .route("/overlay/prev", post(overlay_prev))
        .route("/overlay/toggle", post(overlay_toggle))
        .route("/overlay/select/{index}", post(overlay_select))
        .route("/config", get(render_config_page).post(save_config))
        .route("/events", get(events_socket))
        .route("/ingest", post(ingest_event))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

async fn render_panel_page(State(state): State<AppState>) -> Html<String> {
    let body = state.panel.lock().await.render();
    Html(render::page("Loadouts", &body))
}

async fn render_overlay_page(State(state): State<AppState>) -> Html<String> {
    let body = state.overlay.lock().await.render();
    Html(render::page("Loadout Overlay", &body))
}

async fn render_config_page(State(state): State<AppState>) -> Html<String> {
    let body = state.config_surface.lock().await.render();
    Html(render::page("Extension Configuration", &body))
}

async fn refresh_panel(State(state): State<AppState>) -> StatusCode {
    refresh_surface(&state.panel, &state.client).await;
    StatusCode::ACCEPTED
}

async fn refresh_overlay(State(state): State<AppState>) -> StatusCode {
    refresh_surface(&state.overlay, &state.client).await;
    StatusCode::ACCEPTED
}

/// Navigation mutates only the overlay's active-loadout region; the
/// re-rendered fragment goes straight back to the caller.
async fn overlay_next(State(state): State<AppState>) -> Html<String> {
    let mut guard = state.overlay.lock().await;
    guard.next();
    Html(guard.render())
}

async fn overlay_prev(State(state): State<AppState>) -> Html<String> {
    let mut guard = state.overlay.lock().await;
    guard.previous();
    Html(guard.render())
}

async fn overlay_toggle(State(state): State<AppState>) -> Html<String> {
    let mut guard = state.overlay.lock().await;
    guard.toggle_expanded();
    Html(guard.render())
}

async fn overlay_select(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Html<String> {
    let mut guard = state.overlay.lock().await;
    guard.select_index(index);
    Html(guard.render())
}

async fn save_config(
    State(state): State<AppState>,
    Json(settings): Json<ChannelSettings>,
) -> impl IntoResponse {
    let identity = {
        let guard = state.config_surface.lock().await;
        guard
            .channel_id()
            .map(|channel| (channel.to_owned(), guard.auth_token().map(str::to_owned)))
    };
    let Some((channel_id, auth_token)) = identity else {
        return (
            StatusCode::CONFLICT,
            Json(json!({"error": "channel not authorized yet"})),
        );
    };

    match state
        .store
        .save(&channel_id, auth_token.as_deref(), &settings)
        .await
    {
        Ok(outcome) => {
            state.config_surface.lock().await.set_settings(settings);
            let stored = match outcome {
                SaveOutcome::Remote => "remote",
                SaveOutcome::LocalFallback => "local",
            };
            (StatusCode::OK, Json(json!({"stored": stored})))
        }
        Err(err) => {
            error!(?err, channel = %channel_id, "configuration save failed entirely");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": err.to_string()})),
            )
        }
    }
}

async fn events_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    while let Some(message_result) = socket.recv().await {
        match message_result {
            Ok(Message::Text(text)) => match parse_platform_event(&text) {
                Ok(event) => dispatch_platform_event(&state, event).await,
                Err(err) => {
                    warn!(?err, payload = %text, "ignored unknown payload");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                error!(?err, "socket receive error");
                break;
            }
        }
    }
}

async fn ingest_event(State(state): State<AppState>, Json(payload): Json<Value>) -> StatusCode {
    match parse_platform_event(&payload.to_string()) {
        Ok(event) => {
            dispatch_platform_event(&state, event).await;
            StatusCode::ACCEPTED
        }
        Err(err) => {
            warn!(?err, "rejected ingest payload");
            StatusCode::BAD_REQUEST
        }
    }
}

/// Fans a platform event out to every surface; surfaces that ask for an
/// immediate refresh get one off the ingest path.
async fn dispatch_platform_event(state: &AppState, event: PlatformEvent) {
    for surface in state.surfaces() {
        let (wants_refresh, kind) = {
            let mut guard = surface.lock().await;
            (guard.handle_event(&event), guard.kind())
        };
        if wants_refresh {
            let surface = surface.clone();
            let client = state.client.clone();
            let store = state.store.clone();
            tokio::spawn(async move {
                if kind == SurfaceKind::Config {
                    refresh_config_surface(&surface, &client, &store).await;
                } else {
                    refresh_surface(&surface, &client).await;
                }
            });
        }
    }
}
