use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{sync::Mutex, task::JoinHandle, time};
use tracing::{debug, info};

use crate::{
    fetch::{FallbackPolicy, FetchError, LoadoutClient},
    model::Loadout,
    protocol::PlatformEvent,
    render,
    settings::{ChannelSettings, SettingsStore},
    view::ViewState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    Panel,
    Overlay,
    Config,
}

/// User-visible surface phase. Every refresh outcome, success or failure,
/// lands in exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Error(String),
    Content,
}

#[derive(Debug, Clone)]
pub struct SurfaceOptions {
    pub kind: SurfaceKind,
    pub refresh_period: Duration,
    pub fallback_policy: FallbackPolicy,
}

impl SurfaceOptions {
    pub fn new(kind: SurfaceKind) -> Self {
        Self {
            kind,
            refresh_period: Duration::from_secs(30),
            fallback_policy: FallbackPolicy::default(),
        }
    }
}

/// Snapshot handed to the fetch pipeline so no lock is held across the
/// network round-trip.
#[derive(Debug, Clone)]
pub struct RefreshTicket {
    pub generation: u64,
    pub channel_id: String,
    pub auth_token: Option<String>,
    pub policy: FallbackPolicy,
}

/// One controller per surface. Owns the view state, the channel identity
/// captured from the authorization event, and the phase shown to the user.
#[derive(Debug)]
pub struct SurfaceController {
    options: SurfaceOptions,
    channel_id: Option<String>,
    auth_token: Option<String>,
    visible: bool,
    expanded: bool,
    phase: Phase,
    view: ViewState,
    settings: ChannelSettings,
    backend_ok: Option<bool>,
    last_updated: Option<DateTime<Utc>>,
}

impl SurfaceController {
    pub fn new(options: SurfaceOptions) -> Self {
        Self {
            options,
            channel_id: None,
            auth_token: None,
            visible: true,
            expanded: true,
            phase: Phase::Loading,
            view: ViewState::default(),
            settings: ChannelSettings::default(),
            backend_ok: None,
            last_updated: None,
        }
    }

    pub fn kind(&self) -> SurfaceKind {
        self.options.kind
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.channel_id.as_deref()
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn set_settings(&mut self, settings: ChannelSettings) {
        self.settings = settings;
    }

    pub fn set_backend_ok(&mut self, ok: bool) {
        self.backend_ok = Some(ok);
    }

    /// Applies a platform event; returns true when the surface should
    /// refresh immediately.
    pub fn handle_event(&mut self, event: &PlatformEvent) -> bool {
        match event {
            PlatformEvent::Authorized { channel_id, token } => {
                info!(kind = ?self.options.kind, channel = %channel_id, "surface authorized");
                self.channel_id = Some(channel_id.clone());
                self.auth_token = token.clone();
                self.phase = Phase::Loading;
                true
            }
            PlatformEvent::Visibility { visible } => {
                self.visible = *visible;
                *visible && self.channel_id.is_some()
            }
            PlatformEvent::Context { data } => {
                debug!(kind = ?self.options.kind, %data, "platform context update");
                false
            }
        }
    }

    /// Starts a refresh; `None` until an authorization event has supplied a
    /// channel, and `None` while the surface is hidden (it refreshes again
    /// the moment it becomes visible). The returned ticket carries the
    /// generation used to reject stale responses.
    pub fn begin_refresh(&mut self) -> Option<RefreshTicket> {
        if !self.visible {
            return None;
        }
        let channel_id = self.channel_id.clone()?;
        self.phase = Phase::Loading;
        Some(RefreshTicket {
            generation: self.view.begin_fetch(),
            channel_id,
            auth_token: self.auth_token.clone(),
            policy: self.options.fallback_policy,
        })
    }

    pub fn apply_success(&mut self, generation: u64, loadouts: Vec<Loadout>) {
        if !self.view.is_current(generation) {
            debug!(kind = ?self.options.kind, generation, "dropping stale fetch result");
            return;
        }
        self.view.set_loadouts(loadouts);
        self.phase = Phase::Content;
        self.last_updated = Some(Utc::now());
    }

    /// Leaves the (stale) loadout list untouched; only the phase changes.
    pub fn apply_failure(&mut self, generation: u64, error: &FetchError) {
        if !self.view.is_current(generation) {
            debug!(kind = ?self.options.kind, generation, "dropping stale fetch error");
            return;
        }
        self.phase = Phase::Error(format!("Failed to load loadouts: {error}"));
    }

    pub fn select_index(&mut self, index: usize) {
        self.view.select_index(index);
    }

    pub fn next(&mut self) {
        self.view.next();
    }

    pub fn previous(&mut self) {
        self.view.previous();
    }

    pub fn toggle_expanded(&mut self) {
        self.expanded = !self.expanded;
    }

    /// Renders the surface for its current phase.
    pub fn render(&self) -> String {
        match self.options.kind {
            SurfaceKind::Panel => match &self.phase {
                Phase::Loading => render::render_loading(),
                Phase::Error(message) => render::render_error(message),
                Phase::Content => {
                    let mut body = render::render_panel(self.view.loadouts());
                    body.push_str(&render::render_status_line(self.last_updated));
                    body
                }
            },
            SurfaceKind::Overlay => match &self.phase {
                Phase::Loading => render::render_loading(),
                Phase::Error(message) => render::render_error(message),
                Phase::Content => render::render_overlay(&self.view, self.expanded),
            },
            SurfaceKind::Config => {
                let count = match self.phase {
                    Phase::Content => Some(self.view.len()),
                    _ => None,
                };
                render::render_config_form(
                    self.channel_id.as_deref().unwrap_or("Unknown"),
                    &self.settings,
                    self.backend_ok,
                    count,
                )
            }
        }
    }
}

pub type SharedSurface = Arc<Mutex<SurfaceController>>;

/// Full refresh pipeline for one surface: snapshot under the lock, fetch
/// without it, re-acquire to apply. A ticket whose generation has been
/// superseded is discarded, so the last *started* fetch wins rather than
/// the last one to resolve.
pub async fn refresh_surface(surface: &SharedSurface, client: &LoadoutClient) {
    let Some(ticket) = surface.lock().await.begin_refresh() else {
        return;
    };
    let result = client
        .fetch_with_policy(
            &ticket.channel_id,
            ticket.auth_token.as_deref(),
            ticket.policy,
        )
        .await;
    let mut guard = surface.lock().await;
    match result {
        Ok(loadouts) => guard.apply_success(ticket.generation, loadouts),
        Err(err) => guard.apply_failure(ticket.generation, &err),
    }
}

/// Config-surface variant: also refreshes the stored settings and the
/// backend health probe shown on the form.
pub async fn refresh_config_surface(
    surface: &SharedSurface,
    client: &LoadoutClient,
    store: &SettingsStore,
) {
    let identity = {
        let guard = surface.lock().await;
        guard
            .channel_id()
            .map(|channel| (channel.to_owned(), guard.auth_token().map(str::to_owned)))
    };
    if let Some((channel_id, auth_token)) = identity {
        let backend_ok = client.backend_health().await.is_ok();
        let (settings, _source) = store.load(&channel_id, auth_token.as_deref()).await;
        let mut guard = surface.lock().await;
        guard.set_backend_ok(backend_ok);
        guard.set_settings(settings);
    }
    refresh_surface(surface, client).await;
}

/// Recurring refresh worker, one per surface. The handle must be aborted on
/// teardown so a discarded view is never updated.
pub fn spawn_refresh_worker(
    surface: SharedSurface,
    client: LoadoutClient,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        // The immediate first tick would race the authorization event.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            refresh_surface(&surface, &client).await;
        }
    })
}
