use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lumen_fixtures::{FixtureCatalog, Target};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::ddp::DdpSender;
use crate::effect::{
    render_layer, validate_params, Layer, Palette, ParamValue, Params, ParticleEffect,
    RESOLVED_PALETTE_KEY,
};
use crate::frame::{apply_brightness, composite_layer, frame_buffer, BlendMode};
use crate::health::FixtureHealth;
use crate::target::{resolve, resolved_length};

/// Everything needed to start a streaming session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSpec {
    pub targets: Vec<Target>,
    pub layers: Vec<Layer>,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub exclusive: bool,
    #[serde(default)]
    pub excluded_fixtures: Vec<String>,
    #[serde(default)]
    pub playlist_id: Option<String>,
}

fn default_fps() -> u32 {
    30
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    Paused,
    Stopped,
}

/// Commands delivered to a session's worker. Applied between frames, so
/// an update can never tear a frame in progress.
#[derive(Debug)]
pub enum SessionCommand {
    Pause,
    Resume,
    Stop,
    UpdateParam {
        layer_id: Option<String>,
        name: String,
        value: ParamValue,
    },
    UpdateLayerProperty {
        layer_id: String,
        blend_mode: Option<BlendMode>,
        opacity: Option<f64>,
        enabled: Option<bool>,
    },
    SetLayers(Vec<Layer>),
    SetBrightness(f64),
}

/// Query surface shared between a worker and the supervisor.
pub struct SessionShared {
    pub id: String,
    pub targets: Vec<Target>,
    pub excluded_fixtures: Vec<String>,
    pub exclusive: bool,
    pub fps: u32,
    pub playlist_id: Option<String>,
    pub layers: RwLock<Vec<Layer>>,
    pub state: RwLock<SessionState>,
    pub started_at: DateTime<Utc>,
    pub last_frame_at: RwLock<Option<DateTime<Utc>>>,
}

/// Snapshot of one session for the management API.
#[derive(Clone, Debug, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub targets: Vec<Target>,
    pub state: SessionState,
    pub fps: u32,
    pub exclusive: bool,
    pub layer_count: usize,
    pub started_at: DateTime<Utc>,
    pub last_frame_at: Option<DateTime<Utc>>,
    pub playlist_id: Option<String>,
}

impl SessionShared {
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            targets: self.targets.clone(),
            state: *self.state.read(),
            fps: self.fps,
            exclusive: self.exclusive,
            layer_count: self.layers.read().len(),
            started_at: self.started_at,
            last_frame_at: *self.last_frame_at.read(),
            playlist_id: self.playlist_id.clone(),
        }
    }
}

/// One layer plus its render-time state: a parameter bag with any
/// referenced palette materialized, and per-target particle state for
/// the stateful effects.
struct LayerRuntime {
    layer: Layer,
    params: Params,
    particles: HashMap<String, Box<dyn ParticleEffect>>,
}

impl LayerRuntime {
    fn new(layer: Layer, palettes: &[Palette]) -> Self {
        validate_params(layer.effect.kind, &layer.effect.params);
        let params = materialize_palette(&layer.effect.params, palettes);
        LayerRuntime {
            layer,
            params,
            particles: HashMap::new(),
        }
    }
}

/// Copy the parameter bag, expanding a `palette` reference into the
/// concrete color list the generators read.
fn materialize_palette(params: &Params, palettes: &[Palette]) -> Params {
    let mut out = params.clone();
    if let Some(palette_id) = params.palette_ref() {
        match palettes.iter().find(|p| p.id == palette_id) {
            Some(palette) => {
                out.set(RESOLVED_PALETTE_KEY, ParamValue::colors(palette.colors.clone()));
            }
            None => log::warn!("palette '{}' not found; effect falls back to colors", palette_id),
        }
    }
    out
}

/// The per-session worker. Owns the layer stack, particle state, the
/// frame clock `t` and a DDP sender; driven by a tick interval and a
/// command mailbox.
pub(crate) struct SessionWorker {
    shared: Arc<SessionShared>,
    catalog: Arc<RwLock<FixtureCatalog>>,
    palettes: Arc<RwLock<Vec<Palette>>>,
    health: FixtureHealth,
    sender: DdpSender,
    layers: Vec<LayerRuntime>,
    brightness: f64,
    t: f64,
}

impl SessionWorker {
    pub(crate) fn new(
        shared: Arc<SessionShared>,
        catalog: Arc<RwLock<FixtureCatalog>>,
        palettes: Arc<RwLock<Vec<Palette>>>,
        health: FixtureHealth,
        sender: DdpSender,
    ) -> Self {
        let layers = {
            let palettes = palettes.read();
            shared
                .layers
                .read()
                .iter()
                .cloned()
                .map(|l| LayerRuntime::new(l, &palettes))
                .collect()
        };
        SessionWorker {
            shared,
            catalog,
            palettes,
            health,
            sender,
            layers,
            brightness: 1.0,
            t: 0.0,
        }
    }

    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<SessionCommand>) {
        let frame_period = 1.0 / self.shared.fps as f64;
        let mut ticker = interval(Duration::from_secs_f64(frame_period));
        // Late ticks are dropped, never replayed: a stalled frame must
        // not trigger a burst of catch-up frames.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        log::info!(
            "session '{}' started: {} targets at {} fps",
            self.shared.id,
            self.shared.targets.len(),
            self.shared.fps
        );

        loop {
            tokio::select! {
                cmd = rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if self.apply_command(cmd) {
                                break;
                            }
                        }
                        // All senders gone: treat as stop.
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    if *self.shared.state.read() != SessionState::Active {
                        continue;
                    }
                    // The first frame renders at t = 0; t advances once
                    // per emitted frame (skipped ticks do not catch up).
                    if !self.render_frame(frame_period) {
                        log::warn!(
                            "session '{}' lost all fixtures, stopping",
                            self.shared.id
                        );
                        break;
                    }
                    self.t += frame_period;
                }
            }
        }

        self.blackout();
        *self.shared.state.write() = SessionState::Stopped;
        log::info!("session '{}' stopped", self.shared.id);
    }

    /// Returns true when the command ends the session.
    fn apply_command(&mut self, cmd: SessionCommand) -> bool {
        match cmd {
            SessionCommand::Pause => {
                let mut state = self.shared.state.write();
                if *state == SessionState::Active {
                    *state = SessionState::Paused;
                }
            }
            SessionCommand::Resume => {
                let mut state = self.shared.state.write();
                if *state == SessionState::Paused {
                    *state = SessionState::Active;
                }
            }
            SessionCommand::Stop => return true,
            SessionCommand::UpdateParam {
                layer_id,
                name,
                value,
            } => {
                let palettes = self.palettes.read().clone();
                for runtime in &mut self.layers {
                    if layer_id.as_deref().is_none_or(|id| id == runtime.layer.id) {
                        runtime.layer.effect.params.set(name.clone(), value.clone());
                        runtime.params = materialize_palette(&runtime.layer.effect.params, &palettes);
                    }
                }
                self.publish_layers();
            }
            SessionCommand::UpdateLayerProperty {
                layer_id,
                blend_mode,
                opacity,
                enabled,
            } => {
                if let Some(runtime) = self.layers.iter_mut().find(|r| r.layer.id == layer_id) {
                    if let Some(mode) = blend_mode {
                        runtime.layer.blend_mode = mode;
                    }
                    if let Some(opacity) = opacity {
                        runtime.layer.opacity = opacity.clamp(0.0, 1.0);
                    }
                    if let Some(enabled) = enabled {
                        runtime.layer.enabled = enabled;
                    }
                }
                self.publish_layers();
            }
            SessionCommand::SetLayers(layers) => {
                let palettes = self.palettes.read().clone();
                self.layers = layers
                    .into_iter()
                    .map(|l| LayerRuntime::new(l, &palettes))
                    .collect();
                self.publish_layers();
            }
            SessionCommand::SetBrightness(factor) => {
                self.brightness = factor.clamp(0.0, 1.0);
            }
        }
        false
    }

    fn publish_layers(&self) {
        *self.shared.layers.write() =
            self.layers.iter().map(|r| r.layer.clone()).collect();
    }

    /// Render and send one frame for every target. Returns false when no
    /// target resolves to any span anymore.
    fn render_frame(&mut self, dt: f64) -> bool {
        let catalog = self.catalog.read().clone();
        let mut any_spans = false;

        for target in &self.shared.targets.clone() {
            let spans = match resolve(target, &catalog, &self.health, &self.shared.excluded_fixtures)
            {
                Ok(spans) => spans,
                Err(err) => {
                    log::warn!("session '{}': {}", self.shared.id, err);
                    continue;
                }
            };
            let n = resolved_length(&spans);
            if n == 0 {
                continue;
            }
            any_spans = true;

            let composite = self.composite_target(target, n, dt);

            let mut cursor = 0usize;
            for span in &spans {
                let bytes = &composite[cursor * 3..(cursor + span.length) * 3];
                cursor += span.length;

                let Some(fixture) = catalog.fixture(&span.fixture_id) else {
                    self.health.record_failure(&span.fixture_id);
                    continue;
                };
                match self.sender.send_pixels(fixture, span.pixel_offset, bytes) {
                    Ok(()) => self.health.record_success(&span.fixture_id),
                    Err(err) => {
                        log::debug!("send to '{}' failed: {}", span.fixture_id, err);
                        self.health.record_failure(&span.fixture_id);
                    }
                }
            }
        }

        *self.shared.last_frame_at.write() = Some(Utc::now());
        any_spans
    }

    /// Generate all enabled layers at the current `t` and composite them.
    fn composite_target(&mut self, target: &Target, n: usize, dt: f64) -> Vec<u8> {
        let mut composite = frame_buffer(n);
        let mut scratch = frame_buffer(n);
        let target_key = target.to_string();
        let t = self.t;

        for runtime in &mut self.layers {
            if !runtime.layer.enabled {
                continue;
            }
            let kind = runtime.layer.effect.kind;

            if kind.is_particle() && !runtime.particles.contains_key(&target_key) {
                if let Some(state) = kind.new_particle() {
                    runtime.particles.insert(target_key.clone(), state);
                }
            }
            let state = runtime.particles.get_mut(&target_key);

            let params = &runtime.params;
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                render_layer(kind, params, state, n, t, dt, &mut scratch);
            }));
            match outcome {
                Ok(()) => composite_layer(
                    &mut composite,
                    &scratch,
                    runtime.layer.blend_mode,
                    runtime.layer.opacity,
                ),
                Err(_) => {
                    // A failing generator disables its layer; the session
                    // keeps running with the remaining stack.
                    log::error!(
                        "effect '{}' panicked; disabling layer '{}'",
                        kind,
                        runtime.layer.id
                    );
                    runtime.layer.enabled = false;
                }
            }
        }

        apply_brightness(&mut composite, self.brightness);
        composite
    }

    /// Final frame: every resolved span goes dark, with a PUSH so the
    /// fixtures latch the blackout.
    fn blackout(&mut self) {
        let catalog = self.catalog.read().clone();
        for target in &self.shared.targets {
            let Ok(spans) = resolve(target, &catalog, &self.health, &self.shared.excluded_fixtures)
            else {
                continue;
            };
            for span in &spans {
                if let Some(fixture) = catalog.fixture(&span.fixture_id) {
                    if let Err(err) =
                        self.sender
                            .send_blackout(fixture, span.pixel_offset, span.length)
                    {
                        log::debug!("blackout send to '{}' failed: {}", span.fixture_id, err);
                    }
                }
            }
        }
    }
}
