use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use lumen_fixtures::{FixtureCatalog, Target};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use super::session::{
    SessionCommand, SessionInfo, SessionShared, SessionSpec, SessionState, SessionWorker,
};
use crate::ddp::DdpSender;
use crate::effect::{Palette, ParamValue};
use crate::error::{EngineError, Result};
use crate::frame::BlendMode;
use crate::health::FixtureHealth;
use crate::playlist::PlaylistHandle;
use crate::target::{resolve, spans_intersect, Span};

const COMMAND_BUFFER: usize = 64;

struct SessionHandle {
    shared: Arc<SessionShared>,
    cmd_tx: mpsc::Sender<SessionCommand>,
    /// Span snapshot taken at start; used for exclusivity and
    /// stop-by-target checks.
    spans: Vec<Span>,
    join: AsyncMutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    fn state(&self) -> SessionState {
        *self.shared.state.read()
    }

    async fn send(&self, cmd: SessionCommand) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| EngineError::Internal("session worker is gone".to_string()))
    }
}

/// Distinct targets currently being driven, grouped by kind.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ActiveTargets {
    pub devices: Vec<String>,
    pub groups: Vec<String>,
    pub virtuals: Vec<String>,
}

/// Registry and lifecycle owner for all streaming sessions.
///
/// Single-writer discipline: every mutation of the registry goes through
/// the supervisor; reads are snapshots. On shutdown every session is
/// stopped, which triggers its blackout frame.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<SupervisorInner>,
}

struct SupervisorInner {
    catalog: Arc<RwLock<FixtureCatalog>>,
    palettes: Arc<RwLock<Vec<Palette>>>,
    health: FixtureHealth,
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
    active_playlist: RwLock<Option<Arc<PlaylistHandle>>>,
    next_id: AtomicU64,
}

impl Supervisor {
    pub fn new(
        catalog: Arc<RwLock<FixtureCatalog>>,
        palettes: Arc<RwLock<Vec<Palette>>>,
        health: FixtureHealth,
    ) -> Self {
        Supervisor {
            inner: Arc::new(SupervisorInner {
                catalog,
                palettes,
                health,
                sessions: RwLock::new(HashMap::new()),
                active_playlist: RwLock::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn catalog(&self) -> Arc<RwLock<FixtureCatalog>> {
        Arc::clone(&self.inner.catalog)
    }

    pub fn health(&self) -> FixtureHealth {
        self.inner.health.clone()
    }

    /// Validate and start a new session.
    pub async fn start_session(&self, spec: SessionSpec) -> Result<SessionInfo> {
        if spec.layers.is_empty() {
            return Err(EngineError::Validation(
                "session requires an effect or at least one layer".to_string(),
            ));
        }
        if !(1..=120).contains(&spec.fps) {
            return Err(EngineError::Validation(format!(
                "fps {} outside 1..=120",
                spec.fps
            )));
        }
        if spec.targets.is_empty() {
            return Err(EngineError::Validation("session requires targets".to_string()));
        }

        let spans = {
            let catalog = self.inner.catalog.read();
            let mut spans = Vec::new();
            for target in &spec.targets {
                spans.extend(resolve(
                    target,
                    &catalog,
                    &self.inner.health,
                    &spec.excluded_fixtures,
                )?);
            }
            spans
        };
        if spans.is_empty() {
            return Err(EngineError::Validation(
                "targets resolve to zero pixels".to_string(),
            ));
        }

        // Exclusivity arbitration over the span snapshots.
        let contested: Vec<(String, bool)> = {
            let sessions = self.inner.sessions.read();
            sessions
                .values()
                .filter(|h| h.state() != SessionState::Stopped)
                .filter(|h| spans_intersect(&h.spans, &spans))
                .map(|h| (h.shared.id.clone(), h.shared.exclusive))
                .collect()
        };
        if spec.exclusive {
            for (id, _) in &contested {
                log::info!("exclusive session preempts '{}'", id);
                self.stop_session(id).await.ok();
            }
        } else if let Some((id, _)) = contested.iter().find(|(_, exclusive)| *exclusive) {
            return Err(EngineError::Conflict(format!(
                "target spans are exclusively claimed by session '{}'",
                id
            )));
        }

        let id = format!("session-{}", self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let shared = Arc::new(SessionShared {
            id: id.clone(),
            targets: spec.targets.clone(),
            excluded_fixtures: spec.excluded_fixtures.clone(),
            exclusive: spec.exclusive,
            fps: spec.fps,
            playlist_id: spec.playlist_id.clone(),
            layers: RwLock::new(spec.layers.clone()),
            state: RwLock::new(SessionState::Active),
            started_at: Utc::now(),
            last_frame_at: RwLock::new(None),
        });

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let sender = DdpSender::new()?;
        let worker = SessionWorker::new(
            Arc::clone(&shared),
            Arc::clone(&self.inner.catalog),
            Arc::clone(&self.inner.palettes),
            self.inner.health.clone(),
            sender,
        );
        let join = tokio::spawn(worker.run(cmd_rx));

        let handle = Arc::new(SessionHandle {
            shared: Arc::clone(&shared),
            cmd_tx,
            spans,
            join: AsyncMutex::new(Some(join)),
        });
        self.prune_stopped();
        self.inner.sessions.write().insert(id, Arc::clone(&handle));

        Ok(shared.info())
    }

    fn handle(&self, id: &str) -> Result<Arc<SessionHandle>> {
        self.inner
            .sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("session '{}'", id)))
    }

    pub fn session(&self, id: &str) -> Result<SessionInfo> {
        Ok(self.handle(id)?.shared.info())
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.prune_stopped();
        let mut infos: Vec<SessionInfo> = self
            .inner
            .sessions
            .read()
            .values()
            .map(|h| h.shared.info())
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Stop one session and wait for its blackout to go out.
    pub async fn stop_session(&self, id: &str) -> Result<()> {
        let handle = self.handle(id)?;
        handle.send(SessionCommand::Stop).await.ok();
        if let Some(join) = handle.join.lock().await.take() {
            join.await
                .map_err(|e| EngineError::Internal(format!("session worker join: {}", e)))?;
        }
        self.inner.sessions.write().remove(id);
        Ok(())
    }

    pub async fn pause_session(&self, id: &str) -> Result<SessionInfo> {
        let handle = self.handle(id)?;
        handle.send(SessionCommand::Pause).await?;
        Ok(handle.shared.info())
    }

    pub async fn resume_session(&self, id: &str) -> Result<SessionInfo> {
        let handle = self.handle(id)?;
        handle.send(SessionCommand::Resume).await?;
        Ok(handle.shared.info())
    }

    /// Stop every session touching the given target.
    pub async fn stop_by_target(&self, target: &Target) -> Result<usize> {
        let target_spans = {
            let catalog = self.inner.catalog.read();
            resolve(target, &catalog, &self.inner.health, &[])?
        };

        let victims: Vec<String> = {
            let sessions = self.inner.sessions.read();
            sessions
                .values()
                .filter(|h| {
                    h.shared.targets.contains(target) || spans_intersect(&h.spans, &target_spans)
                })
                .map(|h| h.shared.id.clone())
                .collect()
        };
        for id in &victims {
            self.stop_session(id).await.ok();
        }
        Ok(victims.len())
    }

    /// Stop everything. Called on process shutdown; every session sends
    /// its blackout before this returns.
    pub async fn stop_all(&self) {
        let ids: Vec<String> = self.inner.sessions.read().keys().cloned().collect();
        for id in &ids {
            self.stop_session(id).await.ok();
        }
    }

    pub fn active_targets(&self) -> ActiveTargets {
        let mut out = ActiveTargets::default();
        let sessions = self.inner.sessions.read();
        let mut seen = std::collections::HashSet::new();
        for handle in sessions.values() {
            if handle.state() == SessionState::Stopped {
                continue;
            }
            for target in &handle.shared.targets {
                if !seen.insert(target.clone()) {
                    continue;
                }
                match target {
                    Target::Device(id) => out.devices.push(id.clone()),
                    Target::Group(id) => out.groups.push(id.clone()),
                    Target::Virtual(id) => out.virtuals.push(id.clone()),
                }
            }
        }
        out.devices.sort();
        out.groups.sort();
        out.virtuals.sort();
        out
    }

    pub async fn update_parameter(
        &self,
        session_id: &str,
        layer_id: Option<String>,
        name: String,
        value: ParamValue,
    ) -> Result<()> {
        self.handle(session_id)?
            .send(SessionCommand::UpdateParam {
                layer_id,
                name,
                value,
            })
            .await
    }

    pub async fn update_layer_property(
        &self,
        session_id: &str,
        layer_id: String,
        blend_mode: Option<BlendMode>,
        opacity: Option<f64>,
        enabled: Option<bool>,
    ) -> Result<()> {
        self.handle(session_id)?
            .send(SessionCommand::UpdateLayerProperty {
                layer_id,
                blend_mode,
                opacity,
                enabled,
            })
            .await
    }

    /// Swap a session's layer stack (playlist/schedule advancement).
    pub async fn set_layers(&self, session_id: &str, layers: Vec<crate::effect::Layer>) -> Result<()> {
        self.handle(session_id)?
            .send(SessionCommand::SetLayers(layers))
            .await
    }

    /// Set the brightness envelope multiplier (schedule ramps).
    pub async fn set_brightness(&self, session_id: &str, factor: f64) -> Result<()> {
        self.handle(session_id)?
            .send(SessionCommand::SetBrightness(factor))
            .await
    }

    // Active playlist handle: one per process, owned here so the
    // management surface can query and stop it.

    pub fn set_active_playlist(&self, handle: Arc<PlaylistHandle>) {
        *self.inner.active_playlist.write() = Some(handle);
    }

    pub fn active_playlist(&self) -> Option<Arc<PlaylistHandle>> {
        self.inner.active_playlist.read().clone()
    }

    pub fn clear_active_playlist(&self, playlist_id: &str) {
        let mut active = self.inner.active_playlist.write();
        if active.as_ref().is_some_and(|h| h.playlist_id == playlist_id) {
            *active = None;
        }
    }

    /// Drop registry entries whose workers have already stopped.
    fn prune_stopped(&self) {
        self.inner
            .sessions
            .write()
            .retain(|_, h| h.state() != SessionState::Stopped);
    }
}
