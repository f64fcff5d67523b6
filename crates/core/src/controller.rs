use std::sync::Arc;

use lumen_fixtures::{Fixture, FixtureCatalog, Group, Target, Virtual};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::clock::{SharedClock, SystemClock};
use crate::config::Settings;
use crate::effect::{Palette, ParamValue};
use crate::error::{EngineError, Result};
use crate::frame::BlendMode;
use crate::health::FixtureHealth;
use crate::playlist::{start_playlist, Playlist};
use crate::preset::Preset;
use crate::schedule::{ActiveRuleInfo, Holiday, Schedule, ScheduleEngine};
use crate::session::{ActiveTargets, SessionInfo, SessionSpec, Supervisor};
use crate::store::CatalogStores;

/// Snapshot of the active playlist for the management surface.
#[derive(Clone, Debug, Serialize)]
pub struct ActivePlaylistInfo {
    pub playlist_id: String,
    pub session_id: Option<String>,
}

/// Top-level facade owning every subsystem: catalogs and their stores,
/// the session supervisor, the schedule engine and the active playlist.
/// The management surface (HTTP or otherwise) calls these methods; they
/// map 1:1 onto the external API contract.
pub struct Controller {
    settings: Settings,
    stores: CatalogStores,
    catalog: Arc<RwLock<FixtureCatalog>>,
    health: FixtureHealth,
    supervisor: Supervisor,
    active_rules: Arc<RwLock<Vec<ActiveRuleInfo>>>,
    engine: Mutex<Option<ScheduleEngine>>,
    engine_shutdown: Mutex<Option<mpsc::Sender<()>>>,
    engine_join: AsyncMutex<Option<JoinHandle<()>>>,
}

impl Controller {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    /// Construct with an injected clock so schedule evaluation is
    /// deterministic under test.
    pub fn with_clock(settings: Settings, clock: SharedClock) -> anyhow::Result<Self> {
        let stores = CatalogStores::open(&settings.data_dir)?;
        let catalog = Arc::new(RwLock::new(FixtureCatalog::from_parts(
            stores.fixtures.list(),
            stores.groups.list(),
            stores.virtuals.list(),
        )));
        let health = FixtureHealth::new(settings.failure_threshold);
        let supervisor = Supervisor::new(
            Arc::clone(&catalog),
            stores.palettes.handle(),
            health.clone(),
        );

        let tz = settings
            .default_timezone
            .parse::<chrono_tz::Tz>()
            .unwrap_or(chrono_tz::UTC);
        let engine = ScheduleEngine::new(
            supervisor.clone(),
            stores.schedules.handle(),
            stores.holidays.handle(),
            stores.presets.handle(),
            clock,
            settings.default_latitude,
            settings.default_longitude,
            tz,
        );
        let active_rules = engine.active_rules_handle();

        Ok(Controller {
            settings,
            stores,
            catalog,
            health,
            supervisor,
            active_rules,
            engine: Mutex::new(Some(engine)),
            engine_shutdown: Mutex::new(None),
            engine_join: AsyncMutex::new(None),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Start background workers (currently the schedule engine).
    pub async fn start(&self) {
        if let Some(engine) = self.engine.lock().take() {
            let (tx, rx) = mpsc::channel(1);
            *self.engine_shutdown.lock() = Some(tx);
            *self.engine_join.lock().await = Some(tokio::spawn(engine.run(rx)));
        }
    }

    /// Orderly teardown: schedule engine first, then the playlist, then
    /// every session (which blacks out its fixtures).
    pub async fn shutdown(&self) {
        log::info!("controller shutting down");
        let shutdown = self.engine_shutdown.lock().take();
        if let Some(tx) = shutdown {
            tx.send(()).await.ok();
        }
        if let Some(join) = self.engine_join.lock().await.take() {
            join.await.ok();
        }
        if let Some(playlist) = self.supervisor.active_playlist() {
            playlist.stop().await;
        }
        self.supervisor.stop_all().await;
        log::info!("controller shutdown complete");
    }

    // --- streaming ---

    pub async fn start_stream(&self, mut spec: SessionSpec) -> Result<SessionInfo> {
        if spec.fps == 0 {
            spec.fps = self.settings.default_fps;
        }
        self.supervisor.start_session(spec).await
    }

    pub async fn stop_stream(&self, session_id: &str) -> Result<()> {
        self.supervisor.stop_session(session_id).await
    }

    pub async fn pause_stream(&self, session_id: &str) -> Result<SessionInfo> {
        self.supervisor.pause_session(session_id).await
    }

    pub async fn resume_stream(&self, session_id: &str) -> Result<SessionInfo> {
        self.supervisor.resume_session(session_id).await
    }

    pub async fn stop_target(&self, target: &Target) -> Result<usize> {
        self.supervisor.stop_by_target(target).await
    }

    pub async fn stop_all_streams(&self) {
        self.supervisor.stop_all().await;
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.supervisor.sessions()
    }

    pub fn session(&self, id: &str) -> Result<SessionInfo> {
        self.supervisor.session(id)
    }

    pub fn active_targets(&self) -> ActiveTargets {
        self.supervisor.active_targets()
    }

    pub async fn update_parameter(
        &self,
        session_id: &str,
        layer_id: Option<String>,
        name: String,
        value: ParamValue,
    ) -> Result<()> {
        self.supervisor
            .update_parameter(session_id, layer_id, name, value)
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
        self.supervisor
            .update_layer_property(session_id, layer_id, blend_mode, opacity, enabled)
            .await
    }

    // --- playlists ---

    pub async fn start_playlist(&self, playlist_id: &str) -> Result<ActivePlaylistInfo> {
        let playlist = self
            .stores
            .playlists
            .get(playlist_id)
            .ok_or_else(|| EngineError::NotFound(format!("playlist '{}'", playlist_id)))?;
        let handle = start_playlist(
            self.supervisor.clone(),
            self.stores.presets.handle(),
            playlist,
        )
        .await?;
        Ok(ActivePlaylistInfo {
            playlist_id: handle.playlist_id.clone(),
            session_id: handle.session_id(),
        })
    }

    pub async fn stop_playlist(&self) -> Result<()> {
        match self.supervisor.active_playlist() {
            Some(handle) => {
                handle.stop().await;
                Ok(())
            }
            None => Err(EngineError::NotFound("no active playlist".to_string())),
        }
    }

    pub fn active_playlist(&self) -> Option<ActivePlaylistInfo> {
        self.supervisor.active_playlist().map(|h| ActivePlaylistInfo {
            playlist_id: h.playlist_id.clone(),
            session_id: h.session_id(),
        })
    }

    // --- schedules ---

    pub fn schedules_active(&self) -> Vec<ActiveRuleInfo> {
        self.active_rules.read().clone()
    }

    // --- catalog CRUD ---
    //
    // Fixture/group/virtual mutations validate against the live catalog,
    // persist through the document store (which enforces id/name
    // uniqueness) and then rebuild the shared catalog snapshot.

    fn rebuild_catalog(&self) {
        *self.catalog.write() = FixtureCatalog::from_parts(
            self.stores.fixtures.list(),
            self.stores.groups.list(),
            self.stores.virtuals.list(),
        );
    }

    pub fn fixtures(&self) -> Vec<Fixture> {
        self.stores.fixtures.list()
    }

    pub fn fixture(&self, id: &str) -> Result<Fixture> {
        self.stores
            .fixtures
            .get(id)
            .ok_or_else(|| EngineError::NotFound(format!("fixture '{}'", id)))
    }

    pub fn create_fixture(&self, fixture: Fixture) -> Result<Fixture> {
        fixture.validate()?;
        self.stores.fixtures.create(fixture.clone())?;
        self.rebuild_catalog();
        Ok(fixture)
    }

    pub fn update_fixture(&self, fixture: Fixture) -> Result<Fixture> {
        fixture.validate()?;
        self.stores.fixtures.update(fixture.clone())?;
        self.rebuild_catalog();
        Ok(fixture)
    }

    pub fn delete_fixture(&self, id: &str) -> Result<()> {
        self.stores.fixtures.remove(id)?;
        self.rebuild_catalog();
        Ok(())
    }

    pub fn groups(&self) -> Vec<Group> {
        self.stores.groups.list()
    }

    pub fn group(&self, id: &str) -> Result<Group> {
        self.stores
            .groups
            .get(id)
            .ok_or_else(|| EngineError::NotFound(format!("group '{}'", id)))
    }

    pub fn create_group(&self, group: Group) -> Result<Group> {
        self.catalog.read().clone().upsert_group(group.clone())?;
        self.stores.groups.create(group.clone())?;
        self.rebuild_catalog();
        Ok(group)
    }

    pub fn update_group(&self, group: Group) -> Result<Group> {
        self.catalog.read().clone().upsert_group(group.clone())?;
        self.stores.groups.update(group.clone())?;
        self.rebuild_catalog();
        Ok(group)
    }

    pub fn delete_group(&self, id: &str) -> Result<()> {
        self.stores.groups.remove(id)?;
        self.rebuild_catalog();
        Ok(())
    }

    pub fn virtuals(&self) -> Vec<Virtual> {
        self.stores.virtuals.list()
    }

    pub fn virtual_device(&self, id: &str) -> Result<Virtual> {
        self.stores
            .virtuals
            .get(id)
            .ok_or_else(|| EngineError::NotFound(format!("virtual '{}'", id)))
    }

    pub fn create_virtual(&self, virt: Virtual) -> Result<Virtual> {
        self.catalog.read().clone().upsert_virtual(virt.clone())?;
        self.stores.virtuals.create(virt.clone())?;
        self.rebuild_catalog();
        Ok(virt)
    }

    pub fn update_virtual(&self, virt: Virtual) -> Result<Virtual> {
        self.catalog.read().clone().upsert_virtual(virt.clone())?;
        self.stores.virtuals.update(virt.clone())?;
        self.rebuild_catalog();
        Ok(virt)
    }

    pub fn delete_virtual(&self, id: &str) -> Result<()> {
        self.stores.virtuals.remove(id)?;
        self.rebuild_catalog();
        Ok(())
    }

    pub fn palettes(&self) -> Vec<Palette> {
        self.stores.palettes.list()
    }

    pub fn create_palette(&self, palette: Palette) -> Result<Palette> {
        palette.validate().map_err(EngineError::Validation)?;
        self.stores.palettes.create(palette.clone())?;
        Ok(palette)
    }

    pub fn update_palette(&self, palette: Palette) -> Result<Palette> {
        palette.validate().map_err(EngineError::Validation)?;
        self.stores.palettes.update(palette.clone())?;
        Ok(palette)
    }

    pub fn delete_palette(&self, id: &str) -> Result<()> {
        self.stores.palettes.remove(id).map(|_| ())
    }

    pub fn presets(&self) -> Vec<Preset> {
        self.stores.presets.list()
    }

    pub fn create_preset(&self, preset: Preset) -> Result<Preset> {
        preset.validate().map_err(EngineError::Validation)?;
        self.stores.presets.create(preset.clone())?;
        Ok(preset)
    }

    pub fn update_preset(&self, preset: Preset) -> Result<Preset> {
        preset.validate().map_err(EngineError::Validation)?;
        self.stores.presets.update(preset.clone())?;
        Ok(preset)
    }

    pub fn delete_preset(&self, id: &str) -> Result<()> {
        self.stores.presets.remove(id).map(|_| ())
    }

    pub fn playlists(&self) -> Vec<Playlist> {
        self.stores.playlists.list()
    }

    pub fn create_playlist(&self, playlist: Playlist) -> Result<Playlist> {
        playlist.validate().map_err(EngineError::Validation)?;
        self.stores.playlists.create(playlist.clone())?;
        Ok(playlist)
    }

    pub fn update_playlist(&self, playlist: Playlist) -> Result<Playlist> {
        playlist.validate().map_err(EngineError::Validation)?;
        self.stores.playlists.update(playlist.clone())?;
        Ok(playlist)
    }

    pub fn delete_playlist(&self, id: &str) -> Result<()> {
        self.stores.playlists.remove(id).map(|_| ())
    }

    pub fn schedules(&self) -> Vec<Schedule> {
        self.stores.schedules.list()
    }

    pub fn create_schedule(&self, schedule: Schedule) -> Result<Schedule> {
        for rule in &schedule.rules {
            rule.validate().map_err(EngineError::Validation)?;
        }
        self.stores.schedules.create(schedule.clone())?;
        Ok(schedule)
    }

    pub fn update_schedule(&self, schedule: Schedule) -> Result<Schedule> {
        for rule in &schedule.rules {
            rule.validate().map_err(EngineError::Validation)?;
        }
        self.stores.schedules.update(schedule.clone())?;
        Ok(schedule)
    }

    pub fn delete_schedule(&self, id: &str) -> Result<()> {
        self.stores.schedules.remove(id).map(|_| ())
    }

    pub fn holidays(&self) -> Vec<Holiday> {
        self.stores.holidays.list()
    }

    pub fn create_holiday(&self, holiday: Holiday) -> Result<Holiday> {
        self.stores.holidays.create(holiday.clone())?;
        Ok(holiday)
    }

    pub fn update_holiday(&self, holiday: Holiday) -> Result<Holiday> {
        self.stores.holidays.update(holiday.clone())?;
        Ok(holiday)
    }

    pub fn delete_holiday(&self, id: &str) -> Result<()> {
        self.stores.holidays.remove(id).map(|_| ())
    }

    pub fn health(&self) -> &FixtureHealth {
        &self.health
    }
}
