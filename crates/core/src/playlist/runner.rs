use std::sync::Arc;

use parking_lot::RwLock;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use super::Playlist;
use crate::error::{EngineError, Result};
use crate::preset::Preset;
use crate::session::{SessionSpec, Supervisor};

#[derive(Debug)]
enum PlaylistCommand {
    Stop,
}

/// Handle to the running playlist. One per process, owned by the
/// supervisor; cleared when the runner exits.
pub struct PlaylistHandle {
    pub playlist_id: String,
    session_id: RwLock<Option<String>>,
    cmd_tx: mpsc::Sender<PlaylistCommand>,
    join: AsyncMutex<Option<JoinHandle<()>>>,
}

impl PlaylistHandle {
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Stop the runner and wait for it to tear its session down.
    pub async fn stop(&self) {
        self.cmd_tx.send(PlaylistCommand::Stop).await.ok();
        if let Some(join) = self.join.lock().await.take() {
            join.await.ok();
        }
    }
}

/// Start a playlist. Any previously active playlist is stopped first;
/// the new handle is registered on the supervisor atomically.
pub async fn start_playlist(
    supervisor: Supervisor,
    presets: Arc<RwLock<Vec<Preset>>>,
    playlist: Playlist,
) -> Result<Arc<PlaylistHandle>> {
    playlist.validate().map_err(EngineError::Validation)?;

    if let Some(previous) = supervisor.active_playlist() {
        log::info!(
            "stopping active playlist '{}' for '{}'",
            previous.playlist_id,
            playlist.id
        );
        previous.stop().await;
    }

    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let handle = Arc::new(PlaylistHandle {
        playlist_id: playlist.id.clone(),
        session_id: RwLock::new(None),
        cmd_tx,
        join: AsyncMutex::new(None),
    });

    let join = tokio::spawn(run_loop(
        supervisor.clone(),
        presets,
        playlist,
        Arc::clone(&handle),
        cmd_rx,
    ));
    *handle.join.lock().await = Some(join);
    supervisor.set_active_playlist(Arc::clone(&handle));
    Ok(handle)
}

async fn run_loop(
    supervisor: Supervisor,
    presets: Arc<RwLock<Vec<Preset>>>,
    playlist: Playlist,
    handle: Arc<PlaylistHandle>,
    mut cmd_rx: mpsc::Receiver<PlaylistCommand>,
) {
    let mut rng = SmallRng::from_os_rng();
    log::info!(
        "playlist '{}' started: {} items, loop={}, shuffle={}",
        playlist.id,
        playlist.items.len(),
        playlist.looped,
        playlist.shuffle
    );

    'outer: loop {
        // A fresh ordering per pass; shuffle draws a new permutation
        // each time around.
        let mut order: Vec<usize> = (0..playlist.items.len()).collect();
        if playlist.shuffle {
            order.shuffle(&mut rng);
        }

        for idx in order {
            let item = &playlist.items[idx];
            let layers = {
                let presets = presets.read();
                match presets.iter().find(|p| p.id() == item.preset_id) {
                    Some(preset) => preset.to_layers(),
                    None => {
                        log::warn!(
                            "playlist '{}': preset '{}' not found, skipping item",
                            playlist.id,
                            item.preset_id
                        );
                        continue;
                    }
                }
            };

            let current = handle.session_id.read().clone();
            match current {
                None => {
                    let spec = SessionSpec {
                        targets: playlist.targets.clone(),
                        layers,
                        fps: playlist.fps,
                        exclusive: false,
                        excluded_fixtures: Vec::new(),
                        playlist_id: Some(playlist.id.clone()),
                    };
                    match supervisor.start_session(spec).await {
                        Ok(info) => *handle.session_id.write() = Some(info.id),
                        Err(err) => {
                            log::error!("playlist '{}' could not start: {}", playlist.id, err);
                            break 'outer;
                        }
                    }
                }
                Some(session_id) => {
                    // Reconfigure the running session in place.
                    if supervisor.set_layers(&session_id, layers).await.is_err() {
                        log::warn!(
                            "playlist '{}': session '{}' is gone, stopping",
                            playlist.id,
                            session_id
                        );
                        break 'outer;
                    }
                }
            }

            tokio::select! {
                _ = sleep(Duration::from_secs_f64(item.duration_seconds)) => {}
                _ = cmd_rx.recv() => break 'outer,
            }
        }

        if !playlist.looped {
            break;
        }
    }

    let session_id = handle.session_id.read().clone();
    if let Some(session_id) = session_id {
        supervisor.stop_session(&session_id).await.ok();
    }
    supervisor.clear_active_playlist(&playlist.id);
    log::info!("playlist '{}' finished", playlist.id);
}
