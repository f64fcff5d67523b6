pub use runner::{start_playlist, PlaylistHandle};
use lumen_fixtures::Target;
use serde::{Deserialize, Serialize};

mod runner;

/// A stored playlist: presets with per-item durations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub items: Vec<PlaylistItem>,
    #[serde(default, rename = "loop")]
    pub looped: bool,
    #[serde(default)]
    pub shuffle: bool,
    pub targets: Vec<Target>,
    #[serde(default = "default_fps")]
    pub fps: u32,
}

fn default_fps() -> u32 {
    30
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub preset_id: String,
    pub duration_seconds: f64,
}

impl Playlist {
    pub fn validate(&self) -> Result<(), String> {
        if self.items.is_empty() {
            return Err(format!("playlist '{}' has no items", self.id));
        }
        if self.targets.is_empty() {
            return Err(format!("playlist '{}' has no targets", self.id));
        }
        for item in &self.items {
            if item.duration_seconds <= 0.0 {
                return Err(format!(
                    "playlist '{}' item '{}' needs a positive duration",
                    self.id, item.preset_id
                ));
            }
        }
        Ok(())
    }
}
