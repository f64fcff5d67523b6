use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lumen_fixtures::{Fixture, Group, Virtual};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{from_reader, to_writer_pretty};

use crate::effect::Palette;
use crate::error::{EngineError, Result};
use crate::playlist::Playlist;
use crate::preset::Preset;
use crate::schedule::{Holiday, Schedule};

/// Entities a document store can index: a stable id plus a unique
/// display name.
pub trait Named {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
}

macro_rules! impl_named {
    ($ty:ty) => {
        impl Named for $ty {
            fn id(&self) -> &str {
                &self.id
            }
            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

impl_named!(Fixture);
impl_named!(Group);
impl_named!(Virtual);
impl_named!(Palette);
impl_named!(Playlist);
impl_named!(Schedule);
impl_named!(Holiday);

impl Named for Preset {
    fn id(&self) -> &str {
        Preset::id(self)
    }
    fn name(&self) -> &str {
        Preset::name(self)
    }
}

/// One JSON document holding every entity of a type.
///
/// Saves go through a temp file and an atomic rename so a crash mid-write
/// can never truncate a document a running session depends on.
pub struct DocumentStore<T> {
    path: PathBuf,
    items: Arc<RwLock<Vec<T>>>,
}

impl<T> DocumentStore<T>
where
    T: Named + Clone + Serialize + DeserializeOwned,
{
    /// Open the store, reading the document if it exists.
    pub fn open(path: PathBuf) -> Result<Self> {
        let items = if path.exists() {
            let file = File::open(&path)
                .map_err(|e| EngineError::Internal(format!("open {}: {}", path.display(), e)))?;
            from_reader(file)
                .map_err(|e| EngineError::Internal(format!("parse {}: {}", path.display(), e)))?
        } else {
            Vec::new()
        };
        Ok(DocumentStore {
            path,
            items: Arc::new(RwLock::new(items)),
        })
    }

    /// Shared handle to the live item list, for subsystems that read it
    /// continuously (schedule engine, sessions resolving palettes).
    pub fn handle(&self) -> Arc<RwLock<Vec<T>>> {
        Arc::clone(&self.items)
    }

    pub fn list(&self) -> Vec<T> {
        self.items.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.items.read().iter().find(|i| i.id() == id).cloned()
    }

    pub fn create(&self, item: T) -> Result<()> {
        let mut items = self.items.write();
        if items.iter().any(|i| i.id() == item.id()) {
            return Err(EngineError::Conflict(format!(
                "id '{}' already exists",
                item.id()
            )));
        }
        if items.iter().any(|i| i.name() == item.name()) {
            return Err(EngineError::Conflict(format!(
                "name '{}' already exists",
                item.name()
            )));
        }
        items.push(item);
        self.save(&items)
    }

    pub fn update(&self, item: T) -> Result<()> {
        let mut items = self.items.write();
        if items
            .iter()
            .any(|i| i.id() != item.id() && i.name() == item.name())
        {
            return Err(EngineError::Conflict(format!(
                "name '{}' already exists",
                item.name()
            )));
        }
        let existing = items
            .iter_mut()
            .find(|i| i.id() == item.id())
            .ok_or_else(|| EngineError::NotFound(format!("id '{}'", item.id())))?;
        *existing = item;
        self.save(&items)
    }

    pub fn remove(&self, id: &str) -> Result<T> {
        let mut items = self.items.write();
        let idx = items
            .iter()
            .position(|i| i.id() == id)
            .ok_or_else(|| EngineError::NotFound(format!("id '{}'", id)))?;
        let removed = items.remove(idx);
        self.save(&items)?;
        Ok(removed)
    }

    /// Overwrite the whole collection (catalog mirroring).
    pub fn replace_all(&self, new_items: Vec<T>) -> Result<()> {
        let mut items = self.items.write();
        *items = new_items;
        self.save(&items)
    }

    fn save(&self, items: &[T]) -> Result<()> {
        let write_err =
            |e: std::io::Error| EngineError::Internal(format!("write {}: {}", self.path.display(), e));
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let file = File::create(&tmp).map_err(write_err)?;
        to_writer_pretty(file, items)
            .map_err(|e| EngineError::Internal(format!("serialize {}: {}", self.path.display(), e)))?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }
}

/// Every persisted entity collection, one JSON document each.
pub struct CatalogStores {
    pub fixtures: DocumentStore<Fixture>,
    pub groups: DocumentStore<Group>,
    pub virtuals: DocumentStore<Virtual>,
    pub palettes: DocumentStore<Palette>,
    pub presets: DocumentStore<Preset>,
    pub playlists: DocumentStore<Playlist>,
    pub schedules: DocumentStore<Schedule>,
    pub holidays: DocumentStore<Holiday>,
}

impl CatalogStores {
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .map_err(|e| EngineError::Internal(format!("create {}: {}", data_dir.display(), e)))?;
        Ok(CatalogStores {
            fixtures: DocumentStore::open(data_dir.join("fixtures.json"))?,
            groups: DocumentStore::open(data_dir.join("groups.json"))?,
            virtuals: DocumentStore::open(data_dir.join("virtuals.json"))?,
            palettes: DocumentStore::open(data_dir.join("palettes.json"))?,
            presets: DocumentStore::open(data_dir.join("presets.json"))?,
            playlists: DocumentStore::open(data_dir.join("playlists.json"))?,
            schedules: DocumentStore::open(data_dir.join("schedules.json"))?,
            holidays: DocumentStore::open(data_dir.join("holidays.json"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_fixtures::Color;
    use tempfile::TempDir;

    fn palette(id: &str, name: &str) -> Palette {
        Palette {
            id: id.to_string(),
            name: name.to_string(),
            colors: vec![Color::rgb(255, 0, 0)],
        }
    }

    #[test]
    fn test_round_trip_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("palettes.json");

        let store: DocumentStore<Palette> = DocumentStore::open(path.clone()).unwrap();
        store.create(palette("p1", "Warm")).unwrap();
        store.create(palette("p2", "Cool")).unwrap();

        let reopened: DocumentStore<Palette> = DocumentStore::open(path).unwrap();
        assert_eq!(reopened.list().len(), 2);
        assert_eq!(reopened.get("p1").unwrap().name, "Warm");
    }

    #[test]
    fn test_name_conflicts() {
        let dir = TempDir::new().unwrap();
        let store: DocumentStore<Palette> =
            DocumentStore::open(dir.path().join("palettes.json")).unwrap();
        store.create(palette("p1", "Warm")).unwrap();

        assert!(matches!(
            store.create(palette("p2", "Warm")),
            Err(EngineError::Conflict(_))
        ));
        assert!(matches!(
            store.create(palette("p1", "Other")),
            Err(EngineError::Conflict(_))
        ));

        // Renaming p2 onto p1's name must conflict; updating p1 in place
        // must not.
        store.create(palette("p2", "Cool")).unwrap();
        assert!(matches!(
            store.update(palette("p2", "Warm")),
            Err(EngineError::Conflict(_))
        ));
        assert!(store.update(palette("p1", "Warm")).is_ok());
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store: DocumentStore<Palette> =
            DocumentStore::open(dir.path().join("palettes.json")).unwrap();
        assert!(matches!(
            store.update(palette("nope", "X")),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("palettes.json");
        let store: DocumentStore<Palette> = DocumentStore::open(path.clone()).unwrap();
        store.create(palette("p1", "Warm")).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
