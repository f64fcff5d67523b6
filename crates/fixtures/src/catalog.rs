use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Fixture, Group, Virtual};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid entity: {0}")]
    Invalid(String),
    #[error("unknown fixture '{0}'")]
    UnknownFixture(String),
    #[error("unknown group '{0}'")]
    UnknownGroup(String),
    #[error("unknown virtual '{0}'")]
    UnknownVirtual(String),
}

/// In-memory catalog of fixtures, groups and virtuals.
///
/// The catalog is the single lookup surface the target resolver works
/// against. Group and virtual members are validated against the fixtures
/// present at insert time.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FixtureCatalog {
    #[serde(default)]
    fixtures: Vec<Fixture>,
    #[serde(default)]
    groups: Vec<Group>,
    #[serde(default)]
    virtuals: Vec<Virtual>,
}

impl FixtureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a catalog from already-validated collections (e.g. loaded
    /// from persisted documents).
    pub fn from_parts(fixtures: Vec<Fixture>, groups: Vec<Group>, virtuals: Vec<Virtual>) -> Self {
        FixtureCatalog {
            fixtures,
            groups,
            virtuals,
        }
    }

    pub fn fixtures(&self) -> &[Fixture] {
        &self.fixtures
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn virtuals(&self) -> &[Virtual] {
        &self.virtuals
    }

    pub fn fixture(&self, id: &str) -> Option<&Fixture> {
        self.fixtures.iter().find(|f| f.id == id)
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn virtual_device(&self, id: &str) -> Option<&Virtual> {
        self.virtuals.iter().find(|v| v.id == id)
    }

    /// Insert or replace a fixture after validating its span bounds.
    pub fn upsert_fixture(&mut self, fixture: Fixture) -> Result<(), CatalogError> {
        fixture.validate()?;
        if let Some(existing) = self.fixtures.iter_mut().find(|f| f.id == fixture.id) {
            *existing = fixture;
        } else {
            self.fixtures.push(fixture);
        }
        Ok(())
    }

    /// Insert or replace a group. Every member must reference a known
    /// fixture and stay within its pixel bounds.
    pub fn upsert_group(&mut self, group: Group) -> Result<(), CatalogError> {
        for member in &group.members {
            let fixture = self
                .fixture(member.fixture_id())
                .ok_or_else(|| CatalogError::UnknownFixture(member.fixture_id().to_string()))?;
            if let crate::GroupMember::Range {
                start_pixel,
                end_pixel,
                ..
            } = member
            {
                if end_pixel < start_pixel || *end_pixel >= fixture.pixel_count {
                    return Err(CatalogError::Invalid(format!(
                        "group '{}' range {}..={} outside fixture '{}' (0..{})",
                        group.id, start_pixel, end_pixel, fixture.id, fixture.pixel_count
                    )));
                }
            }
        }
        if let Some(existing) = self.groups.iter_mut().find(|g| g.id == group.id) {
            *existing = group;
        } else {
            self.groups.push(group);
        }
        Ok(())
    }

    /// Insert or replace a virtual device. Same bounds rules as groups.
    pub fn upsert_virtual(&mut self, virt: Virtual) -> Result<(), CatalogError> {
        for range in &virt.ranges {
            let fixture = self
                .fixture(&range.fixture_id)
                .ok_or_else(|| CatalogError::UnknownFixture(range.fixture_id.clone()))?;
            if range.end_pixel < range.start_pixel || range.end_pixel >= fixture.pixel_count {
                return Err(CatalogError::Invalid(format!(
                    "virtual '{}' range {}..={} outside fixture '{}' (0..{})",
                    virt.id, range.start_pixel, range.end_pixel, fixture.id, fixture.pixel_count
                )));
            }
        }
        if let Some(existing) = self.virtuals.iter_mut().find(|v| v.id == virt.id) {
            *existing = virt;
        } else {
            self.virtuals.push(virt);
        }
        Ok(())
    }

    pub fn remove_fixture(&mut self, id: &str) -> Result<Fixture, CatalogError> {
        let idx = self
            .fixtures
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| CatalogError::UnknownFixture(id.to_string()))?;
        Ok(self.fixtures.remove(idx))
    }

    pub fn remove_group(&mut self, id: &str) -> Result<Group, CatalogError> {
        let idx = self
            .groups
            .iter()
            .position(|g| g.id == id)
            .ok_or_else(|| CatalogError::UnknownGroup(id.to_string()))?;
        Ok(self.groups.remove(idx))
    }

    pub fn remove_virtual(&mut self, id: &str) -> Result<Virtual, CatalogError> {
        let idx = self
            .virtuals
            .iter()
            .position(|v| v.id == id)
            .ok_or_else(|| CatalogError::UnknownVirtual(id.to_string()))?;
        Ok(self.virtuals.remove(idx))
    }
}
