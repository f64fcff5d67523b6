pub use catalog::{CatalogError, FixtureCatalog};
pub use color::Color;
use serde::{Deserialize, Serialize};

mod catalog;
mod color;

/// A named sub-range of a fixture's pixel strip.
///
/// Spans are addressing hints for the owner of the fixture; they may overlap
/// one another. Bounds are validated against the fixture on catalog insert.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixtureSpan {
    pub id: String,
    pub name: String,
    pub start: usize,
    pub length: usize,
    #[serde(default = "Color::black")]
    pub default_color: Color,
    #[serde(default = "default_brightness")]
    pub brightness: f64,
}

fn default_brightness() -> f64 {
    1.0
}

/// A networked LED controller with a contiguous pixel index space.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Fixture {
    pub id: String,
    pub name: String,
    /// Hostname or IP address of the controller.
    pub address: String,
    #[serde(default = "default_udp_port")]
    pub udp_port: u16,
    pub pixel_count: usize,
    #[serde(default)]
    pub spans: Vec<FixtureSpan>,
}

fn default_udp_port() -> u16 {
    4048
}

impl Fixture {
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.pixel_count == 0 {
            return Err(CatalogError::Invalid(format!(
                "fixture '{}' has zero pixels",
                self.id
            )));
        }
        for span in &self.spans {
            if span.length == 0 {
                return Err(CatalogError::Invalid(format!(
                    "span '{}' on fixture '{}' has zero length",
                    span.id, self.id
                )));
            }
            if span.start + span.length > self.pixel_count {
                return Err(CatalogError::Invalid(format!(
                    "span '{}' on fixture '{}' exceeds pixel count ({}..{} > {})",
                    span.id,
                    self.id,
                    span.start,
                    span.start + span.length,
                    self.pixel_count
                )));
            }
            if !(0.0..=1.0).contains(&span.brightness) {
                return Err(CatalogError::Invalid(format!(
                    "span '{}' on fixture '{}' brightness out of range",
                    span.id, self.id
                )));
            }
        }
        Ok(())
    }
}

/// One member of a group: a whole fixture or an inclusive pixel range.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupMember {
    Range {
        fixture_id: String,
        start_pixel: usize,
        end_pixel: usize,
    },
    Whole {
        fixture_id: String,
    },
}

impl GroupMember {
    pub fn fixture_id(&self) -> &str {
        match self {
            GroupMember::Range { fixture_id, .. } | GroupMember::Whole { fixture_id } => fixture_id,
        }
    }
}

/// User-defined bundle of whole fixtures and/or pixel ranges.
/// Members are ordered; duplicates are allowed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub members: Vec<GroupMember>,
}

/// An inclusive pixel range on a single fixture.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PixelRange {
    pub fixture_id: String,
    pub start_pixel: usize,
    pub end_pixel: usize,
}

/// A bundle of pixel ranges treated as a single logical strip.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Virtual {
    pub id: String,
    pub name: String,
    pub ranges: Vec<PixelRange>,
}

/// A logical streaming destination.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Target {
    Device(String),
    Group(String),
    Virtual(String),
}

impl Target {
    pub fn id(&self) -> &str {
        match self {
            Target::Device(id) | Target::Group(id) | Target::Virtual(id) => id,
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Device(id) => write!(f, "device:{}", id),
            Target::Group(id) => write!(f, "group:{}", id),
            Target::Virtual(id) => write!(f, "virtual:{}", id),
        }
    }
}
