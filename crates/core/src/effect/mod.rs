pub use palette::{sample_palette, Palette};
pub use params::{ParamValue, Params, RESOLVED_PALETTE_KEY};
pub use registry::{render_layer, validate_params, EffectKind, ParticleEffect};
use serde::{Deserialize, Serialize};

use crate::frame::BlendMode;

mod generators;
mod palette;
mod params;
mod registry;

/// A configured effect instance: generator kind plus its parameter bag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectConfig {
    #[serde(rename = "type")]
    pub kind: EffectKind,
    #[serde(default)]
    pub params: Params,
}

impl EffectConfig {
    pub fn new(kind: EffectKind) -> Self {
        EffectConfig {
            kind,
            params: Params::new(),
        }
    }
}

/// One effect in a compositing stack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: String,
    pub effect: EffectConfig,
    #[serde(default)]
    pub blend_mode: BlendMode,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_opacity() -> f64 {
    1.0
}

fn default_enabled() -> bool {
    true
}

impl Layer {
    pub fn new(id: impl Into<String>, effect: EffectConfig) -> Self {
        Layer {
            id: id.into(),
            effect,
            blend_mode: BlendMode::Normal,
            opacity: 1.0,
            enabled: true,
        }
    }
}
