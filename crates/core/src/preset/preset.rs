use serde::{Deserialize, Serialize};

use crate::effect::{EffectConfig, Layer};

/// A reusable look: either a single effect with parameter overrides, or a
/// full layer stack.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Preset {
    Single {
        id: String,
        name: String,
        effect: EffectConfig,
    },
    Layered {
        id: String,
        name: String,
        layers: Vec<Layer>,
    },
}

impl Preset {
    pub fn id(&self) -> &str {
        match self {
            Preset::Single { id, .. } | Preset::Layered { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Preset::Single { name, .. } | Preset::Layered { name, .. } => name,
        }
    }

    /// Materialize the preset as a layer stack for a session.
    pub fn to_layers(&self) -> Vec<Layer> {
        match self {
            Preset::Single { effect, .. } => vec![Layer::new("layer-0", effect.clone())],
            Preset::Layered { layers, .. } => layers.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Preset::Single { .. } => Ok(()),
            Preset::Layered { id, layers, .. } if layers.is_empty() => {
                Err(format!("preset '{}' has no layers", id))
            }
            Preset::Layered { layers, .. } => {
                for layer in layers {
                    if !(0.0..=1.0).contains(&layer.opacity) {
                        return Err(format!("layer '{}' opacity out of range", layer.id));
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::EffectKind;

    #[test]
    fn test_single_preset_materializes_one_layer() {
        let preset = Preset::Single {
            id: "p1".to_string(),
            name: "Red".to_string(),
            effect: EffectConfig::new(EffectKind::Solid),
        };
        let layers = preset.to_layers();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].effect.kind, EffectKind::Solid);
        assert!(layers[0].enabled);
    }

    #[test]
    fn test_tagged_serde() {
        let json = r#"{"type":"single","id":"p","name":"P","effect":{"type":"rainbow"}}"#;
        let preset: Preset = serde_json::from_str(json).unwrap();
        assert_eq!(preset.id(), "p");
        match preset {
            Preset::Single { effect, .. } => assert_eq!(effect.kind, EffectKind::Rainbow),
            Preset::Layered { .. } => panic!("expected single"),
        }
    }

    #[test]
    fn test_layered_validation() {
        let empty = Preset::Layered {
            id: "p2".to_string(),
            name: "Empty".to_string(),
            layers: Vec::new(),
        };
        assert!(empty.validate().is_err());
    }
}
