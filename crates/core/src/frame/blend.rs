use serde::{Deserialize, Serialize};

/// Compositing algebra for stacked effect layers.
///
/// All modes except `Replace` are applied as
/// `out = f(src, dst) * opacity + dst * (1 - opacity)` on normalized
/// channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    Normal,
    Add,
    Multiply,
    Screen,
    Overlay,
    SoftLight,
    HardLight,
    Difference,
    Exclusion,
    Max,
    Min,
    Replace,
}

impl BlendMode {
    pub fn parse(name: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(name.to_string())).ok()
    }
}

fn blend_channel(mode: BlendMode, s: f64, d: f64) -> f64 {
    match mode {
        BlendMode::Normal | BlendMode::Replace => s,
        BlendMode::Add => (s + d).min(1.0),
        BlendMode::Multiply => s * d,
        BlendMode::Screen => 1.0 - (1.0 - s) * (1.0 - d),
        BlendMode::Overlay => {
            if d < 0.5 {
                2.0 * s * d
            } else {
                1.0 - 2.0 * (1.0 - s) * (1.0 - d)
            }
        }
        // Pegtop's formulation: no discontinuity at s = 0.5.
        BlendMode::SoftLight => (1.0 - 2.0 * s) * d * d + 2.0 * s * d,
        BlendMode::HardLight => {
            if s < 0.5 {
                2.0 * s * d
            } else {
                1.0 - 2.0 * (1.0 - s) * (1.0 - d)
            }
        }
        BlendMode::Difference => (s - d).abs(),
        BlendMode::Exclusion => s + d - 2.0 * s * d,
        BlendMode::Max => s.max(d),
        BlendMode::Min => s.min(d),
    }
}

/// Composite one layer's output over the destination buffer in place.
///
/// `Replace` writes the source bytes unconditionally and bypasses the
/// opacity mix. Buffers must be the same length.
pub fn composite_layer(dst: &mut [u8], src: &[u8], mode: BlendMode, opacity: f64) {
    debug_assert_eq!(dst.len(), src.len());

    if mode == BlendMode::Replace {
        dst.copy_from_slice(src);
        return;
    }

    let opacity = opacity.clamp(0.0, 1.0);
    for (d_byte, s_byte) in dst.iter_mut().zip(src.iter()) {
        let s = *s_byte as f64 / 255.0;
        let d = *d_byte as f64 / 255.0;
        let blended = blend_channel(mode, s, d);
        let out = blended * opacity + d * (1.0 - opacity);
        *d_byte = (out.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
}

/// Scale every channel by a brightness factor in [0, 1].
pub fn apply_brightness(buf: &mut [u8], factor: f64) {
    let factor = factor.clamp(0.0, 1.0);
    if factor >= 1.0 {
        return;
    }
    for byte in buf.iter_mut() {
        *byte = (*byte as f64 * factor).round() as u8;
    }
}
