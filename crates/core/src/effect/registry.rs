use serde::{Deserialize, Serialize};

use super::generators::{ambient, basic, motion, particle, sparkle};
use super::params::Params;

/// Every effect the engine can generate. Serialized names are the wire
/// names used in presets and the management API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EffectKind {
    Solid,
    Rainbow,
    ColorWipe,
    Comet,
    Chase,
    Breathing,
    Wave,
    Twinkle,
    Fire,
    Matrix,
    Confetti,
    Glitter,
    Cylon,
    ColorTwinkle,
    Pacifica,
    Plasma,
    ShockwaveDual,
    SkippingRock,
}

impl EffectKind {
    pub fn all() -> Vec<EffectKind> {
        use EffectKind::*;
        vec![
            Solid,
            Rainbow,
            ColorWipe,
            Comet,
            Chase,
            Breathing,
            Wave,
            Twinkle,
            Fire,
            Matrix,
            Confetti,
            Glitter,
            Cylon,
            ColorTwinkle,
            Pacifica,
            Plasma,
            ShockwaveDual,
            SkippingRock,
        ]
    }

    pub fn parse(name: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(name.to_string())).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::Solid => "solid",
            EffectKind::Rainbow => "rainbow",
            EffectKind::ColorWipe => "color-wipe",
            EffectKind::Comet => "comet",
            EffectKind::Chase => "chase",
            EffectKind::Breathing => "breathing",
            EffectKind::Wave => "wave",
            EffectKind::Twinkle => "twinkle",
            EffectKind::Fire => "fire",
            EffectKind::Matrix => "matrix",
            EffectKind::Confetti => "confetti",
            EffectKind::Glitter => "glitter",
            EffectKind::Cylon => "cylon",
            EffectKind::ColorTwinkle => "color-twinkle",
            EffectKind::Pacifica => "pacifica",
            EffectKind::Plasma => "plasma",
            EffectKind::ShockwaveDual => "shockwave-dual",
            EffectKind::SkippingRock => "skipping-rock",
        }
    }

    /// Effects that carry per-session particle state. Everything else is
    /// a pure function of `(params, pixel count, t)`.
    pub fn is_particle(&self) -> bool {
        matches!(
            self,
            EffectKind::Confetti | EffectKind::ShockwaveDual | EffectKind::SkippingRock
        )
    }

    /// Fresh particle state for stateful effects; the session owns one
    /// instance per layer and drops it on stop.
    pub fn new_particle(&self) -> Option<Box<dyn ParticleEffect>> {
        match self {
            EffectKind::Confetti => Some(Box::new(particle::Confetti::new())),
            EffectKind::ShockwaveDual => Some(Box::new(particle::ShockwaveDual::new())),
            EffectKind::SkippingRock => Some(Box::new(particle::SkippingRock::new())),
            _ => None,
        }
    }

    /// Parameter names the generator understands (beyond the common
    /// speed/reverse/mirror/colors/palette/usePalette set).
    pub fn known_params(&self) -> &'static [&'static str] {
        match self {
            EffectKind::Solid => &[],
            EffectKind::Rainbow => &["saturation", "brightness"],
            EffectKind::ColorWipe => &[],
            EffectKind::Comet => &["tailLength"],
            EffectKind::Chase => &["width", "gap", "backgroundColor", "colorMode"],
            EffectKind::Breathing => &["minBrightness"],
            EffectKind::Wave => &["waves"],
            EffectKind::Twinkle | EffectKind::ColorTwinkle => &["density"],
            EffectKind::Fire => &["cooling", "sparking"],
            EffectKind::Matrix => &[],
            EffectKind::Confetti => &["density", "fade"],
            EffectKind::Glitter => &["density"],
            EffectKind::Cylon => &["eyeSize"],
            EffectKind::Pacifica => &[],
            EffectKind::Plasma => &["saturation", "brightness"],
            EffectKind::ShockwaveDual => &["interval", "waveWidth"],
            EffectKind::SkippingRock => &["hops"],
        }
    }
}

impl std::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const COMMON_PARAMS: &[&str] = &[
    "speed",
    "reverse",
    "mirror",
    "colors",
    "color",
    "palette",
    "usePalette",
    super::params::RESOLVED_PALETTE_KEY,
];

/// Warn about parameter names the generator will never read. Unknown
/// parameters are ignored, not rejected.
pub fn validate_params(kind: EffectKind, params: &Params) {
    for name in params.names() {
        if !COMMON_PARAMS.contains(&name) && !kind.known_params().contains(&name) {
            log::warn!("effect '{}' ignores unknown parameter '{}'", kind, name);
        }
    }
}

/// Session-owned state for particle-based effects.
pub trait ParticleEffect: Send {
    /// Render one frame into `out` (3N bytes). `dt` is the frame period.
    fn render(&mut self, params: &Params, n: usize, t: f64, dt: f64, out: &mut [u8]);
}

/// Render one layer's frame into `out`, which must hold `3 * n` bytes.
///
/// Dispatches to the stateless generator for the kind, or to the given
/// particle state for stateful kinds, then applies the shared
/// reverse/mirror index transforms.
pub fn render_layer(
    kind: EffectKind,
    params: &Params,
    state: Option<&mut Box<dyn ParticleEffect>>,
    n: usize,
    t: f64,
    dt: f64,
    out: &mut [u8],
) {
    debug_assert_eq!(out.len(), n * 3);
    out.fill(0);
    if n == 0 {
        return;
    }

    match (kind, state) {
        (EffectKind::Solid, _) => basic::solid(params, n, t, out),
        (EffectKind::Rainbow, _) => basic::rainbow(params, n, t, out),
        (EffectKind::ColorWipe, _) => basic::color_wipe(params, n, t, out),
        (EffectKind::Breathing, _) => basic::breathing(params, n, t, out),
        (EffectKind::Wave, _) => basic::wave(params, n, t, out),
        (EffectKind::Comet, _) => motion::comet(params, n, t, out),
        (EffectKind::Chase, _) => motion::chase(params, n, t, out),
        (EffectKind::Cylon, _) => motion::cylon(params, n, t, out),
        (EffectKind::Matrix, _) => motion::matrix(params, n, t, out),
        (EffectKind::Twinkle, _) => sparkle::twinkle(params, n, t, out),
        (EffectKind::ColorTwinkle, _) => sparkle::color_twinkle(params, n, t, out),
        (EffectKind::Glitter, _) => sparkle::glitter(params, n, t, out),
        (EffectKind::Fire, _) => ambient::fire(params, n, t, out),
        (EffectKind::Pacifica, _) => ambient::pacifica(params, n, t, out),
        (EffectKind::Plasma, _) => ambient::plasma(params, n, t, out),
        (kind, Some(state)) if kind.is_particle() => state.render(params, n, t, dt, out),
        (kind, None) if kind.is_particle() => {
            // Particle effect without state renders dark rather than
            // panicking; the session normally provides the state.
            log::warn!("particle effect '{}' rendered without state", kind);
        }
        _ => unreachable!("non-particle kinds are handled above"),
    }

    if params.reverse() {
        reverse_pixels(out);
    }
    if params.mirror() {
        mirror_pixels(out);
    }
}

/// `i -> N-1-i`
fn reverse_pixels(buf: &mut [u8]) {
    let n = buf.len() / 3;
    for i in 0..n / 2 {
        let j = n - 1 - i;
        for c in 0..3 {
            buf.swap(i * 3 + c, j * 3 + c);
        }
    }
}

/// Fold at the midpoint: `i -> min(i, N-1-i)`.
fn mirror_pixels(buf: &mut [u8]) {
    let n = buf.len() / 3;
    for i in 0..n {
        let src = i.min(n - 1 - i);
        if src != i {
            let (a, b) = (src * 3, i * 3);
            let (head, tail) = buf.split_at_mut(b);
            tail[..3].copy_from_slice(&head[a..a + 3]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::params::ParamValue;
    use lumen_fixtures::Color;

    #[test]
    fn test_every_kind_fills_3n_bytes() {
        let params = Params::new();
        for kind in EffectKind::all() {
            let n = 17;
            let mut out = vec![0u8; n * 3];
            let mut state = kind.new_particle();
            render_layer(kind, &params, state.as_mut(), n, 1.25, 1.0 / 30.0, &mut out);
            assert_eq!(out.len(), n * 3, "kind {}", kind);
        }
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in EffectKind::all() {
            assert_eq!(EffectKind::parse(kind.as_str()), Some(kind), "{}", kind);
        }
        assert_eq!(EffectKind::parse("color-wipe"), Some(EffectKind::ColorWipe));
        assert_eq!(EffectKind::parse("disco-ball"), None);
    }

    #[test]
    fn test_reverse_transform() {
        let params = Params::new()
            .with(
                "colors",
                ParamValue::colors(vec![Color::rgb(255, 0, 0), Color::rgb(0, 0, 255)]),
            )
            .with("reverse", ParamValue::boolean(true))
            .with("speed", ParamValue::number(0.01));

        // color-wipe with reverse: wipe starts from the far end.
        let n = 4;
        let mut plain = vec![0u8; n * 3];
        let mut reversed = vec![0u8; n * 3];
        let forward = Params::new()
            .with(
                "colors",
                ParamValue::colors(vec![Color::rgb(255, 0, 0), Color::rgb(0, 0, 255)]),
            )
            .with("speed", ParamValue::number(0.01));
        render_layer(EffectKind::ColorWipe, &forward, None, n, 1.0, 0.03, &mut plain);
        render_layer(EffectKind::ColorWipe, &params, None, n, 1.0, 0.03, &mut reversed);

        for i in 0..n {
            assert_eq!(
                &plain[i * 3..i * 3 + 3],
                &reversed[(n - 1 - i) * 3..(n - 1 - i) * 3 + 3]
            );
        }
    }

    #[test]
    fn test_mirror_transform() {
        let params = Params::new().with("mirror", ParamValue::boolean(true));
        let n = 6;
        let mut out = vec![0u8; n * 3];
        render_layer(EffectKind::Rainbow, &params, None, n, 0.0, 0.03, &mut out);
        // Folded: second half mirrors the first.
        for i in 0..n {
            let src = i.min(n - 1 - i);
            assert_eq!(&out[i * 3..i * 3 + 3], &out[src * 3..src * 3 + 3].to_vec()[..]);
        }
    }
}
