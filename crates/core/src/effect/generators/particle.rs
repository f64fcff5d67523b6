use lumen_fixtures::Color;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::{add_pixel, set_pixel};
use crate::effect::palette::sample_palette;
use crate::effect::params::Params;
use crate::effect::registry::ParticleEffect;

const RNG_SEED: u64 = 0x1ED_5EED;

/// Colored speckles that pop in at random positions and fade out.
pub struct Confetti {
    rng: SmallRng,
    pieces: Vec<Piece>,
}

struct Piece {
    pos: usize,
    color: Color,
    level: f64,
}

impl Confetti {
    pub fn new() -> Self {
        Confetti {
            rng: SmallRng::seed_from_u64(RNG_SEED),
            pieces: Vec::new(),
        }
    }
}

impl ParticleEffect for Confetti {
    fn render(&mut self, params: &Params, n: usize, _t: f64, dt: f64, out: &mut [u8]) {
        let density = params.number_or("density", 0.5).clamp(0.0, 1.0);
        let fade = params.number_or("fade", 1.6).max(0.1);
        let colors = params.strip_colors();

        for piece in &mut self.pieces {
            piece.level *= (-fade * dt).exp();
        }
        self.pieces.retain(|p| p.level > 0.02 && p.pos < n);

        // Expected spawns this frame; fractional remainder spawns
        // probabilistically so low rates still produce confetti.
        let rate = density * params.speed() * n as f64 * dt / 4.0;
        let mut spawns = rate.floor() as usize;
        if self.rng.random::<f64>() < rate.fract() {
            spawns += 1;
        }
        for _ in 0..spawns {
            self.pieces.push(Piece {
                pos: self.rng.random_range(0..n),
                color: sample_palette(&colors, self.rng.random::<f64>()),
                level: 1.0,
            });
        }

        for piece in &self.pieces {
            add_pixel(out, piece.pos, piece.color.scale(piece.level));
        }
    }
}

/// Pairs of wavefronts expanding outward from random impact points.
pub struct ShockwaveDual {
    rng: SmallRng,
    waves: Vec<Wave>,
    last_spawn: Option<f64>,
}

struct Wave {
    center: f64,
    born: f64,
}

impl ShockwaveDual {
    pub fn new() -> Self {
        ShockwaveDual {
            rng: SmallRng::seed_from_u64(RNG_SEED),
            waves: Vec::new(),
            last_spawn: None,
        }
    }
}

impl ParticleEffect for ShockwaveDual {
    fn render(&mut self, params: &Params, n: usize, t: f64, _dt: f64, out: &mut [u8]) {
        let interval = params.number_or("interval", 2.0).max(0.25);
        let width = params.number_or("waveWidth", 3.0).max(1.0);
        let expansion = params.speed() * 40.0;
        let color = params.primary_color();

        let due = match self.last_spawn {
            None => true,
            Some(last) => t - last >= interval,
        };
        if due {
            self.waves.push(Wave {
                center: self.rng.random::<f64>() * n as f64,
                born: t,
            });
            self.last_spawn = Some(t);
        }
        self.waves
            .retain(|w| (t - w.born) * expansion < n as f64 + width);

        for wave in &self.waves {
            let radius = (t - wave.born) * expansion;
            let amp = (1.0 - radius / n as f64).max(0.0);
            for front in [wave.center - radius, wave.center + radius] {
                let lo = ((front - width).floor().max(0.0)) as usize;
                let hi = ((front + width).ceil().min(n as f64)) as usize;
                for i in lo..hi {
                    let dist = (i as f64 - front).abs();
                    if dist < width {
                        let level = amp * (1.0 - dist / width);
                        add_pixel(out, i, color.scale(level));
                    }
                }
            }
        }
    }
}

/// A stone skipping along the strip: bright hops that shorten until the
/// stone sinks, leaving expanding ripples at each touch point.
pub struct SkippingRock {
    rng: SmallRng,
    pos: f64,
    dir: f64,
    hop_len: f64,
    hop_progress: f64,
    ripples: Vec<Ripple>,
    initialized: bool,
}

struct Ripple {
    center: f64,
    age: f64,
}

impl SkippingRock {
    pub fn new() -> Self {
        SkippingRock {
            rng: SmallRng::seed_from_u64(RNG_SEED),
            pos: 0.0,
            dir: 1.0,
            hop_len: 0.0,
            hop_progress: 0.0,
            ripples: Vec::new(),
            initialized: false,
        }
    }

    fn relaunch(&mut self, n: usize) {
        let from_left = self.rng.random::<bool>();
        self.dir = if from_left { 1.0 } else { -1.0 };
        self.pos = if from_left { 0.0 } else { (n - 1) as f64 };
        self.hop_len = n as f64 / 3.0 + self.rng.random::<f64>() * n as f64 / 6.0;
        self.hop_progress = 0.0;
    }
}

impl ParticleEffect for SkippingRock {
    fn render(&mut self, params: &Params, n: usize, _t: f64, dt: f64, out: &mut [u8]) {
        let hops_shrink = 0.65;
        let min_hop = (params.number_or("hops", 5.0).max(2.0)).recip() * n as f64 / 4.0;
        let velocity = params.speed() * 30.0;
        let color = params.primary_color();

        if !self.initialized {
            self.relaunch(n);
            self.initialized = true;
        }

        let step = velocity * dt;
        self.pos += self.dir * step;
        self.hop_progress += step;

        // Bounce off the ends.
        if self.pos < 0.0 {
            self.pos = -self.pos;
            self.dir = 1.0;
        } else if self.pos > (n - 1) as f64 {
            self.pos = 2.0 * (n - 1) as f64 - self.pos;
            self.dir = -1.0;
        }

        if self.hop_progress >= self.hop_len {
            self.ripples.push(Ripple {
                center: self.pos,
                age: 0.0,
            });
            self.hop_len *= hops_shrink;
            self.hop_progress = 0.0;
            if self.hop_len < min_hop {
                self.relaunch(n);
            }
        }

        for ripple in &mut self.ripples {
            ripple.age += dt;
        }
        self.ripples.retain(|r| r.age < 1.5);

        for ripple in &self.ripples {
            let radius = ripple.age * 15.0;
            let amp = (1.0 - ripple.age / 1.5).max(0.0) * 0.5;
            for front in [ripple.center - radius, ripple.center + radius] {
                let i = front.round();
                if i >= 0.0 && (i as usize) < n {
                    add_pixel(out, i as usize, color.scale(amp));
                }
            }
        }

        // The stone itself: a bright dot mid-hop.
        let arc = (std::f64::consts::PI * (self.hop_progress / self.hop_len).clamp(0.0, 1.0)).sin();
        let i = self.pos.round() as usize;
        if i < n {
            set_pixel(out, i, color.scale(0.4 + 0.6 * arc));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confetti_spawns_and_fades() {
        let mut confetti = Confetti::new();
        let params = Params::new();
        let n = 60;
        let dt = 1.0 / 30.0;

        let mut lit_any = false;
        let mut out = vec![0u8; n * 3];
        for frame in 0..60 {
            out.fill(0);
            confetti.render(&params, n, frame as f64 * dt, dt, &mut out);
            lit_any |= out.iter().any(|&b| b > 0);
        }
        assert!(lit_any);

        // With no further spawns the field decays to black.
        let quiet = Params::new().with(
            "density",
            crate::effect::params::ParamValue::number(0.0),
        );
        for frame in 0..600 {
            out.fill(0);
            confetti.render(&quiet, n, frame as f64 * dt, dt, &mut out);
        }
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_shockwave_expands_from_center() {
        let mut wave = ShockwaveDual::new();
        let params = Params::new();
        let n = 100;

        let mut out = vec![0u8; n * 3];
        wave.render(&params, n, 0.0, 1.0 / 30.0, &mut out);
        let first: Vec<usize> = (0..n).filter(|i| out[i * 3] > 0).collect();

        out.fill(0);
        wave.render(&params, n, 0.5, 1.0 / 30.0, &mut out);
        let later: Vec<usize> = (0..n).filter(|i| out[i * 3] > 0).collect();

        assert!(!first.is_empty());
        assert!(!later.is_empty());
        let spread =
            |v: &[usize]| v.iter().max().unwrap() - v.iter().min().unwrap();
        assert!(spread(&later) >= spread(&first));
    }

    #[test]
    fn test_skipping_rock_stays_in_bounds() {
        let mut rock = SkippingRock::new();
        let params = Params::new();
        let n = 40;
        let dt = 1.0 / 30.0;
        for frame in 0..300 {
            let mut out = vec![0u8; n * 3];
            rock.render(&params, n, frame as f64 * dt, dt, &mut out);
            assert!(out.iter().any(|&b| b > 0), "frame {}", frame);
        }
    }
}
