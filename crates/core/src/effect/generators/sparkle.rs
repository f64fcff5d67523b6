use std::f64::consts::PI;

use lumen_fixtures::Color;

use super::{fill, hash01, pixel_hash, set_pixel};
use crate::effect::palette::sample_palette;
use crate::effect::params::Params;

/// Per-pixel twinkle envelope. Each pixel owns a hashed period and phase;
/// a hashed gate per cycle keeps roughly `density` of pixels active, so
/// output is a pure function of `t`.
fn twinkle_level(i: usize, t: f64, speed: f64, density: f64) -> f64 {
    let period = 1.5 + 2.5 * pixel_hash(i, 0x71);
    let phase0 = pixel_hash(i, 0x72);
    let x = t * speed / period + phase0;
    let cycle = x.floor();
    let gate = hash01((i as u64) << 20 ^ (cycle as i64) as u64);
    if gate >= density {
        return 0.0;
    }
    (PI * (x - cycle)).sin()
}

pub fn twinkle(params: &Params, n: usize, t: f64, out: &mut [u8]) {
    let density = params.number_or("density", 0.3).clamp(0.0, 1.0);
    let color = params.primary_color();
    for i in 0..n {
        let level = twinkle_level(i, t, params.speed(), density);
        if level > 0.0 {
            set_pixel(out, i, color.scale(level));
        }
    }
}

/// Twinkle with a per-sparkle color drawn from the palette.
pub fn color_twinkle(params: &Params, n: usize, t: f64, out: &mut [u8]) {
    let density = params.number_or("density", 0.3).clamp(0.0, 1.0);
    let colors = params.strip_colors();
    for i in 0..n {
        let level = twinkle_level(i, t, params.speed(), density);
        if level > 0.0 {
            let pick = pixel_hash(i, 0x73);
            set_pixel(out, i, sample_palette(&colors, pick).scale(level));
        }
    }
}

/// Dim base color with brief white sparkles on top.
pub fn glitter(params: &Params, n: usize, t: f64, out: &mut [u8]) {
    let density = params.number_or("density", 0.08).clamp(0.0, 1.0);
    let base = params.primary_color().scale(0.25);
    fill(out, base);

    // Sparkles re-roll at 12 Hz.
    let slot = (t * params.speed() * 12.0).floor() as i64 as u64;
    for i in 0..n {
        if hash01((i as u64).wrapping_mul(0x9E3779B1) ^ slot.wrapping_mul(0xC2B2AE35)) < density {
            set_pixel(out, i, Color::WHITE);
        }
    }
}
