use std::f64::consts::TAU;

use lumen_fixtures::Color;

use super::{add_pixel, set_pixel, value_noise};
use crate::effect::palette::sample_palette;
use crate::effect::params::Params;

/// Non-wrapping gradient lookup used by the heat ramp.
fn gradient(stops: &[Color], t: f64) -> Color {
    let t = t.clamp(0.0, 1.0);
    let last = stops.len() - 1;
    let x = t * last as f64;
    let i = (x.floor() as usize).min(last - 1);
    stops[i].lerp(stops[i + 1], x - i as f64)
}

fn heat_color(heat: f64) -> Color {
    const RAMP: [Color; 5] = [
        Color::BLACK,
        Color::rgb(180, 0, 0),
        Color::rgb(255, 110, 0),
        Color::rgb(255, 220, 40),
        Color::WHITE,
    ];
    gradient(&RAMP, heat)
}

/// Flame simulation driven by drifting value noise. Pixel 0 is the base
/// of the flame; heat decays toward the tip and flickers over time.
///
/// `cooling` raises the decay toward the tip, `sparking` lifts random
/// hot spots near the base.
pub fn fire(params: &Params, n: usize, t: f64, out: &mut [u8]) {
    let cooling = params.number_or("cooling", 0.55).clamp(0.0, 1.0);
    let sparking = params.number_or("sparking", 0.5).clamp(0.0, 1.0);
    let ts = t * params.speed();

    for i in 0..n {
        let pos = i as f64 / n as f64;
        let base = (1.0 - pos * (0.6 + cooling)).max(0.0);

        let flicker = 0.6 * value_noise(i as f64 * 0.35 + ts * 3.0, 0xF1)
            + 0.4 * value_noise(i as f64 * 0.9 - ts * 5.0, 0xF2);

        let spark = if pos < 0.25 {
            let roll = value_noise(i as f64 * 1.7 + ts * 7.0, 0xF3);
            if roll > 1.0 - sparking * 0.5 {
                0.5
            } else {
                0.0
            }
        } else {
            0.0
        };

        let heat = (base * (0.35 + 0.65 * flicker) + spark).clamp(0.0, 1.0);
        set_pixel(out, i, heat_color(heat));
    }
}

/// Layered ocean: slow blue-green sinusoids over two palettes with
/// whitecaps where the swells align.
pub fn pacifica(params: &Params, n: usize, t: f64, out: &mut [u8]) {
    const DEEP: [Color; 4] = [
        Color::rgb(0, 5, 40),
        Color::rgb(0, 20, 70),
        Color::rgb(0, 60, 90),
        Color::rgb(20, 120, 140),
    ];
    const SURF: [Color; 4] = [
        Color::rgb(0, 10, 60),
        Color::rgb(0, 50, 100),
        Color::rgb(40, 140, 160),
        Color::rgb(120, 210, 210),
    ];

    let ts = t * params.speed();
    // (wavelengths on the strip, drift px/s, depth, palette)
    let layers: [(f64, f64, f64, &[Color]); 4] = [
        (1.1, 0.09, 0.55, &DEEP),
        (2.3, -0.14, 0.40, &DEEP),
        (3.7, 0.21, 0.30, &SURF),
        (5.3, -0.33, 0.25, &SURF),
    ];

    for i in 0..n {
        let pos = i as f64 / n as f64;
        let mut swell = 0.0;
        for (wl, drift, depth, palette) in layers {
            let phase = pos * wl + ts * drift;
            let level = 0.5 + 0.5 * (TAU * phase).sin();
            swell += level * depth;
            add_pixel(out, i, sample_palette(palette, phase).scale(level * depth));
        }
        // Whitecap where the swells stack up.
        if swell > 1.25 {
            let cap = ((swell - 1.25) * 2.0).min(0.6);
            add_pixel(out, i, Color::WHITE.scale(cap));
        }
    }
}

/// Classic plasma: summed sine fields mapped through hue (or the
/// configured palette).
pub fn plasma(params: &Params, n: usize, t: f64, out: &mut [u8]) {
    let saturation = params.number_or("saturation", 1.0).clamp(0.0, 1.0);
    let brightness = params.number_or("brightness", 1.0).clamp(0.0, 1.0);
    let use_palette = params.use_palette();
    let colors = params.strip_colors();
    let ts = t * params.speed();

    for i in 0..n {
        let x = i as f64 / n as f64 * 10.0;
        let v = (x + ts).sin() + (0.5 * x - 0.7 * ts).sin() + (0.3 * x + 1.3 * ts).sin();
        let norm = (v / 3.0) * 0.5 + 0.5;
        let color = if use_palette {
            sample_palette(&colors, norm).scale(brightness)
        } else {
            Color::from_hsv(norm * 360.0, saturation, brightness)
        };
        set_pixel(out, i, color);
    }
}
