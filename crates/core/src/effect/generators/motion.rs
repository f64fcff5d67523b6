use lumen_fixtures::Color;

use super::{add_pixel, fill, pixel_hash, set_pixel};
use crate::effect::palette::sample_palette;
use crate::effect::params::Params;

/// Bright head with a linearly fading tail sweeping the strip. The head
/// color advances through the color list once per pass.
pub fn comet(params: &Params, n: usize, t: f64, out: &mut [u8]) {
    let colors = params.strip_colors();
    let tail = params.number_or("tailLength", 10.0).max(1.0);
    let rate = params.speed() * 30.0;
    let span = n as f64 + tail;

    let travelled = t * rate;
    let head = travelled.rem_euclid(span);
    let pass = (travelled / span).floor().max(0.0) as usize;
    let color = colors[pass % colors.len()];

    for i in 0..n {
        let behind = head - i as f64;
        if (0.0..tail).contains(&behind) {
            let level = 1.0 - behind / tail;
            set_pixel(out, i, color.scale(level * level));
        }
    }
}

/// Blocks of `width` lit pixels separated by `gap` background pixels,
/// marching along the strip.
///
/// `colorMode` selects how blocks are colored: `palette` samples the
/// color list per block, `cycle` (default) switches the whole pattern to
/// the next color once per full pass.
pub fn chase(params: &Params, n: usize, t: f64, out: &mut [u8]) {
    let colors = params.strip_colors();
    let k = colors.len();
    let width = params.number_or("width", 3.0).max(1.0) as usize;
    let gap = params.number_or("gap", (width * 2) as f64).max(0.0) as usize;
    let period = (width + gap).max(1);
    let background = params.color("backgroundColor").unwrap_or(Color::BLACK);
    let palette_mode = params.option_str("colorMode") == Some("palette");

    let offset = t * params.speed() * 30.0;
    let pass = (offset / n as f64).floor().max(0.0) as usize;
    let cycle_color = colors[pass % k];

    fill(out, background);
    for i in 0..n {
        let shifted = i as f64 - offset;
        let rel = shifted.rem_euclid(period as f64) as usize;
        if rel < width {
            let color = if palette_mode {
                let block = (shifted / period as f64).floor();
                sample_palette(&colors, block / k as f64)
            } else {
                cycle_color
            };
            set_pixel(out, i, color);
        }
    }
}

/// A bouncing eye, Battlestar style. Sweeps end to end and back.
pub fn cylon(params: &Params, n: usize, t: f64, out: &mut [u8]) {
    let eye = params.number_or("eyeSize", 4.0).max(1.0);
    let color = params.primary_color();

    let phase = (t * params.speed() * 0.5).rem_euclid(1.0);
    let tri = 1.0 - (2.0 * phase - 1.0).abs();
    let center = tri * (n - 1) as f64;

    for i in 0..n {
        let dist = (i as f64 - center).abs();
        if dist < eye {
            let level = 1.0 - dist / eye;
            set_pixel(out, i, color.scale(level * level));
        }
    }
}

/// Digital-rain streams: hashed drops with fading green tails.
pub fn matrix(params: &Params, n: usize, t: f64, out: &mut [u8]) {
    const TRAIL: f64 = 6.0;
    let drops = (n / 8).max(1);
    let span = n as f64 + TRAIL;

    for d in 0..drops {
        let velocity = 8.0 + 16.0 * pixel_hash(d, 0xA1);
        let start = pixel_hash(d, 0xB2) * span;
        let head = (start + t * params.speed() * velocity).rem_euclid(span);

        for k in 0..=TRAIL as usize {
            let p = head - k as f64;
            if p >= 0.0 && (p as usize) < n {
                let level = 1.0 - k as f64 / TRAIL;
                let color = if k == 0 {
                    // Whitened head pixel.
                    Color::rgb(180, 255, 180)
                } else {
                    Color::rgb(0, (level * level * 220.0) as u8, 0)
                };
                add_pixel(out, p as usize, color);
            }
        }
    }
}
