use std::f64::consts::TAU;

use lumen_fixtures::Color;

use super::{fill, set_pixel};
use crate::effect::palette::sample_palette;
use crate::effect::params::Params;

/// Every pixel the first configured color.
pub fn solid(params: &Params, _n: usize, _t: f64, out: &mut [u8]) {
    fill(out, params.primary_color());
}

/// Hue sweep across the strip, scrolling with `speed`.
///
/// HSV mode spreads one full hue cycle over the strip: pixel `i` at rest
/// sits at hue `i / N * 360`. Palette mode samples the configured palette
/// at the same position instead.
pub fn rainbow(params: &Params, n: usize, t: f64, out: &mut [u8]) {
    let saturation = params.number_or("saturation", 1.0).clamp(0.0, 1.0);
    let brightness = params.number_or("brightness", 1.0).clamp(0.0, 1.0);
    let offset = t * params.speed() * 0.1;
    let use_palette = params.use_palette();
    let colors = params.strip_colors();

    for i in 0..n {
        let pos = (i as f64 / n as f64 + offset).rem_euclid(1.0);
        let color = if use_palette {
            sample_palette(&colors, pos).scale(brightness)
        } else {
            Color::from_hsv(pos * 360.0, saturation, brightness)
        };
        set_pixel(out, i, color);
    }
}

/// Wipe the current cycle color across the strip over the previous one.
/// `speed` is in units of 100 pixels per second.
pub fn color_wipe(params: &Params, n: usize, t: f64, out: &mut [u8]) {
    let colors = params.strip_colors();
    let k = colors.len();
    let total = t * params.speed() * 100.0;
    let cycle = (total / n as f64).floor().max(0.0) as usize;
    let wiped = total.rem_euclid(n as f64).floor() as usize;

    let current = colors[cycle % k];
    let previous = colors[(cycle + k - 1) % k];

    for i in 0..n {
        set_pixel(out, i, if i <= wiped { current } else { previous });
    }
}

/// Sinusoidal whole-strip brightness envelope on the primary color.
pub fn breathing(params: &Params, n: usize, t: f64, out: &mut [u8]) {
    let floor = params.number_or("minBrightness", 0.0).clamp(0.0, 1.0);
    let phase = t * params.speed() / 4.0;
    let level = 0.5 * (1.0 - (TAU * phase).cos());
    let level = floor + (1.0 - floor) * level;

    let color = params.primary_color().scale(level);
    for i in 0..n {
        set_pixel(out, i, color);
    }
}

/// Traveling sine wave of intensity. `waves` sets how many wavelengths
/// fit on the strip.
pub fn wave(params: &Params, n: usize, t: f64, out: &mut [u8]) {
    let waves = params.number_or("waves", 1.0).max(0.0);
    let use_palette = params.use_palette();
    let colors = params.strip_colors();
    let base = colors[0];

    for i in 0..n {
        let pos = i as f64 / n as f64;
        let phase = pos * waves - t * params.speed() * 0.5;
        let level = 0.5 + 0.5 * (TAU * phase).sin();
        let color = if use_palette {
            sample_palette(&colors, pos).scale(level)
        } else {
            base.scale(level)
        };
        set_pixel(out, i, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::params::ParamValue;

    fn red_blue() -> Params {
        Params::new().with(
            "colors",
            ParamValue::colors(vec![Color::rgb(255, 0, 0), Color::rgb(0, 0, 255)]),
        )
    }

    #[test]
    fn test_solid_repeats_first_color() {
        let params = red_blue();
        let mut out = vec![0u8; 30];
        solid(&params, 10, 123.4, &mut out);
        for px in out.chunks(3) {
            assert_eq!(px, &[0xFF, 0x00, 0x00]);
        }
    }

    #[test]
    fn test_rainbow_hue_ladder() {
        // speed=0, sat=1, bright=1, N=6: hues 0,60,...,300.
        let params = Params::new().with("speed", ParamValue::number(0.0));
        let mut out = vec![0u8; 18];
        rainbow(&params, 6, 0.0, &mut out);
        let expected: &[[u8; 3]] = &[
            [0xFF, 0x00, 0x00],
            [0xFF, 0xFF, 0x00],
            [0x00, 0xFF, 0x00],
            [0x00, 0xFF, 0xFF],
            [0x00, 0x00, 0xFF],
            [0xFF, 0x00, 0xFF],
        ];
        for (i, px) in expected.iter().enumerate() {
            assert_eq!(&out[i * 3..i * 3 + 3], px, "pixel {}", i);
        }
    }

    #[test]
    fn test_rainbow_speed_zero_is_static() {
        let params = Params::new().with("speed", ParamValue::number(0.0));
        let mut a = vec![0u8; 18];
        let mut b = vec![0u8; 18];
        rainbow(&params, 6, 0.0, &mut a);
        rainbow(&params, 6, 99.0, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_color_wipe_midpoint() {
        // speed=0.01 -> 1 px/s. N=10. t=15 -> total=15: cycle 1 (blue
        // wiping), progress 5: first six pixels blue, last four red.
        let params = red_blue().with("speed", ParamValue::number(0.01));
        let mut out = vec![0u8; 30];
        color_wipe(&params, 10, 15.0, &mut out);
        for i in 0..10 {
            let px = &out[i * 3..i * 3 + 3];
            if i <= 5 {
                assert_eq!(px, &[0x00, 0x00, 0xFF], "pixel {}", i);
            } else {
                assert_eq!(px, &[0xFF, 0x00, 0x00], "pixel {}", i);
            }
        }
    }

    #[test]
    fn test_breathing_starts_dark_and_peaks() {
        let params = red_blue();
        let mut out = vec![0u8; 3];
        breathing(&params, 1, 0.0, &mut out);
        assert_eq!(out, vec![0, 0, 0]);

        // Half period at speed 1 is t=2: full brightness.
        breathing(&params, 1, 2.0, &mut out);
        assert_eq!(out, vec![255, 0, 0]);
    }

    #[test]
    fn test_wave_levels_bounded_and_periodic() {
        let params = red_blue();
        let mut a = vec![0u8; 60];
        wave(&params, 20, 0.25, &mut a);
        assert!(a.iter().any(|&b| b > 0));

        // speed 1: wave period is 2 seconds (allow rounding jitter).
        let mut b = vec![0u8; 60];
        wave(&params, 20, 2.25, &mut b);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!(x.abs_diff(*y) <= 1);
        }
    }
}
