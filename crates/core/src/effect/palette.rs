use lumen_fixtures::Color;
use serde::{Deserialize, Serialize};

/// Ordered color list sampled as a cyclic continuous function.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Palette {
    pub id: String,
    pub name: String,
    pub colors: Vec<Color>,
}

impl Palette {
    pub fn validate(&self) -> Result<(), String> {
        if self.colors.is_empty() {
            return Err(format!("palette '{}' must have at least one color", self.id));
        }
        Ok(())
    }

    pub fn sample(&self, t: f64) -> Color {
        sample_palette(&self.colors, t)
    }
}

/// Piecewise-linear palette interpolation with wrap (last -> first), so
/// sampling is seamless across cycle boundaries: `t` and `t + 1.0` yield
/// the same color.
pub fn sample_palette(colors: &[Color], t: f64) -> Color {
    match colors.len() {
        0 => Color::BLACK,
        1 => colors[0],
        k => {
            let x = t.rem_euclid(1.0) * k as f64;
            let i1 = (x.floor() as usize) % k;
            let i2 = (i1 + 1) % k;
            let f = x - x.floor();
            colors[i1].lerp(colors[i2], f)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Color = Color::rgb(255, 0, 0);
    const GREEN: Color = Color::rgb(0, 255, 0);
    const BLUE: Color = Color::rgb(0, 0, 255);

    #[test]
    fn test_exact_stops() {
        let colors = [RED, GREEN, BLUE];
        assert_eq!(sample_palette(&colors, 0.0), RED);
        assert_eq!(sample_palette(&colors, 1.0 / 3.0), GREEN);
        assert_eq!(sample_palette(&colors, 2.0 / 3.0), BLUE);
    }

    #[test]
    fn test_midpoint_lerp() {
        let colors = [Color::BLACK, Color::WHITE];
        let mid = sample_palette(&colors, 0.25);
        assert_eq!(mid, Color::rgb(128, 128, 128));
    }

    #[test]
    fn test_wrap_last_to_first() {
        // Past the final stop the palette blends back toward the first.
        let colors = [RED, BLUE];
        let c = sample_palette(&colors, 0.75);
        assert_eq!(c, Color::rgb(128, 0, 128));
    }

    #[test]
    fn test_seamless_cycle() {
        let colors = [RED, GREEN, BLUE];
        for i in 0..20 {
            let t = i as f64 * 0.07;
            assert_eq!(
                sample_palette(&colors, t),
                sample_palette(&colors, t + 1.0),
                "wrap mismatch at t={}",
                t
            );
        }
    }

    #[test]
    fn test_degenerate_palettes() {
        assert_eq!(sample_palette(&[], 0.3), Color::BLACK);
        assert_eq!(sample_palette(&[GREEN], 0.9), GREEN);
    }
}
