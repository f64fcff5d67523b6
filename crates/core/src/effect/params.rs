use std::collections::BTreeMap;

use lumen_fixtures::Color;
use serde::{Deserialize, Serialize};

/// One typed effect parameter value. The set of kinds is closed; anything
/// else is rejected at the API boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ParamValue {
    Color {
        value: Color,
    },
    Number {
        value: f64,
    },
    Range {
        value: f64,
        min: f64,
        max: f64,
        step: f64,
    },
    Bool {
        value: bool,
    },
    Options {
        value: String,
        choices: Vec<String>,
    },
    Colors {
        value: Vec<Color>,
    },
    Palette {
        value: String,
    },
}

impl ParamValue {
    pub fn number(value: f64) -> Self {
        ParamValue::Number { value }
    }

    pub fn boolean(value: bool) -> Self {
        ParamValue::Bool { value }
    }

    pub fn color(value: Color) -> Self {
        ParamValue::Color { value }
    }

    pub fn colors(value: Vec<Color>) -> Self {
        ParamValue::Colors { value }
    }

    pub fn palette(id: impl Into<String>) -> Self {
        ParamValue::Palette { value: id.into() }
    }

    pub fn option(value: impl Into<String>) -> Self {
        ParamValue::Options {
            value: value.into(),
            choices: Vec::new(),
        }
    }
}

/// Parameter bag for one effect instance: a flat name -> typed value map
/// with accessors that coerce where it is lossless.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Params(BTreeMap<String, ParamValue>);

/// Key under which a session stores the materialized colors of a
/// referenced palette. Not a user-facing parameter.
pub const RESOLVED_PALETTE_KEY: &str = "__resolvedPalette";

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: ParamValue) {
        self.0.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.0.get(name)? {
            ParamValue::Number { value } | ParamValue::Range { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn number_or(&self, name: &str, default: f64) -> f64 {
        self.number(name).unwrap_or(default)
    }

    pub fn boolean(&self, name: &str) -> bool {
        matches!(self.0.get(name), Some(ParamValue::Bool { value: true }))
    }

    pub fn color(&self, name: &str) -> Option<Color> {
        match self.0.get(name)? {
            ParamValue::Color { value } => Some(*value),
            _ => None,
        }
    }

    pub fn color_list(&self, name: &str) -> Option<&[Color]> {
        match self.0.get(name)? {
            ParamValue::Colors { value } => Some(value),
            _ => None,
        }
    }

    pub fn option_str(&self, name: &str) -> Option<&str> {
        match self.0.get(name)? {
            ParamValue::Options { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn palette_ref(&self) -> Option<&str> {
        match self.0.get("palette")? {
            ParamValue::Palette { value } => Some(value),
            _ => None,
        }
    }

    // Common parameter semantics shared by most generators.

    pub fn speed(&self) -> f64 {
        self.number_or("speed", 1.0)
    }

    pub fn reverse(&self) -> bool {
        self.boolean("reverse")
    }

    pub fn mirror(&self) -> bool {
        self.boolean("mirror")
    }

    pub fn use_palette(&self) -> bool {
        self.boolean("usePalette")
    }

    /// Colors the generator should cycle through. Prefers the resolved
    /// palette when `usePalette` is set, then the `colors` list, then a
    /// single white.
    pub fn strip_colors(&self) -> Vec<Color> {
        if self.use_palette() {
            if let Some(colors) = self.color_list(RESOLVED_PALETTE_KEY) {
                if !colors.is_empty() {
                    return colors.to_vec();
                }
            }
        }
        if let Some(colors) = self.color_list("colors") {
            if !colors.is_empty() {
                return colors.to_vec();
            }
        }
        if let Some(color) = self.color("color") {
            return vec![color];
        }
        vec![Color::WHITE]
    }

    /// First configured color, white when nothing is set.
    pub fn primary_color(&self) -> Color {
        self.strip_colors()[0]
    }
}
