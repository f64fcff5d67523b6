pub use engine::{ramp_envelope, ActiveRuleInfo, ScheduleEngine};
pub use holiday::{Holiday, HolidayDate, Nth};
pub use solar::{solar_times, SolarTimes};

use chrono::{DateTime, NaiveDate, Utc};
use lumen_fixtures::Target;
use serde::{Deserialize, Serialize};

mod engine;
mod holiday;
mod solar;

/// A named bundle of schedule rules with a priority for overlap
/// arbitration (higher wins, ties broken by earliest `created_at`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub rules: Vec<Rule>,
}

fn default_true() -> bool {
    true
}

/// One trigger: date/day/holiday filters, a time window and the preset
/// sequence to run inside it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub targets: Vec<Target>,
    /// Days of week the rule fires on, 0 = Sunday. Empty means every day.
    #[serde(default)]
    pub days_of_week: Vec<u8>,
    /// Explicit dates; empty means no date constraint.
    #[serde(default)]
    pub dates: Vec<NaiveDate>,
    #[serde(default)]
    pub holiday_filter: HolidayFilter,
    pub start: TimeSpec,
    #[serde(default)]
    pub end: Option<TimeSpec>,
    #[serde(default)]
    pub duration_seconds: Option<u64>,
    #[serde(default)]
    pub ramp_on_start: bool,
    #[serde(default)]
    pub ramp_off_end: bool,
    #[serde(default)]
    pub ramp_duration_seconds: u64,
    pub sequence: Vec<SequenceItem>,
    #[serde(default)]
    pub sequence_loop: bool,
    #[serde(default)]
    pub sequence_shuffle: bool,
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Overrides the configured default location for solar specs.
    #[serde(default)]
    pub location: Option<Location>,
}

fn default_fps() -> u32 {
    30
}

impl Rule {
    pub fn validate(&self) -> Result<(), String> {
        if self.targets.is_empty() {
            return Err(format!("rule '{}' has no targets", self.id));
        }
        if self.sequence.is_empty() {
            return Err(format!("rule '{}' has an empty sequence", self.id));
        }
        if self.end.is_none() && self.duration_seconds.is_none() {
            return Err(format!(
                "rule '{}' needs an end spec or a duration",
                self.id
            ));
        }
        if let Some(day) = self.days_of_week.iter().find(|d| **d > 6) {
            return Err(format!("rule '{}': day of week {} out of 0..=6", self.id, day));
        }
        if !(1..=120).contains(&self.fps) {
            return Err(format!("rule '{}': fps {} outside 1..=120", self.id, self.fps));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SequenceItem {
    pub preset_id: String,
    #[serde(default = "default_item_duration")]
    pub duration_seconds: f64,
}

fn default_item_duration() -> f64 {
    60.0
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// IANA zone name, e.g. "America/New_York".
    #[serde(default)]
    pub timezone: Option<chrono_tz::Tz>,
}

/// When a window edge occurs: a wall-clock time or a solar event with a
/// minute offset.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TimeSpec {
    Time { hour: u32, minute: u32 },
    Sunrise { offset_minutes: i32 },
    Sunset { offset_minutes: i32 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HolidayMode {
    #[default]
    Ignore,
    /// Rule does not fire on matching holidays.
    Skip,
    /// Rule fires only on matching holidays.
    Only,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HolidayFilter {
    #[serde(default)]
    pub mode: HolidayMode,
    /// Restrict matching to these holiday ids; empty means all.
    #[serde(default)]
    pub selected_holiday_ids: Vec<String>,
    /// Widen each holiday match this many days before the date.
    #[serde(default)]
    pub days_before: u32,
    /// Widen each holiday match this many days after the date.
    #[serde(default)]
    pub days_after: u32,
}
