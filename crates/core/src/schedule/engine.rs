use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::holiday::Holiday;
use super::solar::solar_times;
use super::{HolidayFilter, HolidayMode, Rule, Schedule, TimeSpec};
use crate::clock::SharedClock;
use crate::preset::Preset;
use crate::session::{SessionSpec, Supervisor};
use crate::target::{spans_intersect, Span};

/// Linear brightness envelope for schedule ramps.
///
/// Ramp-on rises 0 -> 1 over `duration_secs` from `start_at`; ramp-off
/// falls 1 -> 0 over the same duration ending at `end_at`. Outside the
/// ramps the multiplier is 1.
pub fn ramp_envelope(
    now: DateTime<Utc>,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    ramp_on: bool,
    ramp_off: bool,
    duration_secs: f64,
) -> f64 {
    let mut brightness: f64 = 1.0;
    if duration_secs <= 0.0 {
        return brightness;
    }
    if ramp_on {
        let elapsed = (now - start_at).num_milliseconds() as f64 / 1000.0;
        brightness = brightness.min((elapsed / duration_secs).clamp(0.0, 1.0));
    }
    if ramp_off {
        let remaining = (end_at - now).num_milliseconds() as f64 / 1000.0;
        brightness = brightness.min((remaining / duration_secs).clamp(0.0, 1.0));
    }
    brightness
}

/// A rule currently holding a session.
struct ActiveRule {
    session_id: String,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    ramp_on: bool,
    ramp_off: bool,
    ramp_duration_secs: f64,
    order: Vec<usize>,
    seq_pos: usize,
    item_ends_at: DateTime<Utc>,
    rng: SmallRng,
}

/// Snapshot row for `GET /schedules/active`.
#[derive(Clone, Debug, Serialize)]
pub struct ActiveRuleInfo {
    pub schedule_id: String,
    pub rule_id: String,
    pub session_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub brightness: f64,
}

/// Evaluates schedule rules against the clock and drives sessions
/// through the supervisor. One rule failure never stops the others.
pub struct ScheduleEngine {
    supervisor: Supervisor,
    schedules: Arc<RwLock<Vec<Schedule>>>,
    holidays: Arc<RwLock<Vec<Holiday>>>,
    presets: Arc<RwLock<Vec<Preset>>>,
    clock: SharedClock,
    default_latitude: f64,
    default_longitude: f64,
    default_tz: Tz,
    active: HashMap<String, ActiveRule>,
    published: Arc<RwLock<Vec<ActiveRuleInfo>>>,
}

impl ScheduleEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        supervisor: Supervisor,
        schedules: Arc<RwLock<Vec<Schedule>>>,
        holidays: Arc<RwLock<Vec<Holiday>>>,
        presets: Arc<RwLock<Vec<Preset>>>,
        clock: SharedClock,
        default_latitude: f64,
        default_longitude: f64,
        default_tz: Tz,
    ) -> Self {
        ScheduleEngine {
            supervisor,
            schedules,
            holidays,
            presets,
            clock,
            default_latitude,
            default_longitude,
            default_tz,
            active: HashMap::new(),
            published: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Shared snapshot of the rules currently firing.
    pub fn active_rules_handle(&self) -> Arc<RwLock<Vec<ActiveRuleInfo>>> {
        Arc::clone(&self.published)
    }

    pub async fn run(mut self, mut shutdown: mpsc::Receiver<()>) {
        let mut ticker = interval(Duration::from_secs(1));
        // Evaluation is bounded per tick; a slow pass drops the next
        // tick instead of queueing it.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        log::info!("schedule engine started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }

        // Rule sessions are stopped by the supervisor-wide teardown.
        log::info!("schedule engine stopped");
    }

    /// One evaluation pass. Public so tests can drive it with a manual
    /// clock.
    pub async fn tick(&mut self) {
        let now = self.clock.now();
        let schedules = self.schedules.read().clone();
        let holidays = self.holidays.read().clone();

        // Priority order: higher priority first, ties to the older
        // schedule. Losing overlaps are suspended, not started.
        let mut ordered: Vec<&Schedule> = schedules.iter().filter(|s| s.enabled).collect();
        ordered.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
        });

        let mut claimed: Vec<Span> = Vec::new();
        let mut winners: Vec<(String, &Rule, DateTime<Utc>, DateTime<Utc>)> = Vec::new();
        let mut suspended: Vec<String> = Vec::new();

        for schedule in &ordered {
            for rule in schedule.rules.iter().filter(|r| r.enabled) {
                let key = format!("{}/{}", schedule.id, rule.id);
                let Some((start_at, end_at)) = self.current_window(rule, now, &holidays) else {
                    continue;
                };

                let spans = match self.rule_spans(rule) {
                    Ok(spans) => spans,
                    Err(err) => {
                        log::warn!("rule '{}' skipped: {}", key, err);
                        continue;
                    }
                };

                if spans_intersect(&claimed, &spans) {
                    suspended.push(key);
                    continue;
                }
                claimed.extend(spans);
                winners.push((key, rule, start_at, end_at));
            }
        }

        // Stop sessions for rules that lost arbitration or fell out of
        // their window.
        let winner_keys: HashSet<&String> = winners.iter().map(|(k, _, _, _)| k).collect();
        let expired: Vec<String> = self
            .active
            .keys()
            .filter(|k| !winner_keys.contains(k))
            .cloned()
            .collect();
        for key in expired {
            if let Some(active) = self.active.remove(&key) {
                log::info!("schedule rule '{}' window closed", key);
                self.supervisor.stop_session(&active.session_id).await.ok();
            }
        }
        for key in suspended {
            if let Some(active) = self.active.remove(&key) {
                log::info!("schedule rule '{}' suspended by higher priority", key);
                self.supervisor.stop_session(&active.session_id).await.ok();
            }
        }

        for (key, rule, start_at, end_at) in winners {
            if let Err(err) = self.drive_rule(&key, rule, start_at, end_at, now).await {
                log::error!("schedule rule '{}' failed: {}", key, err);
            }
        }

        self.publish(now);
    }

    /// Start or advance the session for one in-window rule.
    async fn drive_rule(
        &mut self,
        key: &str,
        rule: &Rule,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> crate::error::Result<()> {
        // A dead session (e.g. all fixtures unhealthy) is forgotten and
        // restarted on a later tick.
        if let Some(active) = self.active.get(key) {
            if self.supervisor.session(&active.session_id).is_err() {
                self.active.remove(key);
            }
        }

        if rule.sequence.is_empty() {
            return Err(crate::error::EngineError::Validation(format!(
                "rule '{}' has an empty sequence",
                key
            )));
        }

        if !self.active.contains_key(key) {
            let mut rng = SmallRng::from_os_rng();
            let order = materialize_order(rule, &mut rng);
            let first = order[0];
            let layers = self.preset_layers(&rule.sequence[first].preset_id)?;

            let info = self
                .supervisor
                .start_session(SessionSpec {
                    targets: rule.targets.clone(),
                    layers,
                    fps: rule.fps,
                    exclusive: false,
                    excluded_fixtures: Vec::new(),
                    playlist_id: None,
                })
                .await?;
            log::info!(
                "schedule rule '{}' started session '{}' until {}",
                key,
                info.id,
                end_at
            );

            let item_ends_at =
                now + ChronoDuration::milliseconds((rule.sequence[first].duration_seconds * 1000.0) as i64);
            self.active.insert(
                key.to_string(),
                ActiveRule {
                    session_id: info.id,
                    start_at,
                    end_at,
                    ramp_on: rule.ramp_on_start,
                    ramp_off: rule.ramp_off_end,
                    ramp_duration_secs: rule.ramp_duration_seconds as f64,
                    order,
                    seq_pos: 0,
                    item_ends_at,
                    rng,
                },
            );
        } else if rule.sequence.len() > 1 {
            self.advance_sequence(key, rule, now).await?;
        }

        if let Some(active) = self.active.get(key) {
            let brightness = ramp_envelope(
                now,
                active.start_at,
                active.end_at,
                rule.ramp_on_start,
                rule.ramp_off_end,
                rule.ramp_duration_seconds as f64,
            );
            self.supervisor
                .set_brightness(&active.session_id, brightness)
                .await?;
        }
        Ok(())
    }

    /// In-window playlist semantics: advance items on their durations;
    /// re-materialize the order when looping, hold the last item
    /// otherwise.
    async fn advance_sequence(
        &mut self,
        key: &str,
        rule: &Rule,
        now: DateTime<Utc>,
    ) -> crate::error::Result<()> {
        let Some(active) = self.active.get_mut(key) else {
            return Ok(());
        };
        if now < active.item_ends_at {
            return Ok(());
        }

        let mut next = active.seq_pos + 1;
        if next >= active.order.len() {
            if rule.sequence_loop {
                active.order = materialize_order(rule, &mut active.rng);
                next = 0;
            } else {
                // Hold the final look until the window closes.
                active.item_ends_at = active.end_at;
                return Ok(());
            }
        }

        active.seq_pos = next;
        let item = &rule.sequence[active.order[next]];
        active.item_ends_at =
            now + ChronoDuration::milliseconds((item.duration_seconds * 1000.0) as i64);
        let session_id = active.session_id.clone();
        let layers = self.preset_layers(&item.preset_id)?;
        self.supervisor.set_layers(&session_id, layers).await
    }

    fn preset_layers(&self, preset_id: &str) -> crate::error::Result<Vec<crate::effect::Layer>> {
        let presets = self.presets.read();
        presets
            .iter()
            .find(|p| p.id() == preset_id)
            .map(Preset::to_layers)
            .ok_or_else(|| crate::error::EngineError::NotFound(format!("preset '{}'", preset_id)))
    }

    fn rule_spans(&self, rule: &Rule) -> crate::error::Result<Vec<Span>> {
        let catalog = self.supervisor.catalog();
        let catalog = catalog.read();
        let health = self.supervisor.health();
        let mut spans = Vec::new();
        for target in &rule.targets {
            spans.extend(crate::target::resolve(target, &catalog, &health, &[])?);
        }
        Ok(spans)
    }

    /// The window containing `now`, if any. Checks windows anchored on
    /// today and yesterday (in the rule's zone) so overnight windows
    /// stay active past midnight.
    fn current_window(
        &self,
        rule: &Rule,
        now: DateTime<Utc>,
        holidays: &[Holiday],
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let tz = rule
            .location
            .and_then(|l| l.timezone)
            .unwrap_or(self.default_tz);
        let today = now.with_timezone(&tz).date_naive();

        for date in [today.pred_opt()?, today] {
            if !self.filters_pass(rule, date, holidays) {
                continue;
            }
            if let Some((start, end)) = self.window_for_date(rule, date, tz) {
                if now >= start && now < end {
                    return Some((start, end));
                }
            }
        }
        None
    }

    fn window_for_date(
        &self,
        rule: &Rule,
        date: NaiveDate,
        tz: Tz,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let (lat, lon) = rule
            .location
            .map(|l| (l.latitude, l.longitude))
            .unwrap_or((self.default_latitude, self.default_longitude));

        let start = spec_instant(&rule.start, date, tz, lat, lon)?;
        let end = match (&rule.end, rule.duration_seconds) {
            (Some(spec), _) => {
                let same_day = spec_instant(spec, date, tz, lat, lon)?;
                if same_day <= start {
                    // End earlier than start reads as "next day".
                    spec_instant(spec, date.succ_opt()?, tz, lat, lon)?
                } else {
                    same_day
                }
            }
            (None, Some(seconds)) => start + ChronoDuration::seconds(seconds as i64),
            (None, None) => return None,
        };
        Some((start, end))
    }

    fn filters_pass(&self, rule: &Rule, date: NaiveDate, holidays: &[Holiday]) -> bool {
        if !rule.days_of_week.is_empty() {
            let weekday = date.weekday().num_days_from_sunday() as u8;
            if !rule.days_of_week.contains(&weekday) {
                return false;
            }
        }
        if !rule.dates.is_empty() && !rule.dates.contains(&date) {
            return false;
        }
        match rule.holiday_filter.mode {
            HolidayMode::Ignore => true,
            HolidayMode::Skip => !holiday_matches(&rule.holiday_filter, date, holidays),
            HolidayMode::Only => holiday_matches(&rule.holiday_filter, date, holidays),
        }
    }

    fn publish(&self, now: DateTime<Utc>) {
        let mut rows: Vec<ActiveRuleInfo> = self
            .active
            .iter()
            .map(|(key, active)| {
                let (schedule_id, rule_id) = key.split_once('/').unwrap_or((key.as_str(), ""));
                ActiveRuleInfo {
                    schedule_id: schedule_id.to_string(),
                    rule_id: rule_id.to_string(),
                    session_id: active.session_id.clone(),
                    start_at: active.start_at,
                    end_at: active.end_at,
                    brightness: ramp_envelope(
                        now,
                        active.start_at,
                        active.end_at,
                        active.ramp_on,
                        active.ramp_off,
                        active.ramp_duration_secs,
                    ),
                }
            })
            .collect();
        rows.sort_by(|a, b| a.rule_id.cmp(&b.rule_id));
        *self.published.write() = rows;
    }
}

fn materialize_order(rule: &Rule, rng: &mut SmallRng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rule.sequence.len()).collect();
    if rule.sequence_shuffle {
        order.shuffle(rng);
    }
    order
}

fn spec_instant(
    spec: &TimeSpec,
    date: NaiveDate,
    tz: Tz,
    latitude: f64,
    longitude: f64,
) -> Option<DateTime<Utc>> {
    match *spec {
        TimeSpec::Time { hour, minute } => {
            let naive = date.and_hms_opt(hour, minute, 0)?;
            tz.from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
        }
        TimeSpec::Sunrise { offset_minutes } => solar_times(date, latitude, longitude)
            .map(|t| t.sunrise + ChronoDuration::minutes(offset_minutes as i64)),
        TimeSpec::Sunset { offset_minutes } => solar_times(date, latitude, longitude)
            .map(|t| t.sunset + ChronoDuration::minutes(offset_minutes as i64)),
    }
}

fn holiday_matches(filter: &HolidayFilter, date: NaiveDate, holidays: &[Holiday]) -> bool {
    let selected = |h: &Holiday| {
        filter.selected_holiday_ids.is_empty() || filter.selected_holiday_ids.contains(&h.id)
    };

    for holiday in holidays.iter().filter(|h| selected(h)) {
        // Neighboring years cover windows that straddle New Year.
        for year in [date.year() - 1, date.year(), date.year() + 1] {
            if let Some(concrete) = holiday.date.resolve(year) {
                let lo = concrete - ChronoDuration::days(filter.days_before as i64);
                let hi = concrete + ChronoDuration::days(filter.days_after as i64);
                if date >= lo && date <= hi {
                    return true;
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::HolidayDate;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_ramp_envelope_linear_on() {
        let start = utc(2026, 1, 10, 18, 0, 0);
        let end = utc(2026, 1, 10, 19, 0, 0);
        assert_eq!(ramp_envelope(start, start, end, true, false, 60.0), 0.0);
        assert_eq!(
            ramp_envelope(start + ChronoDuration::seconds(30), start, end, true, false, 60.0),
            0.5
        );
        assert_eq!(
            ramp_envelope(start + ChronoDuration::seconds(60), start, end, true, false, 60.0),
            1.0
        );
        assert_eq!(
            ramp_envelope(start + ChronoDuration::seconds(600), start, end, true, false, 60.0),
            1.0
        );
    }

    #[test]
    fn test_ramp_envelope_off_tail() {
        let start = utc(2026, 1, 10, 18, 0, 0);
        let end = utc(2026, 1, 10, 19, 0, 0);
        assert_eq!(ramp_envelope(end, start, end, false, true, 120.0), 0.0);
        assert_eq!(
            ramp_envelope(end - ChronoDuration::seconds(60), start, end, false, true, 120.0),
            0.5
        );
        assert_eq!(
            ramp_envelope(start + ChronoDuration::seconds(300), start, end, false, true, 120.0),
            1.0
        );
    }

    #[test]
    fn test_holiday_matches_with_window() {
        let holidays = vec![Holiday {
            id: "thanksgiving".to_string(),
            name: "Thanksgiving".to_string(),
            date: "4TH_THURSDAY_NOVEMBER".parse().unwrap(),
        }];

        let exact = HolidayFilter {
            mode: HolidayMode::Only,
            ..Default::default()
        };
        assert!(holiday_matches(
            &exact,
            NaiveDate::from_ymd_opt(2024, 11, 28).unwrap(),
            &holidays
        ));
        assert!(!holiday_matches(
            &exact,
            NaiveDate::from_ymd_opt(2024, 11, 27).unwrap(),
            &holidays
        ));

        let widened = HolidayFilter {
            mode: HolidayMode::Only,
            days_before: 2,
            days_after: 1,
            ..Default::default()
        };
        assert!(holiday_matches(
            &widened,
            NaiveDate::from_ymd_opt(2024, 11, 26).unwrap(),
            &holidays
        ));
        assert!(holiday_matches(
            &widened,
            NaiveDate::from_ymd_opt(2024, 11, 29).unwrap(),
            &holidays
        ));
        assert!(!holiday_matches(
            &widened,
            NaiveDate::from_ymd_opt(2024, 11, 30).unwrap(),
            &holidays
        ));
    }

    #[test]
    fn test_selected_ids_constrain_matching() {
        let holidays = vec![
            Holiday {
                id: "christmas".to_string(),
                name: "Christmas".to_string(),
                date: HolidayDate::Fixed { month: 12, day: 25 },
            },
            Holiday {
                id: "nye".to_string(),
                name: "New Year's Eve".to_string(),
                date: HolidayDate::Fixed { month: 12, day: 31 },
            },
        ];

        let only_nye = HolidayFilter {
            mode: HolidayMode::Only,
            selected_holiday_ids: vec!["nye".to_string()],
            ..Default::default()
        };
        assert!(!holiday_matches(
            &only_nye,
            NaiveDate::from_ymd_opt(2025, 12, 25).unwrap(),
            &holidays
        ));
        assert!(holiday_matches(
            &only_nye,
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            &holidays
        ));
    }

    #[test]
    fn test_spec_instant_time_and_zone() {
        let date = NaiveDate::from_ymd_opt(2026, 7, 4).unwrap();
        let spec = TimeSpec::Time {
            hour: 18,
            minute: 0,
        };
        let instant = spec_instant(&spec, date, chrono_tz::America::New_York, 40.7, -74.0).unwrap();
        // 18:00 EDT == 22:00 UTC
        assert_eq!(instant, utc(2026, 7, 4, 22, 0, 0));
    }

    #[test]
    fn test_spec_instant_sunset_offset() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let base = spec_instant(
            &TimeSpec::Sunset { offset_minutes: 0 },
            date,
            chrono_tz::Europe::London,
            51.5074,
            -0.1278,
        )
        .unwrap();
        let shifted = spec_instant(
            &TimeSpec::Sunset {
                offset_minutes: -30,
            },
            date,
            chrono_tz::Europe::London,
            51.5074,
            -0.1278,
        )
        .unwrap();
        assert_eq!(base - shifted, ChronoDuration::minutes(30));
    }
}
