use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

/// Sunrise and sunset instants for one date at one location.
#[derive(Clone, Copy, Debug)]
pub struct SolarTimes {
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
}

/// NOAA solar calculation, minute precision.
///
/// `latitude` north-positive, `longitude` east-positive, both in
/// degrees. Returns `None` during polar day/night when the sun never
/// crosses the horizon.
pub fn solar_times(date: NaiveDate, latitude: f64, longitude: f64) -> Option<SolarTimes> {
    // Official sunrise/sunset zenith: 90° 50', accounting for refraction
    // and the solar disc radius.
    const ZENITH_DEG: f64 = 90.833;

    let day_of_year = date.ordinal() as f64;
    let days_in_year = if date.leap_year() { 366.0 } else { 365.0 };

    // Fractional year at solar noon, radians.
    let gamma = std::f64::consts::TAU / days_in_year * (day_of_year - 1.0 + 0.5);

    // Equation of time in minutes.
    let eqtime = 229.18
        * (0.000075 + 0.001868 * gamma.cos()
            - 0.032077 * gamma.sin()
            - 0.014615 * (2.0 * gamma).cos()
            - 0.040849 * (2.0 * gamma).sin());

    // Solar declination in radians.
    let decl = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
        - 0.006758 * (2.0 * gamma).cos()
        + 0.000907 * (2.0 * gamma).sin()
        - 0.002697 * (3.0 * gamma).cos()
        + 0.00148 * (3.0 * gamma).sin();

    let lat = latitude.to_radians();
    let cos_ha = (ZENITH_DEG.to_radians().cos() - lat.sin() * decl.sin()) / (lat.cos() * decl.cos());
    if !(-1.0..=1.0).contains(&cos_ha) {
        // Midnight sun or polar night.
        return None;
    }
    let ha_deg = cos_ha.acos().to_degrees();

    let sunrise_minutes = 720.0 - 4.0 * (longitude + ha_deg) - eqtime;
    let sunset_minutes = 720.0 - 4.0 * (longitude - ha_deg) - eqtime;

    let midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
    Some(SolarTimes {
        sunrise: midnight + Duration::seconds((sunrise_minutes * 60.0).round() as i64),
        sunset: midnight + Duration::seconds((sunset_minutes * 60.0).round() as i64),
    })
}
