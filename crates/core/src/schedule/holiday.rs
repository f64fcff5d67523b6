use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A named holiday with a date pattern that materializes per year.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Holiday {
    pub id: String,
    pub name: String,
    pub date: HolidayDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Nth {
    First,
    Second,
    Third,
    Fourth,
    Fifth,
    Last,
}

impl Nth {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "1ST" => Some(Nth::First),
            "2ND" => Some(Nth::Second),
            "3RD" => Some(Nth::Third),
            "4TH" => Some(Nth::Fourth),
            "5TH" => Some(Nth::Fifth),
            "LAST" => Some(Nth::Last),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Nth::First => "1ST",
            Nth::Second => "2ND",
            Nth::Third => "3RD",
            Nth::Fourth => "4TH",
            Nth::Fifth => "5TH",
            Nth::Last => "LAST",
        }
    }
}

/// Holiday date forms: fixed `MM-DD`, absolute `YYYY-MM-DD`, or a
/// pattern like `4TH_THURSDAY_NOVEMBER`. Serialized as that string;
/// malformed input is rejected when the document is parsed, not at
/// evaluation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HolidayDate {
    Fixed { month: u32, day: u32 },
    Absolute(NaiveDate),
    Pattern { nth: Nth, weekday: Weekday, month: u32 },
}

impl HolidayDate {
    /// Concrete date for `year`, or `None` when the pattern has no
    /// occurrence that year (e.g. a fifth weekday in a four-week month,
    /// or an absolute date in another year).
    pub fn resolve(&self, year: i32) -> Option<NaiveDate> {
        match *self {
            HolidayDate::Fixed { month, day } => NaiveDate::from_ymd_opt(year, month, day),
            HolidayDate::Absolute(date) => (date.year() == year).then_some(date),
            HolidayDate::Pattern {
                nth,
                weekday,
                month,
            } => {
                let occurrences: Vec<NaiveDate> = (1..=31)
                    .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
                    .filter(|d| d.weekday() == weekday)
                    .collect();
                match nth {
                    Nth::First => occurrences.first().copied(),
                    Nth::Second => occurrences.get(1).copied(),
                    Nth::Third => occurrences.get(2).copied(),
                    Nth::Fourth => occurrences.get(3).copied(),
                    Nth::Fifth => occurrences.get(4).copied(),
                    Nth::Last => occurrences.last().copied(),
                }
            }
        }
    }
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MONDAY",
        Weekday::Tue => "TUESDAY",
        Weekday::Wed => "WEDNESDAY",
        Weekday::Thu => "THURSDAY",
        Weekday::Fri => "FRIDAY",
        Weekday::Sat => "SATURDAY",
        Weekday::Sun => "SUNDAY",
    }
}

fn parse_weekday(s: &str) -> Option<Weekday> {
    match s {
        "MONDAY" => Some(Weekday::Mon),
        "TUESDAY" => Some(Weekday::Tue),
        "WEDNESDAY" => Some(Weekday::Wed),
        "THURSDAY" => Some(Weekday::Thu),
        "FRIDAY" => Some(Weekday::Fri),
        "SATURDAY" => Some(Weekday::Sat),
        "SUNDAY" => Some(Weekday::Sun),
        _ => None,
    }
}

const MONTHS: [&str; 12] = [
    "JANUARY",
    "FEBRUARY",
    "MARCH",
    "APRIL",
    "MAY",
    "JUNE",
    "JULY",
    "AUGUST",
    "SEPTEMBER",
    "OCTOBER",
    "NOVEMBER",
    "DECEMBER",
];

fn parse_month(s: &str) -> Option<u32> {
    MONTHS.iter().position(|m| *m == s).map(|i| i as u32 + 1)
}

impl FromStr for HolidayDate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Pattern form: NTH_WEEKDAY_MONTH
        if s.contains('_') {
            let parts: Vec<&str> = s.split('_').collect();
            if parts.len() != 3 {
                return Err(format!("invalid holiday pattern '{}'", s));
            }
            let nth = Nth::parse(parts[0]).ok_or_else(|| format!("invalid ordinal '{}'", parts[0]))?;
            let weekday =
                parse_weekday(parts[1]).ok_or_else(|| format!("invalid weekday '{}'", parts[1]))?;
            let month =
                parse_month(parts[2]).ok_or_else(|| format!("invalid month '{}'", parts[2]))?;
            return Ok(HolidayDate::Pattern {
                nth,
                weekday,
                month,
            });
        }

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(HolidayDate::Absolute(date));
        }

        // Fixed form: MM-DD
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() == 2 {
            let month: u32 = parts[0].parse().map_err(|_| format!("invalid month in '{}'", s))?;
            let day: u32 = parts[1].parse().map_err(|_| format!("invalid day in '{}'", s))?;
            // Validate against a leap year so 02-29 is accepted.
            if NaiveDate::from_ymd_opt(2024, month, day).is_none() {
                return Err(format!("invalid fixed date '{}'", s));
            }
            return Ok(HolidayDate::Fixed { month, day });
        }

        Err(format!("unrecognized holiday date '{}'", s))
    }
}

impl fmt::Display for HolidayDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HolidayDate::Fixed { month, day } => write!(f, "{:02}-{:02}", month, day),
            HolidayDate::Absolute(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            HolidayDate::Pattern {
                nth,
                weekday,
                month,
            } => write!(
                f,
                "{}_{}_{}",
                nth.as_str(),
                weekday_name(weekday),
                MONTHS[month as usize - 1]
            ),
        }
    }
}

impl Serialize for HolidayDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HolidayDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
