//! Price period (one bar) with optional derived moving-average metrics.
//!
//! Source files carry `ma{p}` / `dev{p}` keys for each configured period.
//! Those are collected into [`MaPoint`]s keyed by period; a key that is
//! missing, `null` or the `"-"` placeholder becomes [`Metric::Absent`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Placeholder the data pipeline writes for metrics not yet computable.
pub const UNAVAILABLE: &str = "-";

/// A derived value that may be missing for a given bar.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Metric {
    Present(f64),
    #[default]
    Absent,
}

impl Metric {
    pub fn value(self) -> Option<f64> {
        match self {
            Metric::Present(v) => Some(v),
            Metric::Absent => None,
        }
    }

    fn from_json(value: &serde_json::Value) -> Result<Self, String> {
        match value {
            serde_json::Value::Null => Ok(Metric::Absent),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(Metric::Present)
                .ok_or_else(|| format!("unrepresentable number {n}")),
            serde_json::Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() || trimmed == UNAVAILABLE {
                    return Ok(Metric::Absent);
                }
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(Metric::Present)
                    .ok_or_else(|| format!("non-numeric value {s:?}"))
            }
            other => Err(format!("unexpected value {other}")),
        }
    }
}

/// Moving average and deviation for one period length at one bar.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MaPoint {
    pub ma: Metric,
    pub dev: Metric,
}

/// Bar identifier. Ordered within a kind; series loaders reject mixed or
/// non-increasing sequences.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PeriodTime {
    Unix(i64),
    Date(NaiveDate),
    Label(String),
}

impl PeriodTime {
    pub fn same_kind(&self, other: &PeriodTime) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for PeriodTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodTime::Unix(ts) => write!(f, "{ts}"),
            PeriodTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            PeriodTime::Label(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawPeriod")]
pub struct PricePeriod {
    pub time: PeriodTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub averages: BTreeMap<u32, MaPoint>,
}

impl PricePeriod {
    pub fn new(time: PeriodTime, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
            averages: BTreeMap::new(),
        }
    }

    pub fn with_average(mut self, period: u32, ma: Metric, dev: Metric) -> Self {
        self.averages.insert(period, MaPoint { ma, dev });
        self
    }

    pub fn deviation(&self, period: u32) -> Metric {
        self.averages
            .get(&period)
            .map(|p| p.dev)
            .unwrap_or(Metric::Absent)
    }

    pub fn moving_average(&self, period: u32) -> Metric {
        self.averages
            .get(&period)
            .map(|p| p.ma)
            .unwrap_or(Metric::Absent)
    }

    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }
}

#[derive(Deserialize)]
struct RawPeriod {
    time: PeriodTime,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

/// Splits `ma36` / `dev36` style keys into (is_dev, period).
fn metric_key(key: &str) -> Option<(bool, u32)> {
    let (is_dev, digits) = if let Some(rest) = key.strip_prefix("dev") {
        (true, rest)
    } else if let Some(rest) = key.strip_prefix("ma") {
        (false, rest)
    } else {
        return None;
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|p| (is_dev, p))
}

impl TryFrom<RawPeriod> for PricePeriod {
    type Error = String;

    fn try_from(raw: RawPeriod) -> Result<Self, Self::Error> {
        let volume = match raw.volume {
            None => 0,
            Some(v) if v.is_finite() && v >= 0.0 => v as u64,
            Some(v) => return Err(format!("invalid volume {v} at {}", raw.time)),
        };

        let mut averages: BTreeMap<u32, MaPoint> = BTreeMap::new();
        for (key, value) in &raw.extra {
            let Some((is_dev, period)) = metric_key(key) else {
                continue;
            };
            let metric =
                Metric::from_json(value).map_err(|e| format!("{key} at {}: {e}", raw.time))?;
            let point = averages.entry(period).or_default();
            if is_dev {
                point.dev = metric;
            } else {
                point.ma = metric;
            }
        }

        Ok(PricePeriod {
            time: raw.time,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume,
            averages,
        })
    }
}

/// Sign-prefixed, one decimal: `+5.0%`, `-31.2%`.
pub fn format_deviation(dev: f64) -> String {
    if dev >= 0.0 {
        format!("+{dev:.1}%")
    } else {
        format!("{dev:.1}%")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> PricePeriod {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_full_bar() {
        let p = parse(
            r#"{"time":"2024-01-31","open":100,"high":110,"low":95,"close":105,
                "volume":12000,"ma12":101.5,"dev12":3.4,"ma36":90,"dev36":16.7}"#,
        );
        assert_eq!(
            p.time,
            PeriodTime::Date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap())
        );
        assert_eq!(p.volume, 12000);
        assert_eq!(p.moving_average(12), Metric::Present(101.5));
        assert_eq!(p.deviation(36), Metric::Present(16.7));
        assert_eq!(p.deviation(24), Metric::Absent);
    }

    #[test]
    fn placeholder_and_null_are_absent_not_zero() {
        let p = parse(
            r#"{"time":"2024-01-31","open":1,"high":1,"low":1,"close":1,
                "ma36":"-","dev36":null,"dev24":"-"}"#,
        );
        assert_eq!(p.moving_average(36), Metric::Absent);
        assert_eq!(p.deviation(36), Metric::Absent);
        assert_eq!(p.deviation(24), Metric::Absent);
        assert_eq!(p.deviation(36).value(), None);
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let p = parse(r#"{"time":"2024-01-31","open":1,"high":1,"low":1,"close":1,"dev36":"-12.5"}"#);
        assert_eq!(p.deviation(36), Metric::Present(-12.5));
    }

    #[test]
    fn garbage_metric_is_an_error() {
        let r: Result<PricePeriod, _> = serde_json::from_str(
            r#"{"time":"2024-01-31","open":1,"high":1,"low":1,"close":1,"dev36":"n/a"}"#,
        );
        assert!(r.is_err());
    }

    #[test]
    fn missing_volume_defaults_to_zero() {
        let p = parse(r#"{"time":"2024-01-31","open":1,"high":1,"low":1,"close":1}"#);
        assert_eq!(p.volume, 0);
        assert!(p.averages.is_empty());
    }

    #[test]
    fn negative_volume_rejected() {
        let r: Result<PricePeriod, _> = serde_json::from_str(
            r#"{"time":"2024-01-31","open":1,"high":1,"low":1,"close":1,"volume":-5}"#,
        );
        assert!(r.is_err());
    }

    #[test]
    fn unix_and_label_times() {
        let p = parse(r#"{"time":1700000000,"open":1,"high":1,"low":1,"close":1}"#);
        assert_eq!(p.time, PeriodTime::Unix(1_700_000_000));
        let p = parse(r#"{"time":"2024-W05","open":1,"high":1,"low":1,"close":1}"#);
        assert_eq!(p.time, PeriodTime::Label("2024-W05".into()));
        assert_eq!(p.time.to_string(), "2024-W05");
    }

    #[test]
    fn unrelated_keys_ignored() {
        let p = parse(
            r#"{"time":"2024-01-31","open":1,"high":1,"low":1,"close":1,
                "market":"x","madness":3,"dev":1}"#,
        );
        assert!(p.averages.is_empty());
    }

    #[test]
    fn deviation_formatting() {
        assert_eq!(format_deviation(5.0), "+5.0%");
        assert_eq!(format_deviation(0.0), "+0.0%");
        assert_eq!(format_deviation(-31.24), "-31.2%");
    }
}
