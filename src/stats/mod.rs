use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::locale::DiagramStrings;
use crate::model::{lenient_strings, ObjectId};

const SPARK_BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsSource {
    Site,
    List,
    ScanGroup,
}

impl StatsSource {
    pub fn as_str(self) -> &'static str {
        match self {
            StatsSource::Site => "site",
            StatsSource::List => "list",
            StatsSource::ScanGroup => "scangroup",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presentation {
    Time,
    Sum,
}

impl Presentation {
    pub fn as_str(self) -> &'static str {
        match self {
            Presentation::Time => "time",
            Presentation::Sum => "sum",
        }
    }
}

/// Parameters of `GET /Statistics`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatisticsQuery {
    pub source: StatsSource,
    pub source_id: String,
    pub typet: String,
    pub presentation: Presentation,
}

impl StatisticsQuery {
    /// Every metric of one site over all of its scans.
    pub fn site_history(site: &ObjectId) -> Self {
        Self {
            source: StatsSource::Site,
            source_id: site.to_string(),
            typet: "all".to_string(),
            presentation: Presentation::Time,
        }
    }

    /// Third parties summed over one list, or over every scan group when no
    /// list is given.
    pub fn third_parties(list: Option<&ObjectId>) -> Self {
        let (source, source_id) = match list {
            Some(id) => (StatsSource::List, id.to_string()),
            None => (StatsSource::ScanGroup, "0".to_string()),
        };
        Self {
            source,
            source_id,
            typet: "third".to_string(),
            presentation: Presentation::Sum,
        }
    }

    pub fn params(&self) -> [(&'static str, String); 4] {
        [
            ("source", self.source.as_str().to_string()),
            ("sourceid", self.source_id.clone()),
            ("typet", self.typet.clone()),
            ("presentation", self.presentation.as_str().to_string()),
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    Cookies,
    ThirdParties,
    ThirdPartyRequests,
    Https,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Cookies,
        Metric::ThirdParties,
        Metric::ThirdPartyRequests,
        Metric::Https,
    ];

    /// Key of the metric array in the statistics payload.
    pub fn key(self) -> &'static str {
        match self {
            Metric::Cookies => "cookies_anzahl",
            Metric::ThirdParties => "third_party_anzahl",
            Metric::ThirdPartyRequests => "third_party_request_anzahl",
            Metric::Https => "https",
        }
    }

    pub fn label(self, strings: &DiagramStrings) -> String {
        let label = match self {
            Metric::Cookies => &strings.cookies_label,
            Metric::ThirdParties => &strings.third_label,
            Metric::ThirdPartyRequests => &strings.third_req_label,
            Metric::Https => &strings.https_label,
        };
        if label.is_empty() {
            self.key().to_string()
        } else {
            label.clone()
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cookies" => Ok(Metric::Cookies),
            "third" | "third-parties" => Ok(Metric::ThirdParties),
            "third-requests" | "third-req" => Ok(Metric::ThirdPartyRequests),
            "https" => Ok(Metric::Https),
            other => Err(format!(
                "unknown metric '{other}' (expected cookies, third, third-requests or https)"
            )),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Metric::Cookies => "cookies",
            Metric::ThirdParties => "third",
            Metric::ThirdPartyRequests => "third-requests",
            Metric::Https => "https",
        })
    }
}

/// `presentation=time` payload: one start time per scan plus parallel metric arrays.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimeSeries {
    #[serde(default, deserialize_with = "lenient_strings")]
    pub starttime: Vec<String>,
    #[serde(default, deserialize_with = "lenient_numbers")]
    pub cookies_anzahl: Vec<f64>,
    #[serde(default, deserialize_with = "lenient_numbers")]
    pub third_party_anzahl: Vec<f64>,
    #[serde(default, deserialize_with = "lenient_numbers")]
    pub third_party_request_anzahl: Vec<f64>,
    #[serde(default, deserialize_with = "lenient_numbers")]
    pub https: Vec<f64>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.starttime.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starttime.is_empty()
    }

    pub fn values(&self, metric: Metric) -> &[f64] {
        match metric {
            Metric::Cookies => &self.cookies_anzahl,
            Metric::ThirdParties => &self.third_party_anzahl,
            Metric::ThirdPartyRequests => &self.third_party_request_anzahl,
            Metric::Https => &self.https,
        }
    }
}

/// Inclusive index range over a time series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SeriesWindow {
    pub start: usize,
    pub end: usize,
}

impl SeriesWindow {
    /// Clamps the requested range to `len` points. A single-point window is
    /// widened: the end grows when it starts at 0, otherwise the start shrinks.
    pub fn select(len: usize, start: Option<usize>, end: Option<usize>) -> Option<Self> {
        if len == 0 {
            return None;
        }
        let last = len - 1;
        let mut start = start.unwrap_or(0).min(last);
        let mut end = end.unwrap_or(last).min(last);
        if start > end {
            std::mem::swap(&mut start, &mut end);
        }
        if start == end && last > 0 {
            if start == 0 {
                end += 1;
            } else {
                start -= 1;
            }
        }
        Some(Self { start, end })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// 1-based position within the whole series.
    pub x: usize,
    pub y: f64,
    pub starttime: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Series {
    pub label: String,
    pub metric: Metric,
    pub points: Vec<SeriesPoint>,
}

impl Series {
    pub fn build(data: &TimeSeries, metric: Metric, window: SeriesWindow, label: String) -> Self {
        let values = data.values(metric);
        let points = (window.start..=window.end)
            .map(|i| SeriesPoint {
                x: i + 1,
                y: values.get(i).copied().unwrap_or(0.0),
                starttime: data.starttime.get(i).cloned().unwrap_or_default(),
            })
            .collect();
        Self {
            label,
            metric,
            points,
        }
    }

    pub fn ys(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }
}

pub fn sparkline(values: &[f64]) -> String {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    values
        .iter()
        .map(|v| {
            if !span.is_finite() || span <= 0.0 {
                return SPARK_BARS[0];
            }
            let level = ((v - min) / span * (SPARK_BARS.len() - 1) as f64).round() as usize;
            SPARK_BARS[level.min(SPARK_BARS.len() - 1)]
        })
        .collect()
}

/// One row of a `presentation=sum` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TotalEntry {
    #[serde(deserialize_with = "crate::model::lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub value: f64,
}

/// Largest value first; equal values keep their payload order.
pub fn sort_totals(mut totals: Vec<TotalEntry>) -> Vec<TotalEntry> {
    totals.sort_by(|a, b| b.value.total_cmp(&a.value));
    totals
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value:.2}")
    }
}

fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    number_from_value(&value)
        .ok_or_else(|| de::Error::custom(format!("expected a number, got {value}")))
}

fn lenient_numbers<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|v| {
                number_from_value(v)
                    .ok_or_else(|| de::Error::custom(format!("expected a number, got {v}")))
            })
            .collect(),
        other => Err(de::Error::custom(format!("expected a list of numbers, got {other}"))),
    }
}
