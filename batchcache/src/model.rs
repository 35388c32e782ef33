//! Data model: series keys, values and buffered data points.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Canonical identifier of a series: a metric name plus its tag set.
///
/// Tags are held in a sorted map, so two tag sets with the same pairs always
/// produce equal keys regardless of the order they were supplied in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    metric: String,
    tags: BTreeMap<String, String>,
}

impl SeriesKey {
    /// Builds a key from a metric name and any iterable of tag pairs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSeries`] if the metric name, a tag name or a
    /// tag value is empty, or if a tag name is given twice with different
    /// values.
    pub fn new<I, K, V>(metric: impl Into<String>, tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let metric = metric.into();
        if metric.is_empty() {
            return Err(Error::InvalidSeries("metric name is empty".into()));
        }

        let mut sorted = BTreeMap::new();
        for (name, value) in tags {
            let (name, value) = (name.into(), value.into());
            if name.is_empty() {
                return Err(Error::InvalidSeries(format!("empty tag name on {}", metric)));
            }
            if value.is_empty() {
                return Err(Error::InvalidSeries(format!(
                    "empty value for tag '{}' on {}",
                    name, metric
                )));
            }
            if let Some(previous) = sorted.get(&name) {
                if previous != &value {
                    return Err(Error::InvalidSeries(format!(
                        "tag '{}' given twice with values '{}' and '{}'",
                        name, previous, value
                    )));
                }
                continue;
            }
            sorted.insert(name, value);
        }

        Ok(Self {
            metric,
            tags: sorted,
        })
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.metric)?;
        if self.tags.is_empty() {
            return Ok(());
        }
        f.write_str("{")?;
        for (i, (name, value)) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        f.write_str("}")
    }
}

/// A sample value, typed at ingestion from its literal text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
}

impl Value {
    /// Parses literal value text.
    ///
    /// Text without `.`, `e` or `E` is integer-looking and must fit in an
    /// `i64`. Anything else must be a finite floating-point number.
    pub fn parse(literal: &str) -> Result<Self> {
        let malformed = || Error::MalformedValue(literal.to_string());
        if literal.is_empty() {
            return Err(malformed());
        }

        if looks_like_integer(literal) {
            return literal
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| malformed());
        }

        match literal.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Value::Float(v)),
            _ => Err(malformed()),
        }
    }
}

impl FromStr for Value {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Value::parse(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
        }
    }
}

fn looks_like_integer(literal: &str) -> bool {
    !literal.contains(['.', 'e', 'E'])
}

/// A single sample. The timestamp is kept exactly as the caller supplied it,
/// in seconds or milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataPoint {
    pub timestamp: i64,
    pub value: Value,
}

impl DataPoint {
    pub fn new(timestamp: i64, value: impl Into<Value>) -> Self {
        Self {
            timestamp,
            value: value.into(),
        }
    }
}

/// Snapshot of the data points buffered for one series window.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoints {
    key: SeriesKey,
    window_start: i64,
    points: Vec<DataPoint>,
}

impl DataPoints {
    pub(crate) fn new(key: SeriesKey, window_start: i64) -> Self {
        Self {
            key,
            window_start,
            points: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, point: DataPoint) {
        self.points.push(point);
    }

    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    /// Start of the window these points belong to, in seconds.
    pub fn window_start(&self) -> i64 {
        self.window_start
    }

    /// Points in arrival order.
    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataPoint> {
        self.points.iter()
    }
}
