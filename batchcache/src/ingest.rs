//! Parsing of text ingestion lines.
//!
//! Lines follow the telnet-style put format:
//!
//! ```text
//! put <metric> <timestamp> <value> [<tagk>=<tagv> ...]
//! ```
//!
//! The leading `put` is optional. The value is kept as literal text so the
//! cache decides between integer and float.

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::model::SeriesKey;

/// One parsed put line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutLine {
    pub metric: String,
    pub timestamp: i64,
    pub value: String,
    pub tags: Vec<(String, String)>,
}

impl PutLine {
    /// Parses a single line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when a field is missing, the timestamp
    /// is not an integer, or a tag is not of the form `name=value`.
    pub fn parse(line: &str) -> Result<Self> {
        let mut fields = line.split_whitespace().peekable();
        if fields.peek() == Some(&"put") {
            fields.next();
        }

        let metric = fields
            .next()
            .ok_or_else(|| Error::InvalidInput(format!("missing metric in '{}'", line)))?;
        let timestamp = fields
            .next()
            .ok_or_else(|| Error::InvalidInput(format!("missing timestamp in '{}'", line)))?;
        let timestamp = timestamp.parse::<i64>().map_err(|_| {
            Error::InvalidInput(format!("invalid timestamp '{}' in '{}'", timestamp, line))
        })?;
        let value = fields
            .next()
            .ok_or_else(|| Error::InvalidInput(format!("missing value in '{}'", line)))?;

        let tags = fields
            .map(|tag| {
                tag.split_once('=')
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .ok_or_else(|| {
                        Error::InvalidInput(format!("invalid tag '{}' in '{}'", tag, line))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            metric: metric.to_string(),
            timestamp,
            value: value.to_string(),
            tags,
        })
    }

    /// Canonical series key for this line.
    pub fn series_key(&self) -> Result<SeriesKey> {
        SeriesKey::new(self.metric.as_str(), self.tags.iter().cloned())
    }
}

impl FromStr for PutLine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PutLine::parse(s)
    }
}

/// Returns true for lines the ingester skips: blank lines and `#` comments.
pub fn is_ignorable(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}
