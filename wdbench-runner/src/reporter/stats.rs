// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::{DecodeError, DecodeErrorKind, StatFieldError};
use camino::Utf8Path;
use indexmap::IndexMap;
use serde_json::Value;
use std::{borrow::Cow, sync::Arc, time::Duration};

/// Which of the two records in a result artifact a value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatsSide {
    /// The first line: statistics about the analysis input.
    Input,

    /// The second line: statistics about the analysis output.
    Output,
}

/// A mapping of statistic names to scalar values, in the order the analyzer wrote them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderedStats {
    values: IndexMap<String, Value>,
}

impl OrderedStats {
    /// Parses a single line of the result artifact.
    pub fn parse_line(side: StatsSide, line: &str) -> Result<Self, DecodeErrorKind> {
        let values: IndexMap<String, Value> =
            serde_json::from_str(line).map_err(|error| DecodeErrorKind::Malformed {
                side,
                error: Arc::new(error),
            })?;
        if let Some((key, _)) = values
            .iter()
            .find(|(_, value)| matches!(value, Value::Array(_) | Value::Object(_)))
        {
            return Err(DecodeErrorKind::NonScalar {
                side,
                key: key.clone(),
            });
        }
        Ok(Self { values })
    }

    /// Returns the number of statistics.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no statistics.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over the keys in insertion order.
    pub fn keys(&self) -> impl ExactSizeIterator<Item = &str> {
        self.values.keys().map(|key| key.as_str())
    }

    /// Iterates over key-value pairs in insertion order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &Value)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Returns the raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the value for `key` formatted for a report cell.
    ///
    /// Strings are shown without quotes.
    pub fn display_value(&self, key: &str) -> Option<Cow<'_, str>> {
        self.values.get(key).map(display_scalar)
    }

    /// Returns the value for `key` as a count.
    ///
    /// Both JSON integers and strings containing an integer are accepted, since the analyzer writes
    /// every value as a string.
    pub fn get_u64(&self, side: StatsSide, key: &'static str) -> Result<u64, StatFieldError> {
        let value = self
            .values
            .get(key)
            .ok_or(StatFieldError::Missing { side, key })?;
        let parsed = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| StatFieldError::NotNumeric {
            side,
            key,
            value: display_scalar(value).into_owned(),
        })
    }
}

pub(crate) fn display_scalar(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

/// Statistics decoded from one case's result artifact.
#[derive(Clone, Debug, PartialEq)]
pub struct StatsRecord {
    input: OrderedStats,
    output: OrderedStats,
    elapsed: Duration,
}

impl StatsRecord {
    /// Creates a new record from already-decoded halves.
    pub fn new(input: OrderedStats, output: OrderedStats, elapsed: Duration) -> Self {
        Self {
            input,
            output,
            elapsed,
        }
    }

    /// Decodes the result artifact at `path`.
    ///
    /// The artifact must contain exactly two non-empty lines, each a JSON object of scalars. If
    /// the input line decodes but the output line doesn't, the returned error carries the input
    /// statistics.
    pub fn decode(path: &Utf8Path, elapsed: Duration) -> Result<Self, DecodeError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|error| DecodeError::new(path, DecodeErrorKind::Read(Arc::new(error))))?;
        Self::decode_str(path, &contents, elapsed)
    }

    pub(crate) fn decode_str(
        path: &Utf8Path,
        contents: &str,
        elapsed: Duration,
    ) -> Result<Self, DecodeError> {
        let lines: Vec<&str> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        // A missing output line still leaves the input line usable for display.
        let input = match lines.first() {
            Some(line) => OrderedStats::parse_line(StatsSide::Input, line)
                .map_err(|kind| DecodeError::new(path, kind))?,
            None => {
                return Err(DecodeError::new(
                    path,
                    DecodeErrorKind::LineCount { actual: 0 },
                ));
            }
        };
        if lines.len() != 2 {
            return Err(DecodeError::new(
                path,
                DecodeErrorKind::LineCount {
                    actual: lines.len(),
                },
            )
            .with_partial_input(input));
        }
        let output = match OrderedStats::parse_line(StatsSide::Output, lines[1]) {
            Ok(output) => output,
            Err(kind) => return Err(DecodeError::new(path, kind).with_partial_input(input)),
        };

        Ok(Self::new(input, output, elapsed))
    }

    /// Returns the input-side statistics.
    pub fn input(&self) -> &OrderedStats {
        &self.input
    }

    /// Returns the output-side statistics.
    pub fn output(&self) -> &OrderedStats {
        &self.output
    }

    /// Returns the wall-clock duration of the analysis stage.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub(crate) fn into_parts(self) -> (OrderedStats, OrderedStats) {
        (self.input, self.output)
    }
}
