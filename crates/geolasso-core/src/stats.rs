//! Aggregate statistics over one attribute of the selection.

use crate::feature::{AttrValue, format_number};
use crate::selection::SelectionSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Aggregate operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatOp {
    Sum,
    Average,
    Mode,
    Min,
    Max,
}

impl StatOp {
    pub const ALL: [StatOp; 5] = [StatOp::Sum, StatOp::Average, StatOp::Mode, StatOp::Min, StatOp::Max];

    /// Whether the operation needs numeric values.
    pub fn is_numeric(self) -> bool {
        !matches!(self, StatOp::Mode)
    }

    pub fn name(self) -> &'static str {
        match self {
            StatOp::Sum => "sum",
            StatOp::Average => "average",
            StatOp::Mode => "mode",
            StatOp::Min => "min",
            StatOp::Max => "max",
        }
    }
}

impl fmt::Display for StatOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown statistic '{0}' (expected sum, average, mode, min or max)")]
pub struct ParseStatOpError(String);

impl FromStr for StatOp {
    type Err = ParseStatOpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(StatOp::Sum),
            "average" | "avg" | "mean" => Ok(StatOp::Average),
            "mode" => Ok(StatOp::Mode),
            "min" => Ok(StatOp::Min),
            "max" => Ok(StatOp::Max),
            _ => Err(ParseStatOpError(s.to_string())),
        }
    }
}

/// Outcome of an aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StatValue {
    Number(f64),
    /// Single most frequent non-numeric value.
    Text(String),
    /// Several values share the highest frequency.
    Tie(Vec<String>),
    /// The selection is empty.
    NoSelection,
    /// The field holds no numeric value for a numeric operation.
    NotApplicable,
    /// Every value of the field was null or missing.
    NoValues,
}

impl StatValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            StatValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Number(n) => f.write_str(&format_number(*n)),
            StatValue::Text(s) => f.write_str(s),
            StatValue::Tie(values) => f.write_str(&values.join(", ")),
            StatValue::NoSelection => f.write_str("no features selected"),
            StatValue::NotApplicable => f.write_str("not applicable"),
            StatValue::NoValues => f.write_str("no values"),
        }
    }
}

/// Result of [`compute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatResult {
    pub operation: StatOp,
    pub field: String,
    pub value: StatValue,
    /// Number of values that entered the aggregate.
    pub sample_count: usize,
}

impl fmt::Display for StatResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) = {}", self.operation, self.field, self.value)
    }
}

/// Aggregate `field` over every selected feature.
pub fn compute(selection: &SelectionSet, field: &str, op: StatOp) -> StatResult {
    let result = |value, sample_count| StatResult {
        operation: op,
        field: field.to_string(),
        value,
        sample_count,
    };

    if selection.is_empty() {
        return result(StatValue::NoSelection, 0);
    }

    let values: Vec<&AttrValue> = selection
        .iter()
        .filter_map(|feature| feature.attribute(field))
        .filter(|value| !value.is_null())
        .collect();

    let aggregate: fn(&[f64]) -> f64 = match op {
        StatOp::Mode => {
            return match mode(&values) {
                Some(value) => result(value, values.len()),
                None => result(StatValue::NoValues, 0),
            };
        }
        StatOp::Sum => |n| n.iter().sum(),
        StatOp::Average => |n| n.iter().sum::<f64>() / n.len() as f64,
        StatOp::Min => |n| n.iter().copied().fold(f64::INFINITY, f64::min),
        StatOp::Max => |n| n.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    };

    let numbers: Vec<f64> = values.iter().filter_map(|value| value.as_number()).collect();
    if numbers.is_empty() {
        return result(StatValue::NotApplicable, 0);
    }
    let value = aggregate(&numbers);
    result(StatValue::Number(value), numbers.len())
}

fn mode(values: &[&AttrValue]) -> Option<StatValue> {
    // Rendered value -> (count, numeric reading). Numbers group by value, so 2 and "2.0" agree.
    let mut counts: BTreeMap<String, (usize, Option<f64>)> = BTreeMap::new();
    for value in values {
        let number = value.as_number();
        let key = number.map(format_number).unwrap_or_else(|| value.to_string());
        counts.entry(key).or_insert((0, number)).0 += 1;
    }

    let best = counts.values().map(|(count, _)| *count).max()?;
    let mut tied: Vec<(String, Option<f64>)> = counts
        .into_iter()
        .filter(|(_, (count, _))| *count == best)
        .map(|(key, (_, number))| (key, number))
        .collect();

    if tied.len() == 1 {
        let (key, number) = tied.remove(0);
        return Some(match number {
            Some(n) => StatValue::Number(n),
            None => StatValue::Text(key),
        });
    }

    if tied.iter().all(|(_, number)| number.is_some()) {
        tied.sort_by(|a, b| a.1.unwrap_or_default().total_cmp(&b.1.unwrap_or_default()));
    }
    Some(StatValue::Tie(tied.into_iter().map(|(key, _)| key).collect()))
}

/// The statistic currently shown to the user, kept in step with the selection.
#[derive(Debug, Clone, Default)]
pub struct LiveStats {
    choice: Option<(String, StatOp)>,
    result: Option<StatResult>,
}

impl LiveStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose the field and operation, recomputing immediately.
    pub fn set_choice(&mut self, field: impl Into<String>, op: StatOp, selection: &SelectionSet) {
        self.choice = Some((field.into(), op));
        self.refresh(selection);
    }

    pub fn clear_choice(&mut self) {
        self.choice = None;
        self.result = None;
    }

    pub fn choice(&self) -> Option<(&str, StatOp)> {
        self.choice.as_ref().map(|(field, op)| (field.as_str(), *op))
    }

    /// Full recompute from the current selection.
    pub fn refresh(&mut self, selection: &SelectionSet) {
        self.result = self.choice.as_ref().map(|(field, op)| compute(selection, field, *op));
    }

    pub fn result(&self) -> Option<&StatResult> {
        self.result.as_ref()
    }
}
