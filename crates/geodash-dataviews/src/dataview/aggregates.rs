use std::fmt;

use geodash_core::{DataviewError, Result};

/// Column holding the number of base features an overview row stands for.
pub const FEATURE_COUNT_COLUMN: &str = "_feature_count";

/// Aggregate functions shared by aggregation and formula dataviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Operation {
    pub const ALL: [Operation; 5] = [Self::Count, Self::Sum, Self::Avg, Self::Min, Self::Max];

    pub fn parse(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == value)
            .ok_or_else(|| {
                DataviewError::invalid_option(format!(
                    "Invalid operation '{value}', valid ones are: count, sum, avg, min, max"
                ))
            })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// Function re-aggregating per-category values into one bucket.
    pub(crate) fn rollup(self) -> &'static str {
        match self {
            Self::Count | Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate SQL over raw rows or over overview rows weighted by `_feature_count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Aggregates {
    #[default]
    Raw,
    Weighted,
}

impl Aggregates {
    pub fn count(self) -> String {
        match self {
            Self::Raw => "count(*)".to_string(),
            Self::Weighted => format!("sum({FEATURE_COUNT_COLUMN})"),
        }
    }

    pub fn sum(self, expr: &str) -> String {
        match self {
            Self::Raw => format!("sum({expr})"),
            Self::Weighted => format!("sum({expr} * {FEATURE_COUNT_COLUMN})"),
        }
    }

    pub fn avg(self, expr: &str) -> String {
        match self {
            Self::Raw => format!("avg({expr})"),
            Self::Weighted => format!(
                "sum({expr} * {FEATURE_COUNT_COLUMN})::numeric / sum({FEATURE_COUNT_COLUMN})"
            ),
        }
    }

    pub fn min(self, expr: &str) -> String {
        format!("min({expr})")
    }

    pub fn max(self, expr: &str) -> String {
        format!("max({expr})")
    }

    /// Features whose `expr` is NULL, zero when there are none.
    pub fn nulls(self, expr: &str) -> String {
        let weight = match self {
            Self::Raw => "1",
            Self::Weighted => FEATURE_COUNT_COLUMN,
        };
        format!("coalesce(sum(CASE WHEN {expr} IS NULL THEN {weight} ELSE 0 END), 0)")
    }

    pub fn apply(self, operation: Operation, expr: &str) -> String {
        match operation {
            Operation::Count => self.count(),
            Operation::Sum => self.sum(expr),
            Operation::Avg => self.avg(expr),
            Operation::Min => self.min(expr),
            Operation::Max => self.max(expr),
        }
    }
}
