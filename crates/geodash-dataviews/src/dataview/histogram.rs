use serde_json::{Value, json};

use geodash_core::{ColumnType, DataviewError, DataviewOptions, DataviewType, Result};

use super::{Aggregates, Dataview};
use crate::db::{Row, number, row_f64, row_number};
use crate::filter::{sql_number, validate_identifier};
use crate::params::OverrideParams;
use crate::settings::DEFAULT_BINS;

/// Date bucket sizes, in `date_trunc` spelling.
const DATE_AGGREGATIONS: [&str; 7] = ["minute", "hour", "day", "week", "month", "quarter", "year"];
const DEFAULT_DATE_AGGREGATION: &str = "day";

/// Histogram over a numeric or date column.
#[derive(Debug, Clone)]
pub struct Histogram {
    column: String,
    column_type: ColumnType,
    bins: Option<u32>,
    aggregation: Option<String>,
    max_bins: u32,
}

impl Histogram {
    pub fn new(options: &DataviewOptions, max_bins: u32) -> Result<Self> {
        let column = options
            .column
            .as_deref()
            .ok_or_else(|| DataviewError::invalid_option("Histogram expects `column` in options"))?;
        Ok(Self {
            column: validate_identifier(column)?.to_string(),
            column_type: options.column_type.unwrap_or_default(),
            bins: options.bins,
            aggregation: options.aggregation.clone(),
            max_bins,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Bins requested, validated against `max_bins`.
    pub fn bins(&self, overrides: &OverrideParams) -> Result<u32> {
        let requested = overrides
            .bins
            .unwrap_or_else(|| f64::from(self.bins.unwrap_or(DEFAULT_BINS)));
        if requested.fract() != 0.0 || requested < 1.0 || requested > f64::from(self.max_bins) {
            return Err(DataviewError::invalid_option(format!(
                "Invalid number of bins '{requested}', expected an integer between 1 and {}",
                self.max_bins
            )));
        }
        Ok(requested as u32)
    }

    /// Date bucket size: override, then definition, then `day`.
    pub fn date_aggregation<'a>(&'a self, overrides: &'a OverrideParams) -> Result<&'a str> {
        let aggregation = overrides
            .aggregation
            .as_deref()
            .or(self.aggregation.as_deref())
            .unwrap_or(DEFAULT_DATE_AGGREGATION);
        if !DATE_AGGREGATIONS.contains(&aggregation) {
            return Err(DataviewError::invalid_option(format!(
                "Invalid aggregation value '{aggregation}', valid ones are: {}",
                DATE_AGGREGATIONS.join(", ")
            )));
        }
        Ok(aggregation)
    }

    fn check_range(overrides: &OverrideParams) -> Result<()> {
        match (overrides.start, overrides.end) {
            (Some(start), Some(end)) if start > end => Err(DataviewError::invalid_option(
                "Invalid range: start must be lower or equal than end",
            )),
            _ => Ok(()),
        }
    }

    fn offset(overrides: &OverrideParams) -> i64 {
        overrides.offset.map_or(0, |offset| offset.round() as i64)
    }

    fn numeric_sql(&self, query: &str, aggregates: Aggregates, overrides: &OverrideParams) -> Result<String> {
        let bins = self.bins(overrides)?;
        let c = &self.column;

        let mut range = String::new();
        if let Some(start) = overrides.start {
            range.push_str(&format!(" AND {c} >= {}", sql_number(start)));
        }
        if let Some(end) = overrides.end {
            range.push_str(&format!(" AND {c} <= {}", sql_number(end)));
        }
        let min_val = overrides
            .start
            .map_or_else(|| format!("min({c})"), sql_number);
        let max_val = overrides
            .end
            .map_or_else(|| format!("max({c})"), sql_number);
        let avg = aggregates.avg(c);
        let nulls = aggregates.nulls(c);
        let count = aggregates.count();

        Ok(format!(
            "WITH
__cdb_filtered_source AS (
  SELECT * FROM ({query}) __cdb_filtered_source_query
  WHERE {c} IS NOT NULL{range}
),
__cdb_basics AS (
  SELECT
    {min_val} AS __cdb_min_val,
    {max_val} AS __cdb_max_val,
    {avg} AS __cdb_avg_val
  FROM __cdb_filtered_source
),
__cdb_nulls AS (
  SELECT {nulls} AS __cdb_nulls_count
  FROM ({query}) __cdb_histogram_nulls
)
SELECT
  (__cdb_max_val - __cdb_min_val) / cast({bins} AS float) AS bin_width,
  {bins} AS bins_number,
  __cdb_min_val AS bins_start,
  __cdb_nulls_count AS nulls_count,
  __cdb_avg_val AS avg_val,
  CASE WHEN __cdb_min_val = __cdb_max_val
    THEN 0
    ELSE GREATEST(1, LEAST({bins}, WIDTH_BUCKET({c}, __cdb_min_val, __cdb_max_val, {bins}))) - 1
  END AS bin,
  min({c})::numeric AS min,
  max({c})::numeric AS max,
  ({avg})::numeric AS avg,
  {count} AS freq
FROM __cdb_filtered_source, __cdb_basics, __cdb_nulls
GROUP BY bin, bins_number, bin_width, bins_start, nulls_count, avg_val
ORDER BY bin"
        ))
    }

    fn date_sql(&self, query: &str, aggregates: Aggregates, overrides: &OverrideParams) -> Result<String> {
        let aggregation = self.date_aggregation(overrides)?;
        let offset = Self::offset(overrides);
        let c = &self.column;

        let mut range = String::new();
        if let Some(start) = overrides.start {
            range.push_str(&format!(" AND {c} >= to_timestamp({})", sql_number(start)));
        }
        if let Some(end) = overrides.end {
            range.push_str(&format!(" AND {c} <= to_timestamp({})", sql_number(end)));
        }
        let start_bucket = overrides.start.map_or_else(
            || "min(__cdb_bucket)".to_string(),
            |start| {
                format!(
                    "date_trunc('{aggregation}', to_timestamp({}) + interval '{offset} second')",
                    sql_number(start)
                )
            },
        );
        let bin = bin_expression(aggregation);
        let epoch = format!("date_part('epoch', {c})");
        let avg = aggregates.avg(&epoch);
        let nulls = aggregates.nulls(c);
        let count = aggregates.count();

        Ok(format!(
            "WITH
__cdb_filtered_source AS (
  SELECT * FROM ({query}) __cdb_filtered_source_query
  WHERE {c} IS NOT NULL{range}
),
__cdb_bucketed AS (
  SELECT *, date_trunc('{aggregation}', {c} + interval '{offset} second') AS __cdb_bucket
  FROM __cdb_filtered_source
),
__cdb_basics AS (
  SELECT {start_bucket} AS __cdb_start_bucket
  FROM __cdb_bucketed
),
__cdb_nulls AS (
  SELECT {nulls} AS __cdb_nulls_count
  FROM ({query}) __cdb_histogram_nulls
)
SELECT
  {bin} AS bin,
  date_part('epoch', __cdb_bucket) - {offset} AS timestamp,
  date_part('epoch', __cdb_start_bucket) - {offset} AS timestamp_start,
  __cdb_nulls_count AS nulls_count,
  min({epoch})::numeric AS min,
  max({epoch})::numeric AS max,
  ({avg})::numeric AS avg,
  {count} AS freq
FROM __cdb_bucketed, __cdb_basics, __cdb_nulls
GROUP BY __cdb_bucket, __cdb_start_bucket, __cdb_nulls_count
ORDER BY __cdb_bucket"
        ))
    }

    fn format_numeric(&self, rows: &[Row], overrides: &OverrideParams) -> Result<Value> {
        let bins_count = self.bins(overrides)?;
        let Some(first) = rows.first() else {
            return Ok(json!({
                "type": DataviewType::Histogram.as_str(),
                "bin_width": 0,
                "bins_count": bins_count,
                "bins_start": overrides.start.map_or(Value::Null, number),
                "nulls": 0,
                "avg": Value::Null,
                "bins": [],
            }));
        };

        let bin_width = row_f64(first, "bin_width").unwrap_or(0.0);
        let bins_start = row_f64(first, "bins_start").unwrap_or(0.0);
        let bins = rows
            .iter()
            .map(|row| {
                let bin = row_f64(row, "bin").unwrap_or(0.0);
                let start = bins_start + bin * bin_width;
                json!({
                    "bin": number(bin),
                    "start": number(start),
                    "end": number(start + bin_width),
                    "min": row_number(row, "min"),
                    "max": row_number(row, "max"),
                    "avg": row_number(row, "avg"),
                    "freq": row_number(row, "freq"),
                })
            })
            .collect::<Vec<_>>();

        Ok(json!({
            "type": DataviewType::Histogram.as_str(),
            "bin_width": number(bin_width),
            "bins_count": bins_count,
            "bins_start": number(bins_start),
            "nulls": row_number(first, "nulls_count"),
            "avg": row_number(first, "avg_val"),
            "bins": bins,
        }))
    }

    fn format_date(&self, rows: &[Row], overrides: &OverrideParams) -> Result<Value> {
        let aggregation = self.date_aggregation(overrides)?;
        let offset = Self::offset(overrides);

        let bins = rows
            .iter()
            .map(|row| {
                json!({
                    "bin": row_number(row, "bin"),
                    "timestamp": row_number(row, "timestamp"),
                    "min": row_number(row, "min"),
                    "max": row_number(row, "max"),
                    "avg": row_number(row, "avg"),
                    "freq": row_number(row, "freq"),
                })
            })
            .collect::<Vec<_>>();
        let bins_count = rows
            .last()
            .and_then(|row| row_f64(row, "bin"))
            .map_or(0.0, |bin| bin + 1.0);

        Ok(json!({
            "type": DataviewType::Histogram.as_str(),
            "aggregation": aggregation,
            "offset": offset,
            "timestamp_start": rows.first().map_or(Value::Null, |row| row_number(row, "timestamp_start")),
            "bins_count": number(bins_count),
            "nulls": rows.first().map_or(json!(0), |row| row_number(row, "nulls_count")),
            "bins": bins,
        }))
    }
}

/// Bucket index relative to the first bucket.
fn bin_expression(aggregation: &str) -> String {
    let seconds = match aggregation {
        "minute" => Some(60),
        "hour" => Some(3_600),
        "day" => Some(86_400),
        "week" => Some(604_800),
        _ => None,
    };
    if let Some(seconds) = seconds {
        return format!(
            "floor((date_part('epoch', __cdb_bucket) - date_part('epoch', __cdb_start_bucket)) / {seconds})::int"
        );
    }

    let years = "(date_part('year', __cdb_bucket) - date_part('year', __cdb_start_bucket))";
    match aggregation {
        "month" => format!(
            "({years} * 12 + date_part('month', __cdb_bucket) - date_part('month', __cdb_start_bucket))::int"
        ),
        "quarter" => format!(
            "({years} * 4 + date_part('quarter', __cdb_bucket) - date_part('quarter', __cdb_start_bucket))::int"
        ),
        _ => format!("{years}::int"),
    }
}

impl Dataview for Histogram {
    fn kind(&self) -> DataviewType {
        DataviewType::Histogram
    }

    fn sql(&self, query: &str, aggregates: Aggregates, overrides: &OverrideParams) -> Result<String> {
        Self::check_range(overrides)?;
        match self.column_type {
            ColumnType::Number => self.numeric_sql(query, aggregates, overrides),
            ColumnType::Date => self.date_sql(query, aggregates, overrides),
        }
    }

    fn format(&self, rows: &[Row], overrides: &OverrideParams) -> Result<Value> {
        match self.column_type {
            ColumnType::Number => self.format_numeric(rows, overrides),
            ColumnType::Date => self.format_date(rows, overrides),
        }
    }
}
