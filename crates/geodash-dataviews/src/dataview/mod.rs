//! Dataview strategies.
//!
//! A [`Dataview`] knows how to turn a base query into the SQL for one widget
//! and how to shape the rows that SQL returns. A [`DataviewStrategy`] binds a
//! dataview to its base query and runs it, issuing exactly one statement per
//! call.

mod aggregates;
mod aggregation;
mod factory;
mod formula;
mod histogram;
mod strategy;

pub use aggregates::{Aggregates, FEATURE_COUNT_COLUMN, Operation};
pub use aggregation::Aggregation;
pub use factory::{DataviewFactory, OverviewsDataviewFactory, PlainDataviewFactory, get_factory};
pub use formula::Formula;
pub use histogram::Histogram;
pub use strategy::{DataviewOutput, DataviewStrategy, OverviewsDataview, PlainDataview};

use serde_json::Value;
use std::fmt;

use geodash_core::{DataviewDefinition, DataviewError, DataviewType, Result};

use crate::db::Row;
use crate::params::OverrideParams;
use crate::settings::DataviewSettings;

/// SQL generation and result shaping for one dataview kind.
pub trait Dataview: fmt::Debug + Send + Sync {
    fn kind(&self) -> DataviewType;

    /// Compile the dataview over `query`, validating the overrides first.
    fn sql(&self, query: &str, aggregates: Aggregates, overrides: &OverrideParams) -> Result<String>;

    fn format(&self, rows: &[Row], overrides: &OverrideParams) -> Result<Value>;

    fn search_sql(&self, _query: &str, _text: &str) -> Result<String> {
        Err(search_unsupported(self.kind()))
    }

    fn format_search(&self, _rows: &[Row]) -> Result<Value> {
        Err(search_unsupported(self.kind()))
    }
}

fn search_unsupported(kind: DataviewType) -> DataviewError {
    DataviewError::invalid_option(format!("Dataview of type '{kind}' does not support search"))
}

/// Build the dataview for a definition. The type set is closed, so every
/// definition that parsed has a dataview.
pub fn build(definition: &DataviewDefinition, settings: &DataviewSettings) -> Result<Box<dyn Dataview>> {
    let options = &definition.options;
    let dataview: Box<dyn Dataview> = match definition.kind {
        DataviewType::Histogram => Box::new(Histogram::new(options, settings.max_bins)?),
        DataviewType::Aggregation | DataviewType::Category => Box::new(Aggregation::new(
            definition.kind,
            options,
            settings.default_categories,
            settings.search_limit,
        )?),
        DataviewType::Formula => Box::new(Formula::new(options)?),
    };
    Ok(dataview)
}
