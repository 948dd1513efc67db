//! # Land Use Ledger
//!
//! A library for cascading a parcel selection's manually supplied total area through
//! an ordered sequence of land-use deductions, and for locating the exact point at
//! which that area is fully consumed.
//!
//! ## Core Concepts
//!
//! - **Category**: a named deduction amount (planted area, APP overlays, legal reserve,
//!   improvements, native vegetation) applied in a fixed priority order
//! - **Ledger**: the ordered sequence of balance transitions produced for one computation
//! - **Zero-crossing**: the category during which the running balance first reaches zero;
//!   it is split into the part consumed to zero and the surplus beyond it
//! - **Aggregation**: per-category sums over the selected parcel rows, with non-numeric
//!   cells counted as zero
//!
//! ## Example
//!
//! ```rust
//! use land_use_ledger::*;
//!
//! let categories = vec![
//!     DeductionCategory::new("A", 30.0),
//!     DeductionCategory::new("B", 40.0),
//!     DeductionCategory::new("C", 50.0),
//! ];
//!
//! let ledger = build_ledger(100.0, &categories).unwrap();
//! assert_eq!(ledger.final_balance, -20.0);
//! assert_eq!(ledger.crossing.unwrap().category_name, "C");
//! ```

pub mod aggregator;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod ledger;
pub mod schema;
pub mod utils;

pub use aggregator::{aggregate, aggregate_plan, compose_categories, CellValue, ParcelRecord};
pub use error::{LandUseError, Result};
pub use export::{
    ledger_to_csv, timeline, timeline_markdown, waterfall_series, write_ledger_csv, Highlight,
    LandUseSummary, Measure, TimelineBadge, TimelineEntry, WaterfallPoint,
};
pub use ingestion::{parse_parcel_ids, parse_total_area, ParcelTable};
pub use ledger::{build_ledger, verify_ledger, LedgerBuilder};
pub use schema::*;
pub use utils::*;

use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Everything produced for one submission: the aggregated categories, the ledger and its summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandUseReport {
    pub parcel_ids: Vec<String>,
    pub categories: Vec<DeductionCategory>,
    pub ledger: LedgerResult,
    pub summary: LandUseSummary,
}

impl LandUseReport {
    pub fn to_csv(&self) -> Result<String> {
        ledger_to_csv(&self.ledger)
    }

    pub fn timeline(&self) -> Vec<TimelineEntry> {
        timeline(&self.ledger)
    }

    pub fn waterfall(&self) -> Vec<WaterfallPoint> {
        waterfall_series(&self.ledger)
    }

    pub fn to_markdown(&self) -> String {
        format!(
            "{}\n{}",
            self.summary.to_markdown(),
            timeline_markdown(&self.ledger)
        )
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct LandUseProcessor;

impl LandUseProcessor {
    pub fn process(config: &LandUseConfig, table: &ParcelTable) -> Result<LandUseReport> {
        validate_config(config)?;

        info!(
            "Processing land use for {} parcel ids over {} rows",
            config.parcel_ids.len(),
            table.row_count()
        );

        table.require_columns(&config.required_columns())?;
        let rows = table.filter_by_ids(&config.id_column, &config.parcel_ids)?;
        let categories = aggregate_plan(&rows, &config.plan)?;

        debug!(
            "Aggregated {} categories from {} matched rows",
            categories.len(),
            rows.len()
        );

        let ledger = build_ledger(config.total_area, &categories)?;
        verify_ledger(&ledger)?;

        match &ledger.crossing {
            Some(crossing) => info!(
                "Total area consumed by '{}', final balance {}",
                crossing.category_name, ledger.final_balance
            ),
            None => info!(
                "Total area not fully consumed, final balance {}",
                ledger.final_balance
            ),
        }

        let summary = LandUseSummary::new(&categories, &ledger, rows.len());

        Ok(LandUseReport {
            parcel_ids: config.parcel_ids.clone(),
            categories,
            ledger,
            summary,
        })
    }

    /// Runs a submission given as raw form text: the total area and a pasted id list.
    pub fn process_text_inputs(
        total_area_text: &str,
        parcel_ids_text: &str,
        table: &ParcelTable,
    ) -> Result<LandUseReport> {
        let total_area = parse_total_area(total_area_text)?;
        let parcel_ids = parse_parcel_ids(parcel_ids_text);

        let config = LandUseConfig::new(total_area, parcel_ids);
        Self::process(&config, table)
    }
}

pub fn process_land_use(config: &LandUseConfig, table: &ParcelTable) -> Result<LandUseReport> {
    LandUseProcessor::process(config, table)
}

pub fn validate_config(config: &LandUseConfig) -> Result<()> {
    if !config.total_area.is_finite() {
        return Err(LandUseError::InvalidTotalArea(config.total_area.to_string()));
    }

    if config.parcel_ids.iter().all(|id| id.trim().is_empty()) {
        return Err(LandUseError::NoParcelIds);
    }

    if config.id_column.trim().is_empty() {
        return Err(LandUseError::InvalidPlan(
            "Identifier column name is empty".to_string(),
        ));
    }

    aggregator::validate_plan(&config.plan)
}
