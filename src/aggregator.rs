use crate::error::{LandUseError, Result};
use crate::schema::{DeductionCategory, DeductionPlan};
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A raw table cell as it arrives from the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Empty,
}

impl CellValue {
    /// Numeric value of the cell. Anything that does not read as a finite number counts as zero.
    pub fn coerce(&self) -> f64 {
        match self {
            CellValue::Number(n) if n.is_finite() => *n,
            CellValue::Number(_) => 0.0,
            CellValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            CellValue::Text(text) => match text.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => v,
                _ => {
                    trace!("Non-numeric cell '{}' counted as 0", text);
                    0.0
                }
            },
            CellValue::Empty => 0.0,
        }
    }

    /// Identifier form of the cell: trimmed text, integral numbers without a fractional part.
    pub fn as_key(&self) -> String {
        match self {
            CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                format!("{}", *n as i64)
            }
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Text(text) => text.trim().to_string(),
            CellValue::Empty => String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

/// One row of the parcel table, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParcelRecord {
    cells: BTreeMap<String, CellValue>,
}

impl ParcelRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        self.cells.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    /// Coerced numeric value of a column; absent columns read as zero.
    pub fn number(&self, column: &str) -> f64 {
        self.cells.get(column).map(CellValue::coerce).unwrap_or(0.0)
    }
}

/// Sums each requested column across every row, preserving the column order.
pub fn aggregate<S: AsRef<str>>(rows: &[ParcelRecord], columns: &[S]) -> Vec<DeductionCategory> {
    columns
        .iter()
        .map(|column| {
            let column = column.as_ref();
            let total: f64 = rows.iter().map(|row| row.number(column)).sum();
            DeductionCategory::new(column, total)
        })
        .collect()
}

/// Builds the plan's categories from already-aggregated column totals.
///
/// Composite categories add their sub-totals; rows are never re-scanned.
pub fn compose_categories(
    column_totals: &[DeductionCategory],
    plan: &DeductionPlan,
) -> Result<Vec<DeductionCategory>> {
    validate_plan(plan)?;

    let lookup: BTreeMap<&str, f64> = column_totals
        .iter()
        .map(|c| (c.name.as_str(), c.amount))
        .collect();

    plan.categories
        .iter()
        .map(|spec| {
            let mut amount = 0.0;
            for column in &spec.columns {
                let total = lookup.get(column.as_str()).ok_or_else(|| {
                    LandUseError::InvalidPlan(format!(
                        "Category '{}' references column '{}' with no aggregated total",
                        spec.name, column
                    ))
                })?;
                amount += total;
            }
            Ok(DeductionCategory::new(spec.name.clone(), amount))
        })
        .collect()
}

/// Aggregates every column the plan uses once, then composes its categories in plan order.
pub fn aggregate_plan(rows: &[ParcelRecord], plan: &DeductionPlan) -> Result<Vec<DeductionCategory>> {
    validate_plan(plan)?;
    let column_totals = aggregate(rows, &plan.required_columns());
    compose_categories(&column_totals, plan)
}

pub fn validate_plan(plan: &DeductionPlan) -> Result<()> {
    if plan.categories.is_empty() {
        return Err(LandUseError::InvalidPlan(
            "Plan has no deduction categories".to_string(),
        ));
    }

    for (idx, spec) in plan.categories.iter().enumerate() {
        if spec.columns.is_empty() {
            return Err(LandUseError::InvalidPlan(format!(
                "Category #{} '{}' names no source columns",
                idx, spec.name
            )));
        }
    }

    Ok(())
}
