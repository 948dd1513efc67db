use crate::aggregator::{CellValue, ParcelRecord};
use crate::error::{LandUseError, Result};
use crate::utils::{round_to, DISPLAY_PLACES};
use log::debug;
use std::collections::HashSet;
use std::io::Read;

const ID_SEPARATORS: [char; 4] = [',', ';', '|', '\n'];

/// Splits a pasted identifier list ("101, 102 ; 103") into trimmed, non-empty ids.
pub fn parse_parcel_ids(text: &str) -> Vec<String> {
    text.split(|c: char| ID_SEPARATORS.contains(&c))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses the manual total area. Dot is the only decimal separator.
pub fn parse_total_area(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(round_to(value, DISPLAY_PLACES)),
        _ => Err(LandUseError::InvalidTotalArea(trimmed.to_string())),
    }
}

/// The parcel dataset: header columns plus one record per row.
#[derive(Debug, Clone, Default)]
pub struct ParcelTable {
    pub columns: Vec<String>,
    pub rows: Vec<ParcelRecord>,
}

impl ParcelTable {
    pub fn new(columns: Vec<String>, rows: Vec<ParcelRecord>) -> Self {
        Self { columns, rows }
    }

    /// Reads a delimited table whose first row names the columns.
    ///
    /// Cells are kept as text; numeric coercion is left to the aggregator.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let mut row = ParcelRecord::new();
            for (column, raw) in columns.iter().zip(record.iter()) {
                let mut cell = CellValue::Text(raw.to_string());
                if cell.is_empty() {
                    cell = CellValue::Empty;
                }
                row.insert(column.clone(), cell);
            }
            rows.push(row);
        }

        debug!("Loaded {} rows x {} columns", rows.len(), columns.len());
        Ok(Self { columns, rows })
    }

    /// Reads a JSON array of row objects.
    pub fn from_json_rows(json: &str) -> Result<Self> {
        let rows: Vec<ParcelRecord> = serde_json::from_str(json)?;

        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for column in row.columns() {
                if !columns.iter().any(|c| c == column) {
                    columns.push(column.to_string());
                }
            }
        }

        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Required columns absent from the header, in the order they were requested.
    pub fn missing_columns<S: AsRef<str>>(&self, required: &[S]) -> Vec<String> {
        required
            .iter()
            .map(|c| c.as_ref())
            .filter(|c| !self.columns.iter().any(|existing| existing == c))
            .map(str::to_string)
            .collect()
    }

    pub fn require_columns<S: AsRef<str>>(&self, required: &[S]) -> Result<()> {
        let missing = self.missing_columns(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(LandUseError::MissingColumns(missing))
        }
    }

    /// Rows whose identifier matches one of `ids`, compared as trimmed text, in table order.
    pub fn filter_by_ids<S: AsRef<str>>(&self, id_column: &str, ids: &[S]) -> Result<Vec<ParcelRecord>> {
        if ids.is_empty() {
            return Err(LandUseError::NoParcelIds);
        }

        let wanted: HashSet<&str> = ids.iter().map(|id| id.as_ref().trim()).collect();

        let matched: Vec<ParcelRecord> = self
            .rows
            .iter()
            .filter(|row| {
                row.get(id_column)
                    .map(|cell| wanted.contains(cell.as_key().as_str()))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        if matched.is_empty() {
            return Err(LandUseError::NoMatchingRows(
                ids.iter().map(|id| id.as_ref().to_string()).collect(),
            ));
        }

        debug!("{} of {} rows matched {} ids", matched.len(), self.rows.len(), ids.len());
        Ok(matched)
    }
}
