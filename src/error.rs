use thiserror::Error;

#[derive(Error, Debug)]
pub enum LandUseError {
    #[error("Starting balance must be finite, got {0}")]
    NonFiniteStartingBalance(f64),

    #[error("Category '{category}' has negative amount {amount}")]
    NegativeCategoryAmount { category: String, amount: f64 },

    #[error("Category '{category}' has non-finite amount {amount}")]
    NonFiniteCategoryAmount { category: String, amount: f64 },

    #[error("Ledger requires at least one deduction category")]
    EmptyCategoryList,

    #[error("Ledger invariant violated at step {step}: {details}")]
    InvariantViolation { step: usize, details: String },

    #[error("Invalid total area '{0}': use a dot as decimal separator (e.g. 1234.5678)")]
    InvalidTotalArea(String),

    #[error("No parcel identifiers provided")]
    NoParcelIds,

    #[error("Required columns not found: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("No rows matched parcel identifiers: {}", .0.join(", "))]
    NoMatchingRows(Vec<String>),

    #[error("Invalid deduction plan: {0}")]
    InvalidPlan(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl LandUseError {
    /// True for the caller-side programming errors that `build_ledger` rejects.
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            Self::NonFiniteStartingBalance(_)
                | Self::NegativeCategoryAmount { .. }
                | Self::NonFiniteCategoryAmount { .. }
                | Self::EmptyCategoryList
        )
    }
}

pub type Result<T> = std::result::Result<T, LandUseError>;
