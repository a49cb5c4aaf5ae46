use thiserror::Error;

pub const REQUIRED_COLUMNS: [&str; 4] = ["Entity", "Type", "Date", "Filter"];

/// Everything that aborts a matching run before any scoring happens.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(
        "CSV is missing one or more required columns: Entity, Type, Date, Filter (missing: {})",
        .missing.join(", ")
    )]
    MissingColumns { missing: Vec<String> },

    #[error("CSV column names must be unique (repeated: {})", .duplicates.join(", "))]
    DuplicateColumns { duplicates: Vec<String> },

    #[error(
        "Type column should only contain 'Test' or 'Not Test' values (row {row}: {value:?})"
    )]
    InvalidType { row: usize, value: String },

    #[error("Date column should be in mm/dd/yyyy format (row {row}: {value:?})")]
    InvalidDate { row: usize, value: String },

    #[error("metric column {column:?} must be numeric (row {row}: {value:?})")]
    MetricValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("entity {entity:?} appears as both 'Test' and 'Not Test'")]
    ConflictingType { entity: String },

    #[error("entity {entity:?} has more than one Filter value ({first:?} and {other:?})")]
    InconsistentFilter {
        entity: String,
        first: String,
        other: String,
    },

    #[error(
        "weights must cover exactly the metric columns (missing: [{}], unexpected: [{}])",
        .missing.join(", "),
        .unexpected.join(", ")
    )]
    WeightsMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("weight for {metric:?} must be between 0 and 10 (got {weight})")]
    WeightOutOfRange { metric: String, weight: f64 },

    #[error("number of control stores must be between 1 and 10 (got {0})")]
    TopNOutOfRange(i64),

    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
}

impl ValidationError {
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::MissingColumns { .. } | ValidationError::DuplicateColumns { .. } => {
                "schema_error"
            }
            ValidationError::InvalidType { .. }
            | ValidationError::MetricValue { .. }
            | ValidationError::ConflictingType { .. }
            | ValidationError::InconsistentFilter { .. } => "value_error",
            ValidationError::InvalidDate { .. } => "date_format_error",
            ValidationError::WeightsMismatch { .. }
            | ValidationError::WeightOutOfRange { .. }
            | ValidationError::TopNOutOfRange(_) => "config_error",
            ValidationError::Csv(_) => "csv_error",
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;
