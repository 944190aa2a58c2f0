use thiserror::Error;

/// Validation and contract errors exposed by `fillcheck-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("owner id cannot be empty")]
    EmptyOwner,
    #[error("trade id cannot be empty")]
    EmptyTradeId,

    #[error("invalid side '{value}', expected one of long, short, buy, sell")]
    InvalidSide { value: String },
    #[error("invalid instrument hint '{value}'")]
    InvalidHint { value: String },
    #[error("invalid provider '{value}', expected one of polygon, yahoo")]
    InvalidProvider { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be greater than zero, got {value}")]
    NonPositiveValue { field: &'static str, value: f64 },
    #[error("field '{field}' must be non-negative, got {value}")]
    NegativeValue { field: &'static str, value: f64 },

    #[error("bar high must be >= low")]
    InvalidBarRange,
    #[error("bar open/close must be within high/low range")]
    InvalidBarBounds,

    #[error("exit timestamp must not precede entry timestamp")]
    ExitBeforeEntry,
    #[error("exit price and exit timestamp must be provided together")]
    ExitFieldsIncomplete,
    #[error("lot is already closed")]
    LotAlreadyClosed,
    #[error("cannot reduce lot quantity by {requested} when only {available} is open")]
    ReduceExceedsQuantity { requested: f64, available: f64 },
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub(crate) fn validate_finite(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    Ok(value)
}

pub(crate) fn validate_positive(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    validate_finite(field, value)?;
    if value <= 0.0 {
        return Err(ValidationError::NonPositiveValue { field, value });
    }
    Ok(value)
}

pub(crate) fn validate_non_negative(
    field: &'static str,
    value: f64,
) -> Result<f64, ValidationError> {
    validate_finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field, value });
    }
    Ok(value)
}
