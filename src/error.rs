use std::io;

use rust_decimal::Decimal;
use thiserror::Error;

/// Central enum for errors that can occur while matching tax lots.
#[derive(Debug, Error)]
pub enum TaxLotError {
    #[error("Could not parse timestamp: {0}")]
    DateParseError(String),
    #[error("Could not parse Decimal")]
    DecimalParseError(#[from] rust_decimal::Error),
    #[error("Could not parse order. {0} field does not exist")]
    FieldDoesntExist(String),
    #[error("Expected {expected} fields to match the header, found {found}")]
    FieldCountMismatch { expected: usize, found: usize },
    #[error("Unterminated quoted field")]
    UnterminatedQuote,
    #[error("Order feed header is missing the {0} column")]
    MissingColumn(String),
    #[error("Order feed is empty, expected a header row")]
    EmptyFeed,
    #[error("Cannot {event} a lot that is {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
    #[error("Cannot sell {requested} units of {asset}: only {available} open")]
    InsufficientLots {
        asset: String,
        requested: u64,
        available: usize,
    },
    #[error("Quantity {0} is out of range for a unit count")]
    QuantityOutOfRange(Decimal),
    #[error("Overflow occurred while {0}")]
    DecimalOverflow(String),
    #[error("Underflow occurred while {0}")]
    DecimalUnderflow(String),
    #[error("Line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: Box<TaxLotError>,
    },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TaxLotError {
    /// Attaches the 1-based feed line number to an error raised while handling that line.
    pub fn at_line(self, line: usize) -> Self {
        TaxLotError::Record {
            line,
            source: Box::new(self),
        }
    }
}

/// Checked subtraction operation that maps an `Option` to a `Result` in case the operation
/// underflows.
pub fn checked_sub(left: Decimal, right: Decimal) -> Result<Decimal, TaxLotError> {
    match left.checked_sub(right) {
        Some(result) => Ok(result),
        None => Err(TaxLotError::DecimalUnderflow("subtracting".to_string())),
    }
}

/// Checked addition operation that maps an `Option` to a `Result` in case the operation
/// overflows.
pub fn checked_add(left: Decimal, right: Decimal) -> Result<Decimal, TaxLotError> {
    match left.checked_add(right) {
        Some(result) => Ok(result),
        None => Err(TaxLotError::DecimalOverflow("adding".to_string())),
    }
}
