//! Cart errors.

use thiserror::Error;

/// Errors raised while adopting a backend snapshot.
#[derive(Debug, Error)]
pub enum CartError {
    /// The backend reported a currency code this crate does not know.
    #[error("unknown currency code {0}")]
    UnknownCurrency(String),

    /// A snapshot line has a quantity of zero.
    #[error("line for variant {0} has zero quantity")]
    EmptyLine(String),
}
