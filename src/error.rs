//! Failures surfaced by the data layer.

use thiserror::Error;

pub type DataResult<T> = Result<T, DataError>;

#[derive(Error, Debug)]
pub enum DataError {
    /// No connection string was provided.
    #[error("Backend not configured: set DATABASE_URL to the grants database")]
    NotConfigured,

    /// The backend rejected the query or could not be reached.
    #[error("Failed to load {context}: {source}")]
    Query {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// A row came back in a shape the dashboard cannot use.
    #[error("Invalid {context} row: {reason}")]
    InvalidRow {
        context: &'static str,
        reason: String,
    },
}

impl DataError {
    pub fn query(context: &'static str) -> impl FnOnce(sqlx::Error) -> DataError {
        move |source| DataError::Query { context, source }
    }
}
