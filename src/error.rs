// Error types. ConvertError is fatal to a run; StatementError only ever
// causes one statement to be skipped.

use serde::Serialize;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),

    #[error("failed to write chunk {chunk}: {source}")]
    SinkWrite { chunk: u32, source: io::Error },

    #[error("failed to format chunk {chunk}: {message}")]
    Csv { chunk: u32, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ConvertError {
    // Split a csv error into the sink failure it wraps or a formatting error.
    pub(crate) fn from_csv(chunk: u32, err: csv::Error) -> Self {
        match err.into_kind() {
            csv::ErrorKind::Io(source) => ConvertError::SinkWrite { chunk, source },
            other => ConvertError::Csv {
                chunk,
                message: format!("{:?}", other),
            },
        }
    }
}

// Why an INSERT statement produced no rows.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementError {
    #[error("no VALUES clause")]
    MissingValues,

    #[error("VALUES clause holds no tuples")]
    NoTuples,

    #[error("unbalanced column list")]
    UnbalancedColumnList,
}
