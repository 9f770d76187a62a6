// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for STEP reading and writing
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building, writing or reading STEP content
#[derive(Error, Debug)]
pub enum Error {
    #[error("Parse error at byte {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Missing STEP section: {0}")]
    MissingSection(&'static str),

    #[error("Unsupported IFC schema: {0}")]
    UnsupportedSchema(String),

    #[error("Schema mismatch: header declares {found}, expected {expected}")]
    SchemaMismatch { expected: String, found: String },

    #[error("Non-finite real value for {0}")]
    NonFiniteReal(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            position,
            message: message.into(),
        }
    }
}
