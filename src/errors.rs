// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

/// Errors surfaced to the caller of a server-side operation.
#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("invalid-argument: {0}")]
    InvalidArgument(String),

    #[error("not-found: {0}")]
    NotFound(String),

    #[error("already-exists: {0}")]
    AlreadyExists(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("document decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("corrupt field {field} on {doc}: {value}")]
    Corrupt {
        doc: String,
        field: &'static str,
        value: String,
    },
}

impl TriggerError {
    pub fn code(&self) -> &'static str {
        match self {
            TriggerError::InvalidArgument(_) => "invalid-argument",
            TriggerError::NotFound(_) => "not-found",
            TriggerError::AlreadyExists(_) => "already-exists",
            TriggerError::Store(_) | TriggerError::Decode(_) | TriggerError::Corrupt { .. } => {
                "internal"
            }
        }
    }
}

pub type TriggerResult<T> = Result<T, TriggerError>;

/// Form validation failure listing every field that needs attention.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Please fill in the following fields: {}", .fields.join(", "))]
pub struct ValidationError {
    pub fields: Vec<String>,
}

impl ValidationError {
    pub fn from_fields(fields: Vec<String>) -> Result<(), ValidationError> {
        if fields.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { fields })
        }
    }
}
