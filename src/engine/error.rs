use chrono::NaiveDate;

use crate::model::{EntityKind, Id};

#[derive(Debug)]
pub enum EngineError {
    /// The record an update/delete/read targets does not exist.
    NotFound { kind: EntityKind, id: Id },
    /// A foreign id about to be stored does not resolve.
    ReferenceNotFound { kind: EntityKind, id: Id },
    DuplicateKey {
        kind: EntityKind,
        field: &'static str,
        value: String,
    },
    InvalidInterval { start: NaiveDate, end: NaiveDate },
    /// Candidate booking collides with an existing rental.
    Conflict { rental_id: Id },
    /// Delete refused while other records still point at the row.
    StillReferenced {
        kind: EntityKind,
        id: Id,
        by: EntityKind,
    },
    InvalidValue(&'static str),
    LimitExceeded(&'static str),
    /// Operation deadline hit before the store could be locked.
    Timeout,
    Storage(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound { kind, id } => write!(f, "{kind} with id {id} not found"),
            EngineError::ReferenceNotFound { kind, id } => {
                write!(f, "referenced {kind} with id {id} does not exist")
            }
            EngineError::DuplicateKey { kind, field, value } => {
                write!(f, "{kind} with {field} '{value}' already exists")
            }
            EngineError::InvalidInterval { start, end } => {
                write!(f, "invalid interval from {start} to {end}")
            }
            EngineError::Conflict { rental_id } => {
                write!(f, "booking conflicts with rental {rental_id}")
            }
            EngineError::StillReferenced { kind, id, by } => {
                write!(f, "cannot delete {kind} {id}: still referenced by a {by}")
            }
            EngineError::InvalidValue(msg) => write!(f, "invalid value: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Timeout => write!(f, "operation timed out waiting for the store"),
            EngineError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
