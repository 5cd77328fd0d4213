//! Error handlers
//!
//! Maps store errors to reply status codes and logs them at a level
//! matching their severity.

use crate::error::types::StoreError;
use log::{error, warn};

/// Log a store error raised by `operation`.
///
/// Caller mistakes (bad paths, conflicts, missing entries) are warnings;
/// I/O failures are errors.
pub fn handle_error(operation: &str, err: &StoreError) {
    match err {
        StoreError::Io(_) => error!("{operation} failed: {err}"),
        _ => warn!("{operation} rejected: {err}"),
    }
}

/// Convert an error to the HTTP-style status code the calling layer replies with.
pub fn error_to_status_code(err: &StoreError) -> u16 {
    match err {
        StoreError::InvalidPath(_) => 400,
        StoreError::NotFound(_) => 404,
        StoreError::Conflict(_) => 409,
        StoreError::TooLarge { .. } => 413,
        StoreError::UnsupportedMedia(_) => 415,
        StoreError::RangeNotSatisfiable { .. } => 416,
        StoreError::Io(_) => 500,
    }
}
