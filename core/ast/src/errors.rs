//! Parse-time diagnostics.

use crate::nodes::Location;
use thiserror::Error;

/// A single parse failure, reported at the offset the recovery loop gave up
/// trying to synchronize from.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{location}: {message}")]
pub struct ParseError {
    pub location: Location,
    pub message: String,
    pub expected: Option<String>,
    pub found: Option<String>,
}

impl ParseError {
    #[must_use]
    pub fn new(location: Location, message: impl Into<String>) -> Self {
        Self { location, message: message.into(), expected: None, found: None }
    }

    #[must_use]
    pub fn expected_found(
        location: Location,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        let expected = expected.into();
        let found = found.into();
        Self {
            location,
            message: format!("expected {expected}, found {found}"),
            expected: Some(expected),
            found: Some(found),
        }
    }
}
