//! Errors raised while configuring or driving a [`Map`](crate::map::Map).

use std::convert::Infallible;

use thiserror::Error;

/// Configuration errors. These are raised before anything is pulled from
/// the source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No transform was supplied to the builder.
    #[error("mapper function is required")]
    InvalidMapper,

    /// The concurrency limit is not a whole number from 1 and up.
    #[error("expected `concurrency` to be a number from 1 and up, got '{0}'")]
    InvalidConcurrency(String),
}

impl From<Infallible> for ConfigError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// Failure of a mapping operation.
///
/// A failed source item is reported the same way as a failed transform.
///
/// Which variant is produced depends on
/// [`MapOptions::stop_on_error`](crate::common::MapOptions::stop_on_error).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapError<E> {
    /// The first transform failure, reported as soon as it happens.
    #[error("transform failed: {0}")]
    Failed(E),

    /// Every transform failure, in the order they happened, reported once
    /// the source is exhausted and all launched transforms have settled.
    #[error("{} transform(s) failed", .0.len())]
    Collected(Vec<E>),
}

impl<E> MapError<E> {
    /// Flatten either variant into the list of failures.
    pub fn into_errors(self) -> Vec<E> {
        match self {
            MapError::Failed(error) => vec![error],
            MapError::Collected(errors) => errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::InvalidConcurrency("0".to_string()).to_string(),
            "expected `concurrency` to be a number from 1 and up, got '0'"
        );
        assert_eq!(
            ConfigError::InvalidMapper.to_string(),
            "mapper function is required"
        );
    }

    #[test]
    fn test_map_error_flatten() {
        let failed: MapError<&str> = MapError::Failed("boom");
        assert_eq!(failed.to_string(), "transform failed: boom");
        assert_eq!(failed.into_errors(), vec!["boom"]);

        let collected: MapError<&str> = MapError::Collected(vec!["a", "b"]);
        assert_eq!(collected.to_string(), "2 transform(s) failed");
        assert_eq!(collected.into_errors(), vec!["a", "b"]);
    }
}
