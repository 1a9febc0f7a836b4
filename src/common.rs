//! Options shared by every entry point.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use crate::error::ConfigError;

/// How many transforms may be in flight at once.
///
/// Use `Unbounded` instead of a numeric infinity: every item pulled from
/// the source is launched right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Concurrency {
    /// At most N transforms in flight.
    Bounded(NonZeroUsize),
    /// No limit.
    #[default]
    Unbounded,
}

impl Concurrency {
    /// Maximum number of in-flight transforms, `usize::MAX` when unbounded.
    pub fn limit(&self) -> usize {
        match self {
            Concurrency::Bounded(n) => n.get(),
            Concurrency::Unbounded => usize::MAX,
        }
    }
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Concurrency::Bounded(n) => write!(f, "{n}"),
            Concurrency::Unbounded => f.write_str("unbounded"),
        }
    }
}

impl From<NonZeroUsize> for Concurrency {
    fn from(value: NonZeroUsize) -> Self {
        Concurrency::Bounded(value)
    }
}

impl TryFrom<usize> for Concurrency {
    type Error = ConfigError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        NonZeroUsize::new(value)
            .map(Concurrency::Bounded)
            .ok_or_else(|| ConfigError::InvalidConcurrency(value.to_string()))
    }
}

impl TryFrom<i64> for Concurrency {
    type Error = ConfigError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(Concurrency::Bounded)
            .ok_or_else(|| ConfigError::InvalidConcurrency(value.to_string()))
    }
}

impl TryFrom<i32> for Concurrency {
    type Error = ConfigError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Concurrency::try_from(i64::from(value))
    }
}

impl TryFrom<f64> for Concurrency {
    type Error = ConfigError;

    /// `+inf` is unbounded. Otherwise the value must be a whole number >= 1.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value == f64::INFINITY {
            return Ok(Concurrency::Unbounded);
        }
        let invalid = || ConfigError::InvalidConcurrency(value.to_string());
        // NaN fails every comparison.
        if !(value >= 1.0) || value.fract() != 0.0 || value > usize::MAX as f64 {
            return Err(invalid());
        }
        NonZeroUsize::new(value as usize)
            .map(Concurrency::Bounded)
            .ok_or_else(invalid)
    }
}

impl FromStr for Concurrency {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "unbounded" | "inf" | "infinity" => return Ok(Concurrency::Unbounded),
            _ => {}
        }
        if let Ok(value) = trimmed.parse::<i64>() {
            return Concurrency::try_from(value);
        }
        match trimmed.parse::<f64>() {
            Ok(value) => Concurrency::try_from(value),
            Err(_) => Err(ConfigError::InvalidConcurrency(s.to_string())),
        }
    }
}

impl TryFrom<&str> for Concurrency {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Options recognized by [`map`](crate::map::map).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapOptions {
    /// Concurrency window. Defaults to [`Concurrency::Unbounded`].
    pub concurrency: Concurrency,
    /// When true (the default) the first transform failure aborts the whole
    /// operation. When false, failures are collected and reported together
    /// once everything has settled.
    pub stop_on_error: bool,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            concurrency: Concurrency::Unbounded,
            stop_on_error: true,
        }
    }
}

impl MapOptions {
    /// Same as `MapOptions::default()`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency window.
    pub fn with_concurrency(mut self, concurrency: impl Into<Concurrency>) -> Self {
        self.concurrency = concurrency.into();
        self
    }

    /// Choose between fail-fast (`true`) and collect-all (`false`).
    pub fn with_stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }
}
