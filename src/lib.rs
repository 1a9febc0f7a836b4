//! Bounded concurrent `map` over an iterator of futures
//!
//! This crate maps a finite source of values (or of futures resolving to values)
//! through an async transform, while never running more than N transforms at once.
//!
//! `futures::stream::StreamExt::buffered` and friends already limit concurrency, but
//! they know nothing about `Result`. This crate has two error modes:
//!
//! - **fail-fast** (the default): the first failure resolves the whole operation.
//!   Nothing else is pulled from the source, and transforms still in flight are
//!   left alone and their outcomes ignored.
//! - **collect-all**: failures are recorded and the operation keeps going. Once the
//!   source is exhausted and everything has settled, you get either every output,
//!   or every failure in the order they happened.
//!
//! The logic is the same as a bounded `FuturesUnordered`: whenever a transform
//! settles, we pop the next item from the source. This means that we'll always be
//! running **exactly** N transforms (or less, if the source has been exhausted).
//! Source items are pulled strictly in order and outputs are always written to
//! their own slot, so the result is in source order whatever the completion order.
//!
//! Use [`map::map`] when the options are already typed, [`map::try_map`] when the
//! source items can fail themselves, or [`map::Mapper`] to validate raw
//! configuration first. After a fail-fast abort, [`map::Map::into_in_flight`]
//! hands over whatever was still running so it can finish.
pub mod common;
pub mod error;
mod indexed;
pub mod map;

pub use common::{Concurrency, MapOptions};
pub use error::{ConfigError, MapError};
pub use map::{map, try_map, InFlight, Map, Mapper};
