//! Bounded concurrent mapping over an iterator of (pending) values.

use std::future::IntoFuture;
use std::iter;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{self, FusedFuture, TryFuture, TryFutureExt};
use futures::stream::{FuturesUnordered, Stream};
use futures::Future;
use pin_project::pin_project;
use tracing::{debug, trace};

use crate::common::{Concurrency, MapOptions};
use crate::error::{ConfigError, MapError};
use crate::indexed::Indexed;
pub use crate::indexed::Resolve;

type Pool<Fut> = FuturesUnordered<Indexed<future::IntoFuture<Fut>>>;

/// Source handed to [`Map`] by [`map`]: every item wrapped in a [`Resolve`].
pub type Lifted<I, E> =
    iter::Map<I, fn(<I as Iterator>::Item) -> Resolve<<I as Iterator>::Item, E>>;

/// Future returned by [`map`], [`try_map`] and [`Mapper`].
///
/// The window is split in two pools: source items whose pending value is
/// still being awaited, and transforms that are running. Both count as in
/// flight. Whenever something settles, the window is refilled from the
/// source, one item at a time and strictly in order, until the source is
/// exhausted.
///
/// Nothing is pulled from the source until the first poll.
#[pin_project]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Map<I, F, Fut>
where
    I: Iterator,
    I::Item: TryFuture<Error = Fut::Error>,
    Fut: TryFuture,
{
    source: I,
    transform: F,
    limit: usize,
    stop_on_error: bool,
    pulled: usize,
    exhausted: bool,
    terminated: bool,
    results: Vec<Option<Fut::Ok>>,
    errors: Vec<Fut::Error>,
    #[pin]
    resolving: Pool<I::Item>,
    #[pin]
    running: Pool<Fut>,
}

/// Map every item of `source` through `transform`, running at most
/// `options.concurrency` transforms at once.
///
/// Items may be pending values; each one is awaited before being handed to
/// `transform` together with its index. Wrap ready values with
/// [`future::ready`].
///
/// The returned future resolves to the outputs in source order, whatever
/// order the transforms finish in. With `stop_on_error` (the default) the
/// first failure resolves it right away as [`MapError::Failed`] and nothing
/// more is pulled from the source. Transforms still in flight are not
/// interrupted: hand them to [`Map::into_in_flight`] to let them finish.
/// Otherwise failures are gathered and reported as [`MapError::Collected`]
/// once the source is exhausted and every launched transform has settled.
///
/// ```rust
/// use futures::future;
/// use futures_boundedmap::common::{Concurrency, MapOptions};
/// use futures_boundedmap::map::map;
///
/// let options = MapOptions::new().with_concurrency(Concurrency::try_from(2usize).unwrap());
/// let doubled = map(
///     (1..=5).map(future::ready),
///     |item: u64, _index| async move { Ok::<_, String>(item * 2) },
///     options,
/// );
///
/// tokio_test::block_on(async move {
///     assert_eq!(doubled.await, Ok(vec![2, 4, 6, 8, 10]));
/// });
/// ```
pub fn map<I, F, Fut>(
    source: I,
    transform: F,
    options: MapOptions,
) -> Map<Lifted<I::IntoIter, Fut::Error>, F, Fut>
where
    I: IntoIterator,
    I::Item: IntoFuture,
    F: FnMut(<I::Item as IntoFuture>::Output, usize) -> Fut,
    Fut: TryFuture,
{
    let lift: fn(I::Item) -> Resolve<I::Item, Fut::Error> = Resolve::new;
    Map::new(source.into_iter().map(lift), transform, options)
}

/// Like [`map`], for sources whose pending items can fail themselves.
///
/// A failed item is handled exactly like a failed transform: it aborts the
/// operation, or is collected, depending on `options.stop_on_error`.
///
/// ```rust
/// use futures::future;
/// use futures_boundedmap::error::MapError;
/// use futures_boundedmap::map::try_map;
/// use futures_boundedmap::MapOptions;
///
/// let items = vec![future::ok(1), future::err("bad item"), future::ok(3)];
/// let mapping = try_map(
///     items,
///     |item: u32, _| future::ok(item + 1),
///     MapOptions::new().with_stop_on_error(false),
/// );
/// tokio_test::block_on(async move {
///     assert_eq!(mapping.await, Err(MapError::Collected(vec!["bad item"])));
/// });
/// ```
pub fn try_map<I, F, Fut>(source: I, transform: F, options: MapOptions) -> Map<I::IntoIter, F, Fut>
where
    I: IntoIterator,
    I::Item: TryFuture<Error = Fut::Error>,
    F: FnMut(<I::Item as TryFuture>::Ok, usize) -> Fut,
    Fut: TryFuture,
{
    Map::new(source.into_iter(), transform, options)
}

impl<I, F, Fut> Map<I, F, Fut>
where
    I: Iterator,
    I::Item: TryFuture<Error = Fut::Error>,
    Fut: TryFuture,
{
    fn new(source: I, transform: F, options: MapOptions) -> Self {
        Self {
            source,
            transform,
            limit: options.concurrency.limit(),
            stop_on_error: options.stop_on_error,
            pulled: 0,
            exhausted: false,
            terminated: false,
            results: Vec::new(),
            errors: Vec::new(),
            resolving: FuturesUnordered::new(),
            running: FuturesUnordered::new(),
        }
    }

    /// Number of items pulled from the source and not yet settled.
    pub fn in_flight(&self) -> usize {
        self.resolving.len() + self.running.len()
    }

    /// Number of items pulled from the source so far.
    pub fn pulled(&self) -> usize {
        self.pulled
    }

    /// True once the source has returned its end marker.
    pub fn is_draining(&self) -> bool {
        self.exhausted
    }

    /// Consume the `Map` and return its in-flight work.
    ///
    /// After a fail-fast abort, the items and transforms that were still in
    /// flight are left untouched. The returned future drives them to
    /// completion and discards their outcomes. It never pulls from the
    /// source. Spawn it to let the leftovers finish in the background.
    ///
    /// ```rust
    /// use futures::future;
    /// use futures_boundedmap::map::map;
    /// use futures_boundedmap::MapOptions;
    ///
    /// tokio_test::block_on(async move {
    ///     let mut mapping = map(
    ///         (1..=3).map(future::ready),
    ///         |item: u32, _| async move {
    ///             if item == 1 {
    ///                 return Err("first");
    ///             }
    ///             Ok(item)
    ///         },
    ///         MapOptions::default(),
    ///     );
    ///     assert_eq!((&mut mapping).await, Err(futures_boundedmap::MapError::Failed("first")));
    ///     assert_eq!(mapping.into_in_flight().await, 2);
    /// });
    /// ```
    pub fn into_in_flight(self) -> InFlight<I::Item, F, Fut> {
        let Map {
            transform,
            resolving,
            running,
            ..
        } = self;
        InFlight {
            transform,
            settled: 0,
            resolving,
            running,
        }
    }
}

impl<I, F, Fut> Future for Map<I, F, Fut>
where
    I: Iterator,
    I::Item: TryFuture<Error = Fut::Error>,
    F: FnMut(<I::Item as TryFuture>::Ok, usize) -> Fut,
    Fut: TryFuture,
{
    type Output = Result<Vec<Fut::Ok>, MapError<Fut::Error>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();
        assert!(!*this.terminated, "`Map` polled after completion");

        loop {
            while !*this.exhausted && this.resolving.len() + this.running.len() < *this.limit {
                match this.source.next() {
                    Some(item) => {
                        let index = *this.pulled;
                        *this.pulled += 1;
                        trace!(index, "pulled source item");
                        this.results.push(None);
                        this.resolving
                            .push(Indexed::new(index, TryFutureExt::into_future(item)));
                    }
                    None => {
                        *this.exhausted = true;
                        debug!(
                            items = *this.pulled,
                            in_flight = this.resolving.len() + this.running.len(),
                            "source exhausted"
                        );
                    }
                }
            }

            let (index, error) = match this.resolving.as_mut().poll_next(cx) {
                Poll::Ready(Some((index, Ok(item)))) => {
                    let transform = TryFutureExt::into_future((this.transform)(item, index));
                    this.running.push(Indexed::new(index, transform));
                    continue;
                }
                Poll::Ready(Some((index, Err(error)))) => {
                    trace!(index, "source item failed");
                    (index, error)
                }
                Poll::Ready(None) | Poll::Pending => match this.running.as_mut().poll_next(cx) {
                    Poll::Ready(Some((index, Ok(value)))) => {
                        trace!(index, "transform settled");
                        let slot = &mut this.results[index];
                        debug_assert!(slot.is_none(), "result slot {index} written twice");
                        *slot = Some(value);
                        continue;
                    }
                    Poll::Ready(Some((index, Err(error)))) => {
                        trace!(index, "transform failed");
                        (index, error)
                    }
                    Poll::Ready(None) | Poll::Pending => {
                        if *this.exhausted && this.resolving.is_empty() && this.running.is_empty() {
                            *this.terminated = true;
                            debug!(
                                items = *this.pulled,
                                failures = this.errors.len(),
                                "mapping settled"
                            );
                            if !this.errors.is_empty() {
                                let errors = mem::take(this.errors);
                                return Poll::Ready(Err(MapError::Collected(errors)));
                            }
                            let results = mem::take(this.results);
                            return Poll::Ready(Ok(results.into_iter().flatten().collect()));
                        }
                        return Poll::Pending;
                    }
                },
            };

            if *this.stop_on_error {
                *this.terminated = true;
                debug!(
                    index,
                    left_in_flight = this.resolving.len() + this.running.len(),
                    "aborting on first failure"
                );
                return Poll::Ready(Err(MapError::Failed(error)));
            }
            trace!(index, "failure collected");
            this.errors.push(error);
        }
    }
}

impl<I, F, Fut> FusedFuture for Map<I, F, Fut>
where
    I: Iterator,
    I::Item: TryFuture<Error = Fut::Error>,
    F: FnMut(<I::Item as TryFuture>::Ok, usize) -> Fut,
    Fut: TryFuture,
{
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

/// Work left in flight by a [`Map`], see [`Map::into_in_flight`].
///
/// Resolves to the number of outcomes that were discarded.
#[pin_project]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct InFlight<S, F, Fut>
where
    S: TryFuture,
    Fut: TryFuture,
{
    transform: F,
    settled: usize,
    #[pin]
    resolving: Pool<S>,
    #[pin]
    running: Pool<Fut>,
}

impl<S, F, Fut> InFlight<S, F, Fut>
where
    S: TryFuture,
    Fut: TryFuture,
{
    /// Number of items and transforms not yet settled.
    pub fn len(&self) -> usize {
        self.resolving.len() + self.running.len()
    }

    /// True when nothing is left to drive.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S, F, Fut> Future for InFlight<S, F, Fut>
where
    S: TryFuture,
    F: FnMut(S::Ok, usize) -> Fut,
    Fut: TryFuture,
{
    type Output = usize;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();
        loop {
            match this.resolving.as_mut().poll_next(cx) {
                // The item was already pulled, so its transform still runs.
                Poll::Ready(Some((index, Ok(item)))) => {
                    let transform = TryFutureExt::into_future((this.transform)(item, index));
                    this.running.push(Indexed::new(index, transform));
                    continue;
                }
                Poll::Ready(Some((index, Err(_)))) => {
                    trace!(index, "discarded source item failure");
                    *this.settled += 1;
                    continue;
                }
                Poll::Ready(None) | Poll::Pending => {}
            }
            match this.running.as_mut().poll_next(cx) {
                Poll::Ready(Some((index, _))) => {
                    trace!(index, "discarded transform outcome");
                    *this.settled += 1;
                }
                Poll::Ready(None) if this.resolving.is_empty() => {
                    return Poll::Ready(*this.settled);
                }
                Poll::Ready(None) | Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Builder for a [`Map`] from raw configuration.
///
/// Unlike [`map`], every argument here may be missing or invalid, and
/// [`Mapper::build`] reports it as a [`ConfigError`] before the source is
/// touched.
///
/// ```rust
/// use futures::future;
/// use futures_boundedmap::error::ConfigError;
/// use futures_boundedmap::map::Mapper;
///
/// let mapper = Mapper::new((0..10).map(future::ready))
///     .concurrency("abc")
///     .transform(|item: u32, _| async move { Ok::<_, ()>(item) });
/// assert!(matches!(mapper.build(), Err(ConfigError::InvalidConcurrency(_))));
///
/// let squares = Mapper::new((0..4).map(future::ready))
///     .concurrency(2)
///     .stop_on_error(false)
///     .transform(|item: u32, _| async move { Ok::<_, ()>(item * item) })
///     .build()
///     .unwrap();
/// tokio_test::block_on(async move {
///     assert_eq!(squares.await, Ok(vec![0, 1, 4, 9]));
/// });
/// ```
pub struct Mapper<I, F> {
    source: I,
    transform: Option<F>,
    concurrency: Result<Concurrency, ConfigError>,
    stop_on_error: bool,
}

impl<I, F> Mapper<I, F>
where
    I: IntoIterator,
{
    /// Start from `source`, with the same defaults as [`MapOptions`].
    pub fn new(source: I) -> Self {
        let options = MapOptions::default();
        Self {
            source,
            transform: None,
            concurrency: Ok(options.concurrency),
            stop_on_error: options.stop_on_error,
        }
    }

    /// Set the transform applied to every `(item, index)`.
    pub fn transform(mut self, transform: F) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Set the concurrency window from anything convertible to
    /// [`Concurrency`]. Invalid values are reported by [`Mapper::build`].
    pub fn concurrency<C>(mut self, concurrency: C) -> Self
    where
        C: TryInto<Concurrency>,
        ConfigError: From<C::Error>,
    {
        self.concurrency = concurrency.try_into().map_err(ConfigError::from);
        self
    }

    /// Choose between fail-fast (`true`, the default) and collect-all.
    pub fn stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    fn validate(self) -> Result<(I, F, MapOptions), ConfigError> {
        let transform = self.transform.ok_or(ConfigError::InvalidMapper)?;
        let options = MapOptions::new()
            .with_concurrency(self.concurrency?)
            .with_stop_on_error(self.stop_on_error);
        Ok((self.source, transform, options))
    }

    /// Validate the configuration and return the mapping future.
    pub fn build<Fut>(self) -> Result<Map<Lifted<I::IntoIter, Fut::Error>, F, Fut>, ConfigError>
    where
        I::Item: IntoFuture,
        F: FnMut(<I::Item as IntoFuture>::Output, usize) -> Fut,
        Fut: TryFuture,
    {
        let (source, transform, options) = self.validate()?;
        Ok(map(source, transform, options))
    }

    /// Same as [`Mapper::build`], for sources whose items can fail. See
    /// [`try_map`].
    pub fn try_build<Fut>(self) -> Result<Map<I::IntoIter, F, Fut>, ConfigError>
    where
        I::Item: TryFuture<Error = Fut::Error>,
        F: FnMut(<I::Item as TryFuture>::Ok, usize) -> Fut,
        Fut: TryFuture,
    {
        let (source, transform, options) = self.validate()?;
        Ok(try_map(source, transform, options))
    }
}
