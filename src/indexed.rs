//! Future wrappers used by the scheduler.

use std::future::IntoFuture;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Future;
use pin_project::pin_project;

/// Resolves to `(index, output)` so completions arriving out of order can
/// still be written to the right slot.
#[pin_project]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub(crate) struct Indexed<F> {
    index: usize,
    #[pin]
    inner: F,
}

impl<F> Indexed<F> {
    pub(crate) fn new(index: usize, inner: F) -> Self {
        Self { index, inner }
    }
}

impl<F> Future for Indexed<F>
where
    F: Future,
{
    type Output = (usize, F::Output);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match this.inner.poll(cx) {
            Poll::Ready(value) => Poll::Ready((*this.index, value)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A source item that cannot fail, seen as one that could fail with `E`.
///
/// This lets infallible and fallible sources share the same window.
#[pin_project]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Resolve<S, E>
where
    S: IntoFuture,
{
    #[pin]
    inner: S::IntoFuture,
    _error: PhantomData<fn() -> E>,
}

impl<S, E> Resolve<S, E>
where
    S: IntoFuture,
{
    pub(crate) fn new(item: S) -> Self {
        Self {
            inner: item.into_future(),
            _error: PhantomData,
        }
    }
}

impl<S, E> Future for Resolve<S, E>
where
    S: IntoFuture,
{
    type Output = Result<S::Output, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.project().inner.poll(cx).map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use futures::future;
    use futures::stream::{FuturesUnordered, StreamExt};

    use super::*;

    #[tokio::test]
    async fn test_indexed_keeps_position() {
        assert_eq!(Indexed::new(7, future::ready("x")).await, (7, "x"));

        let running = (0..5)
            .rev()
            .map(|i| Indexed::new(i, future::ready(i * 10)))
            .collect::<FuturesUnordered<_>>();
        let mut out = running.collect::<Vec<_>>().await;
        out.sort();
        assert_eq!(out, vec![(0, 0), (1, 10), (2, 20), (3, 30), (4, 40)]);
    }

    #[tokio::test]
    async fn test_resolve_never_fails() {
        let resolved: Result<u8, String> = Resolve::new(async { 3 }).await;
        assert_eq!(resolved, Ok(3));
    }
}
