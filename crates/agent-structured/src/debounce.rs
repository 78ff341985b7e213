use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::time::{sleep_until, Instant};

enum Wake<T> {
    Next(Option<T>),
    Deadline,
}

/// Rate-limits a stream of superseding items.
///
/// The first coalescible item opens a window of length `window`; when it
/// closes, only the newest coalescible item seen in it is yielded. Items for
/// which `coalescible` returns false are yielded at once and discard whatever
/// was waiting. A waiting item is flushed when the input ends. A zero window
/// passes everything through.
pub fn debounce<S, T, F>(input: S, window: Duration, mut coalescible: F) -> impl Stream<Item = T>
where
    S: Stream<Item = T> + Send + 'static,
    T: Send + 'static,
    F: FnMut(&T) -> bool + Send + 'static,
{
    async_stream::stream! {
        let mut input = Box::pin(input);
        let mut pending: Option<T> = None;
        let mut deadline = Instant::now();

        loop {
            let wake = if pending.is_some() && !window.is_zero() {
                tokio::select! {
                    biased;
                    _ = sleep_until(deadline) => Wake::Deadline,
                    next = input.next() => Wake::Next(next),
                }
            } else {
                Wake::Next(input.next().await)
            };

            match wake {
                Wake::Deadline => {
                    if let Some(item) = pending.take() {
                        yield item;
                    }
                }
                Wake::Next(None) => {
                    if let Some(item) = pending.take() {
                        yield item;
                    }
                    break;
                }
                Wake::Next(Some(item)) if window.is_zero() => yield item,
                Wake::Next(Some(item)) if coalescible(&item) => {
                    if pending.is_none() {
                        deadline = Instant::now() + window;
                    }
                    pending = Some(item);
                }
                Wake::Next(Some(item)) => {
                    if pending.take().is_some() {
                        log::trace!("debounce: superseded waiting item");
                    }
                    yield item;
                }
            }
        }
    }
}
