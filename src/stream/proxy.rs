//! The caller-facing stream wrapper.
//!
//! [`StreamProxy`] forwards every item of the wrapped stream unchanged while
//! feeding it to the accumulator and timing tracker, and finalizes telemetry
//! exactly once when the stream ends, fails, or is closed early.
//!
//! ```text
//! Idle --first item--> Streaming --end | error | close--> Finalizing --> Closed
//!   \------------------ end | error | close ------------/
//! ```
//!
//! It is an [`Iterator`] over a blocking iterator of `Result<T, E>` and a
//! [`futures::Stream`] over an `Unpin` stream of `Result<T, E>`.
//! Infallible sources can be adapted with `.map(Ok::<_, Infallible>)`.

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, ready};
use std::time::{Instant, SystemTime};

use futures::Stream;
use uuid::Uuid;

use super::accumulator::{AccumulatedResponse, ResponseAccumulator};
use super::context::RequestContext;
use super::delta::DeltaParser;
use super::finalize::{Finalizer, StreamOutcome};
use super::timing::TimingTracker;
use crate::telemetry::emit::SpanHandle;

/// Lifecycle of a [`StreamProxy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, nothing pulled yet.
    Idle,
    /// At least one item forwarded.
    Streaming,
    /// Telemetry is being built and submitted.
    Finalizing,
    /// Telemetry submitted. Further pulls are forwarded without observation.
    Closed,
}

/// One-shot latch: the first caller of [`try_fire`](Self::try_fire) wins.
#[derive(Debug, Default)]
pub struct FinalizationGuard {
    fired: AtomicBool,
}

impl FinalizationGuard {
    pub fn try_fire(&self) -> bool {
        !self.fired.swap(true, Ordering::AcqRel)
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

/// Per-stream telemetry state. Finalizes on drop if the stream was pulled
/// from but never finished.
struct StreamState {
    stream_id: Uuid,
    phase: Phase,
    started_at: SystemTime,
    accumulator: ResponseAccumulator,
    timing: TimingTracker,
    guard: FinalizationGuard,
    span: Option<Box<dyn SpanHandle>>,
    ctx: RequestContext,
    finalizer: Finalizer,
}

impl StreamState {
    fn start_span(&self) -> Box<dyn SpanHandle> {
        self.finalizer
            .emitter()
            .start_span(self.ctx.span_name(), self.started_at)
    }

    fn observe<T, E, P>(&mut self, parser: &P, item: &Option<Result<T, E>>)
    where
        E: fmt::Display,
        P: DeltaParser<T> + ?Sized,
    {
        if self.phase == Phase::Closed {
            return;
        }
        match item {
            Some(Ok(chunk)) => {
                if self.phase == Phase::Idle {
                    self.phase = Phase::Streaming;
                    self.span = Some(self.start_span());
                }
                self.timing.on_chunk(Instant::now());
                self.accumulator.apply(parser.parse(chunk));
            }
            Some(Err(e)) => {
                tracing::debug!(stream_id = %self.stream_id, error = %e, "wrapped stream failed");
                self.finish(StreamOutcome::Failed(e.to_string()));
            }
            None => self.finish(StreamOutcome::Completed),
        }
    }

    fn finish(&mut self, outcome: StreamOutcome) {
        if !self.guard.try_fire() {
            return;
        }
        self.phase = Phase::Finalizing;

        let timing = self.timing.finalize(Instant::now());
        let response = self.accumulator.snapshot();
        let mut span = match self.span.take() {
            Some(span) => span,
            None => self.start_span(),
        };
        self.finalizer
            .finalize(span.as_mut(), &response, &timing, &self.ctx, &outcome);

        tracing::debug!(
            stream_id = %self.stream_id,
            model = %self.ctx.request_model,
            chunks = self.timing.chunk_count(),
            outcome = ?outcome,
            "stream finalized"
        );
        self.phase = Phase::Closed;
    }
}

impl Drop for StreamState {
    fn drop(&mut self) {
        if self.phase == Phase::Streaming {
            self.finish(StreamOutcome::Abandoned);
        }
    }
}

/// Wraps a provider stream and reports its telemetry.
pub struct StreamProxy<S, P> {
    inner: S,
    parser: P,
    state: StreamState,
}

impl<S, P> StreamProxy<S, P> {
    pub fn new(inner: S, parser: P, ctx: RequestContext, finalizer: Finalizer) -> Self {
        let stream_id = Uuid::new_v4();
        tracing::debug!(%stream_id, model = %ctx.request_model, system = %ctx.system, "wrapping stream");
        Self {
            inner,
            parser,
            state: StreamState {
                stream_id,
                phase: Phase::Idle,
                started_at: SystemTime::now(),
                accumulator: ResponseAccumulator::new(),
                timing: TimingTracker::new(Instant::now()),
                guard: FinalizationGuard::default(),
                span: None,
                ctx,
                finalizer,
            },
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn stream_id(&self) -> Uuid {
        self.state.stream_id
    }

    pub fn context(&self) -> &RequestContext {
        &self.state.ctx
    }

    /// The wrapped stream, for provider-specific accessors.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// The response reconstructed so far.
    pub fn accumulated(&self) -> AccumulatedResponse {
        self.state.accumulator.snapshot()
    }

    /// Finish early. Finalizes with whatever was accumulated unless telemetry
    /// was already submitted; calling it again has no effect.
    pub fn close(&mut self) {
        self.state.finish(StreamOutcome::Abandoned);
    }
}

impl<S, P, T, E> Iterator for StreamProxy<S, P>
where
    S: Iterator<Item = Result<T, E>>,
    P: DeltaParser<T>,
    E: fmt::Display,
{
    type Item = Result<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next();
        self.state.observe(&self.parser, &item);
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<S, P, T, E> Stream for StreamProxy<S, P>
where
    S: Stream<Item = Result<T, E>> + Unpin,
    P: DeltaParser<T> + Unpin,
    E: fmt::Display,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let item = ready!(Pin::new(&mut this.inner).poll_next(cx));
        this.state.observe(&this.parser, &item);
        Poll::Ready(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_fires_once() {
        let guard = FinalizationGuard::default();
        assert!(!guard.has_fired());
        assert!(guard.try_fire());
        assert!(guard.has_fired());
        assert!(!guard.try_fire());
        assert!(guard.has_fired());
    }

    #[test]
    fn guard_fires_once_across_threads() {
        let guard = std::sync::Arc::new(FinalizationGuard::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = std::sync::Arc::clone(&guard);
                std::thread::spawn(move || guard.try_fire())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|fired| *fired)
            .count();
        assert_eq!(winners, 1);
        assert!(guard.has_fired());
    }
}
