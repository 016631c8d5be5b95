//! Response body streaming with bounded flush latency.
//!
//! # Responsibilities
//! - Coalesce small upstream frames for at most one flush interval
//! - Pass event-stream frames through untouched
//! - Notice when the client goes away before the upstream finished
//!
//! # Design Decisions
//! - Byte order is never changed; trailers and errors wait behind buffered data
//! - A zero interval disables coalescing entirely
//! - Dropping the body drops the upstream body, which closes that pooled
//!   connection; no separate cancellation signal exists

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use hyper::body::{Body, Frame, SizeHint};
use tokio::time::{sleep, Sleep};

use crate::observability::metrics;

/// Buffered bytes that force a flush regardless of the interval.
pub const MAX_BUFFERED: usize = 64 * 1024;

/// Labels of the stream, reported if the client disconnects early.
#[derive(Debug, Clone)]
pub struct StreamOrigin {
    pub route: String,
    pub upstream: String,
    pub client: String,
}

impl StreamOrigin {
    fn report_disconnect(&self) {
        tracing::info!(
            route = %self.route,
            upstream = %self.upstream,
            client = %self.client,
            "Client disconnected, upstream stream cancelled"
        );
        metrics::record_client_disconnect(&self.route);
    }
}

/// Reports a disconnect if dropped while the upstream has not answered yet.
///
/// Held across the wait for response headers; `disarm` hands the labels on to
/// the response body once headers arrive.
#[derive(Debug)]
pub struct HeadersGuard {
    origin: Option<StreamOrigin>,
}

impl HeadersGuard {
    pub fn new(origin: StreamOrigin) -> Self {
        Self {
            origin: Some(origin),
        }
    }

    pub fn disarm(mut self) -> Option<StreamOrigin> {
        self.origin.take()
    }
}

impl Drop for HeadersGuard {
    fn drop(&mut self) {
        if let Some(origin) = &self.origin {
            origin.report_disconnect();
        }
    }
}

/// Response body that forwards an upstream body with bounded buffering.
pub struct FlushBody<B: Body> {
    inner: B,
    interval: Duration,
    buffer: BytesMut,
    deadline: Option<Pin<Box<Sleep>>>,
    /// Non-data frame or error waiting for the buffer to drain.
    held: Option<Result<Frame<Bytes>, B::Error>>,
    finished: bool,
    origin: Option<StreamOrigin>,
}

impl<B: Body + Unpin> Unpin for FlushBody<B> {}

impl<B> FlushBody<B>
where
    B: Body<Data = Bytes> + Unpin,
{
    pub fn new(inner: B, interval: Duration) -> Self {
        Self {
            inner,
            interval,
            buffer: BytesMut::new(),
            deadline: None,
            held: None,
            finished: false,
            origin: None,
        }
    }

    /// Report a disconnect for `origin` if the body is dropped unfinished.
    pub fn with_origin(mut self, origin: impl Into<Option<StreamOrigin>>) -> Self {
        self.origin = origin.into();
        self
    }

    fn take_buffer(&mut self) -> Frame<Bytes> {
        self.deadline = None;
        Frame::data(self.buffer.split().freeze())
    }
}

impl<B: Body> FlushBody<B> {
    fn drained(&self) -> bool {
        self.buffer.is_empty() && self.held.is_none()
    }
}

impl<B> Body for FlushBody<B>
where
    B: Body<Data = Bytes> + Unpin,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        loop {
            if let Some(held) = this.held.take() {
                if !this.buffer.is_empty() {
                    this.held = Some(held);
                    return Poll::Ready(Some(Ok(this.take_buffer())));
                }
                return Poll::Ready(Some(held));
            }

            if this.finished {
                if !this.buffer.is_empty() {
                    return Poll::Ready(Some(Ok(this.take_buffer())));
                }
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_frame(cx) {
                Poll::Ready(Some(Ok(frame))) => match frame.into_data() {
                    Ok(data) => {
                        if this.interval.is_zero() && this.buffer.is_empty() {
                            return Poll::Ready(Some(Ok(Frame::data(data))));
                        }
                        this.buffer.extend_from_slice(&data);
                        if this.buffer.len() >= MAX_BUFFERED {
                            return Poll::Ready(Some(Ok(this.take_buffer())));
                        }
                        if this.deadline.is_none() {
                            this.deadline = Some(Box::pin(sleep(this.interval)));
                        }
                    }
                    Err(frame) => this.held = Some(Ok(frame)),
                },
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    if let Some(origin) = &this.origin {
                        tracing::warn!(
                            route = %origin.route,
                            upstream = %origin.upstream,
                            client = %origin.client,
                            "Upstream response stream failed"
                        );
                    }
                    this.held = Some(Err(e));
                }
                Poll::Ready(None) => this.finished = true,
                Poll::Pending => {
                    if let Some(deadline) = this.deadline.as_mut() {
                        if deadline.as_mut().poll(cx).is_ready() {
                            return Poll::Ready(Some(Ok(this.take_buffer())));
                        }
                    }
                    return Poll::Pending;
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.drained() && (self.finished || self.inner.is_end_stream())
    }

    fn size_hint(&self) -> SizeHint {
        if self.drained() && !self.finished {
            self.inner.size_hint()
        } else {
            SizeHint::default()
        }
    }
}

impl<B: Body> Drop for FlushBody<B> {
    fn drop(&mut self) {
        let complete = self.drained() && (self.finished || self.inner.is_end_stream());
        if !complete {
            if let Some(origin) = &self.origin {
                origin.report_disconnect();
            }
        }
    }
}
