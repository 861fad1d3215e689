use std::task::{Context, Poll};

use http::{HeaderName, HeaderValue, StatusCode};

/// Result of a single `Sink::try_write` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteStatus {
    /// The whole chunk was taken by this call. If not, the sink may still have taken a prefix,
    /// which shows in `Sink::write_offset`.
    pub accepted: bool,
    /// The sink has received the entire response body.
    pub complete: bool,
}

/// Write side of a response: the client connection, with explicit backpressure.
///
/// Status and headers are collected until the sink takes its first body byte, or an end call
/// commits them. While `write_offset` is 0, the head may still be replaced.
pub trait Sink {
    /// Set the response status.
    fn set_status(&mut self, status: StatusCode);

    /// Set a response header.
    fn set_header(&mut self, name: HeaderName, value: HeaderValue);

    /// End the response with a small in-memory body.
    fn end(&mut self, body: &[u8]);

    /// End the response without a body. Any `Content-Length` header set is kept as is.
    fn end_without_body(&mut self);

    /// Offer a body chunk, against a body of `total_len` bytes in all.
    fn try_write(&mut self, chunk: &[u8], total_len: u64) -> WriteStatus;

    /// Number of body bytes the sink has taken so far.
    fn write_offset(&self) -> u64;

    /// Wait for the sink to become writable again, resolving to its current write offset.
    ///
    /// Returning `Pending` registers the waker in `cx`; the sink must wake it once more data
    /// can be written, or when it is aborted.
    fn poll_writable(&mut self, cx: &mut Context<'_>) -> Poll<u64>;

    /// Check whether the client went away.
    ///
    /// Returning `Pending` registers the waker in `cx`, to be woken on abort.
    fn poll_aborted(&mut self, cx: &mut Context<'_>) -> Poll<()>;

    /// Terminate the connection abnormally. Used when a response can no longer be completed
    /// after its head was sent.
    fn terminate(&mut self);
}
