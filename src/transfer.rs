use std::{
    future::Future,
    mem,
    path::PathBuf,
    pin::Pin,
    task::{Context, Poll},
};

use futures_util::stream::Stream;
use hyper::body::Bytes;
use tokio::io::AsyncRead;
use tracing::{trace, warn};

use crate::error::TransferError;
use crate::resolve::FileReference;
use crate::sink::{Sink, WriteStatus};
use crate::util::FileBytesStream;
use crate::vfs::Vfs;

/// How a transfer ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The sink reported the entire body received.
    Completed,
    /// The sink was aborted by the client.
    Aborted,
}

/// State of a `TransferSession` as it progresses.
enum TransferState<O, F> {
    /// Nothing opened yet.
    Idle,
    /// Wait for the file to open.
    Opening(O),
    /// Pull the next chunk from the file.
    Reading(FileBytesStream<F>),
    /// The sink did not take all of `chunk`. The source is paused, and the unacknowledged tail
    /// is written once the sink is writable again.
    Backpressure {
        source: FileBytesStream<F>,
        chunk: Bytes,
        /// Sink write offset at which the first write attempt of `chunk` began.
        chunk_start: u64,
    },
    /// Finished. The source has been released.
    Done,
}

/// Future returned by `stream`.
///
/// Drives the bytes of one file into one sink, pausing the file while the sink is saturated.
/// The source is exclusively owned by the session, and released exactly once: when the session
/// reaches a terminal state, or when it is dropped.
pub struct TransferSession<'a, S, V: Vfs> {
    sink: &'a mut S,
    vfs: &'a V,
    path: PathBuf,
    total: u64,
    read: u64,
    state: TransferState<V::OpenFuture, V::File>,
}

/// Stream a resolved file into a sink.
///
/// The file is opened lazily, on first poll. The response head must already be set on the sink;
/// the body is written with the file size as the total length.
pub fn stream<'a, S, V>(
    sink: &'a mut S,
    vfs: &'a V,
    file: &FileReference,
) -> TransferSession<'a, S, V>
where
    S: Sink,
    V: Vfs,
{
    TransferSession {
        sink,
        vfs,
        path: file.path().to_path_buf(),
        total: file.size(),
        read: 0,
        state: TransferState::Idle,
    }
}

impl<'a, S, V> TransferSession<'a, S, V>
where
    S: Sink,
    V: Vfs,
{
    /// Decide the next state after a write attempt of `chunk`.
    ///
    /// Returns `None` if the sink reported completion, in which case the source is dropped here.
    fn after_write(
        &self,
        status: WriteStatus,
        source: FileBytesStream<V::File>,
        chunk: Bytes,
        chunk_start: u64,
    ) -> Option<TransferState<V::OpenFuture, V::File>> {
        if status.complete {
            if self.read < self.total {
                warn!(
                    path = %self.path.display(),
                    read = self.read,
                    total = self.total,
                    "sink completed before the file was fully read"
                );
            }
            trace!(path = %self.path.display(), "transfer complete, releasing file");
            return None;
        }

        if status.accepted {
            Some(TransferState::Reading(source))
        } else {
            trace!(chunk_start, len = chunk.len(), "sink saturated, pausing file");
            Some(TransferState::Backpressure {
                source,
                chunk,
                chunk_start,
            })
        }
    }
}

impl<'a, S, V> Future for TransferSession<'a, S, V>
where
    S: Sink,
    V: Vfs,
    V::OpenFuture: Unpin,
    V::File: AsyncRead + Unpin,
{
    type Output = Result<TransferOutcome, TransferError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        loop {
            if let TransferState::Done = this.state {
                panic!("TransferSession polled after completion");
            }

            // Abort wins in every state. Leaving the state at `Done` drops the source.
            if this.sink.poll_aborted(cx).is_ready() {
                trace!(path = %this.path.display(), "sink aborted, releasing file");
                this.state = TransferState::Done;
                return Poll::Ready(Ok(TransferOutcome::Aborted));
            }

            // Every arm that does not store a new state leaves `Done` behind.
            this.state = match mem::replace(&mut this.state, TransferState::Done) {
                TransferState::Idle => {
                    if this.total == 0 {
                        // Nothing to read; end the body without opening the file.
                        let status = this.sink.try_write(&[], 0);
                        return Poll::Ready(if status.complete {
                            Ok(TransferOutcome::Completed)
                        } else {
                            Err(TransferError::UnexpectedEof {
                                expected: 0,
                                read: 0,
                            })
                        });
                    }
                    TransferState::Opening(this.vfs.open(&this.path))
                }

                TransferState::Opening(mut future) => match Pin::new(&mut future).poll(cx) {
                    Poll::Pending => {
                        this.state = TransferState::Opening(future);
                        return Poll::Pending;
                    }
                    Poll::Ready(Err(err)) => return Poll::Ready(Err(TransferError::Open(err))),
                    Poll::Ready(Ok(file)) => {
                        TransferState::Reading(FileBytesStream::new_with_limit(file, this.total))
                    }
                },

                TransferState::Reading(mut source) => match Pin::new(&mut source).poll_next(cx) {
                    Poll::Pending => {
                        this.state = TransferState::Reading(source);
                        return Poll::Pending;
                    }
                    Poll::Ready(Some(Err(err))) => {
                        return Poll::Ready(Err(TransferError::Read(err)));
                    }
                    Poll::Ready(None) => {
                        return Poll::Ready(Err(TransferError::UnexpectedEof {
                            expected: this.total,
                            read: this.read,
                        }));
                    }
                    Poll::Ready(Some(Ok(chunk))) => {
                        this.read += chunk.len() as u64;
                        let chunk_start = this.sink.write_offset();
                        let status = this.sink.try_write(&chunk, this.total);
                        match this.after_write(status, source, chunk, chunk_start) {
                            Some(next) => next,
                            None => return Poll::Ready(Ok(TransferOutcome::Completed)),
                        }
                    }
                },

                TransferState::Backpressure {
                    source,
                    chunk,
                    chunk_start,
                } => match this.sink.poll_writable(cx) {
                    Poll::Pending => {
                        this.state = TransferState::Backpressure {
                            source,
                            chunk,
                            chunk_start,
                        };
                        return Poll::Pending;
                    }
                    Poll::Ready(offset) => {
                        // Only the tail the sink has not acknowledged yet is offered again.
                        let acked = offset.saturating_sub(chunk_start).min(chunk.len() as u64);
                        let tail = chunk.slice(acked as usize..);
                        trace!(offset, remaining = tail.len(), "sink writable, retrying");
                        let status = this.sink.try_write(&tail, this.total);
                        match this.after_write(status, source, chunk, chunk_start) {
                            Some(next) => next,
                            None => return Poll::Ready(Ok(TransferOutcome::Completed)),
                        }
                    }
                },

                TransferState::Done => unreachable!(),
            };
        }
    }
}
