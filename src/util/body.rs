use std::{
    collections::VecDeque,
    io::Error as IoError,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll, Waker},
};

use http::{header, HeaderName, HeaderValue, Response, StatusCode};
use hyper::body::{Bytes, Frame};
use tokio::sync::oneshot;

use crate::sink::{Sink, WriteStatus};

#[derive(Default)]
struct Shared {
    queue: VecDeque<Bytes>,
    buffered: usize,
    offset: u64,
    finished: bool,
    failed: bool,
    aborted: bool,
    body_waker: Option<Waker>,
    sink_waker: Option<Waker>,
}

impl Shared {
    fn wake_body(&mut self) {
        if let Some(waker) = self.body_waker.take() {
            waker.wake();
        }
    }

    fn wake_sink(&mut self) {
        if let Some(waker) = self.sink_waker.take() {
            waker.wake();
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Create a connected `ChannelSink` and `SinkBody`.
///
/// The sink buffers at most `capacity` body bytes that the body has not yet yielded. The
/// receiver resolves with the response head once the sink commits it, or errors if the sink
/// is dropped or terminated before that.
pub fn channel(capacity: usize) -> (ChannelSink, SinkBody, oneshot::Receiver<Response<()>>) {
    let (head_tx, head_rx) = oneshot::channel();
    let shared = Arc::new(Mutex::new(Shared::default()));
    let sink = ChannelSink {
        shared: shared.clone(),
        capacity: capacity.max(1),
        head: Response::new(()),
        head_tx: Some(head_tx),
    };
    (sink, SinkBody { shared }, head_rx)
}

/// A `Sink` feeding a `SinkBody` through a bounded in-memory queue.
///
/// Dropping the `SinkBody` is the abort signal.
pub struct ChannelSink {
    shared: Arc<Mutex<Shared>>,
    capacity: usize,
    head: Response<()>,
    head_tx: Option<oneshot::Sender<Response<()>>>,
}

impl ChannelSink {
    fn default_content_length(&mut self, len: u64) {
        if self.head_tx.is_some() && !self.head.headers().contains_key(header::CONTENT_LENGTH) {
            self.head
                .headers_mut()
                .insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        }
    }

    fn commit(&mut self) {
        if let Some(tx) = self.head_tx.take() {
            let head = std::mem::replace(&mut self.head, Response::new(()));
            if tx.send(head).is_err() {
                // Nobody is waiting for the response anymore.
                lock(&self.shared).aborted = true;
            }
        }
    }

    fn finish(&mut self, body: Option<Bytes>) {
        {
            let mut shared = lock(&self.shared);
            if let Some(body) = body.filter(|b| !b.is_empty()) {
                shared.buffered += body.len();
                shared.offset += body.len() as u64;
                shared.queue.push_back(body);
            }
            shared.finished = true;
            shared.wake_body();
        }
        self.commit();
    }
}

impl Sink for ChannelSink {
    fn set_status(&mut self, status: StatusCode) {
        *self.head.status_mut() = status;
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.head.headers_mut().insert(name, value);
    }

    fn end(&mut self, body: &[u8]) {
        if self.head_tx.is_some() {
            self.head
                .headers_mut()
                .insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        }
        self.finish(Some(Bytes::copy_from_slice(body)));
    }

    fn end_without_body(&mut self) {
        self.finish(None);
    }

    fn try_write(&mut self, chunk: &[u8], total_len: u64) -> WriteStatus {
        self.default_content_length(total_len);
        let status = {
            let mut shared = lock(&self.shared);
            if shared.aborted || shared.finished {
                return WriteStatus {
                    accepted: false,
                    complete: shared.finished,
                };
            }

            let room = self.capacity.saturating_sub(shared.buffered);
            let len = room.min(chunk.len());
            if len > 0 {
                shared.queue.push_back(Bytes::copy_from_slice(&chunk[..len]));
                shared.buffered += len;
                shared.offset += len as u64;
            }

            let complete = shared.offset >= total_len;
            shared.finished = complete;
            shared.wake_body();
            WriteStatus {
                accepted: len == chunk.len(),
                complete,
            }
        };
        // The head goes out with the first body bytes.
        if self.write_offset() > 0 || status.complete {
            self.commit();
        }
        status
    }

    fn write_offset(&self) -> u64 {
        lock(&self.shared).offset
    }

    fn poll_writable(&mut self, cx: &mut Context<'_>) -> Poll<u64> {
        let mut shared = lock(&self.shared);
        if shared.aborted {
            // Let the caller observe the abort on its next poll instead of writing again.
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        if shared.buffered < self.capacity {
            return Poll::Ready(shared.offset);
        }
        shared.sink_waker = Some(cx.waker().clone());
        Poll::Pending
    }

    fn poll_aborted(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        let mut shared = lock(&self.shared);
        if shared.aborted {
            return Poll::Ready(());
        }
        shared.sink_waker = Some(cx.waker().clone());
        Poll::Pending
    }

    fn terminate(&mut self) {
        // An uncommitted head is dropped here, which the receiver sees as an error.
        self.head_tx = None;
        let mut shared = lock(&self.shared);
        shared.failed = true;
        shared.wake_body();
    }
}

impl Drop for ChannelSink {
    fn drop(&mut self) {
        let mut shared = lock(&self.shared);
        if !shared.finished {
            shared.failed = true;
            shared.wake_body();
        }
    }
}

/// Hyper Body implementation fed by a `ChannelSink`.
pub struct SinkBody {
    shared: Arc<Mutex<Shared>>,
}

impl hyper::body::Body for SinkBody {
    type Data = Bytes;
    type Error = IoError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, IoError>>> {
        let mut shared = lock(&self.shared);
        if let Some(data) = shared.queue.pop_front() {
            shared.buffered -= data.len();
            shared.wake_sink();
            return Poll::Ready(Some(Ok(Frame::data(data))));
        }
        if shared.failed {
            return Poll::Ready(Some(Err(IoError::other("response body terminated"))));
        }
        if shared.finished {
            return Poll::Ready(None);
        }
        shared.body_waker = Some(cx.waker().clone());
        Poll::Pending
    }

    fn is_end_stream(&self) -> bool {
        let shared = lock(&self.shared);
        shared.finished && !shared.failed && shared.queue.is_empty()
    }
}

impl Drop for SinkBody {
    fn drop(&mut self) {
        let mut shared = lock(&self.shared);
        shared.aborted = true;
        shared.wake_sink();
    }
}
