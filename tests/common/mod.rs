#![allow(dead_code)]

use std::{
    io::{Cursor, Error, ErrorKind},
    path::{Path, PathBuf},
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

use futures_util::future::{ready, Ready};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use hyper::body::Bytes;
use staticfile_stream::{FileStat, Sink, Vfs, WriteStatus};
use tokio::io::{AsyncRead, ReadBuf};

/// A scripted sink recording everything written to it.
#[derive(Default)]
pub struct RecordingSink {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub ended: bool,
    pub terminated: bool,
    /// Accept at most this many bytes per `try_write` call.
    pub per_call_limit: Option<usize>,
    /// Abort once this many `try_write` calls were made.
    pub abort_after_writes: Option<usize>,
    /// Answer every other `poll_writable` with `Pending`.
    pub delay_writable: bool,
    /// Report the whole body received after this many `try_write` calls.
    pub complete_after_writes: Option<usize>,
    pub aborted: bool,
    pub offset: u64,
    pub complete: bool,
    pub writes: usize,
    pub writes_after_abort: usize,
    pub writes_after_complete: usize,
    pub writable_polls: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            per_call_limit: Some(limit),
            delay_writable: true,
            ..Self::default()
        }
    }

    pub fn header(&self, name: HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl Sink for RecordingSink {
    fn set_status(&mut self, status: StatusCode) {
        assert!(!self.ended, "status set after end");
        self.status = Some(status);
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        assert!(!self.ended, "header set after end");
        self.headers.insert(name, value);
    }

    fn end(&mut self, body: &[u8]) {
        self.body.extend_from_slice(body);
        self.ended = true;
    }

    fn end_without_body(&mut self) {
        self.ended = true;
    }

    fn try_write(&mut self, chunk: &[u8], total_len: u64) -> WriteStatus {
        self.writes += 1;
        if self.aborted {
            self.writes_after_abort += 1;
        }
        if self.complete {
            self.writes_after_complete += 1;
        }

        let len = self.per_call_limit.map_or(chunk.len(), |l| l.min(chunk.len()));
        self.body.extend_from_slice(&chunk[..len]);
        self.offset += len as u64;
        self.complete =
            self.offset >= total_len || self.complete_after_writes == Some(self.writes);
        if self.complete {
            self.ended = true;
        }
        if self.abort_after_writes == Some(self.writes) {
            self.aborted = true;
        }

        WriteStatus {
            accepted: len == chunk.len(),
            complete: self.complete,
        }
    }

    fn write_offset(&self) -> u64 {
        self.offset
    }

    fn poll_writable(&mut self, cx: &mut Context<'_>) -> Poll<u64> {
        self.writable_polls += 1;
        if self.delay_writable && self.writable_polls % 2 == 1 {
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        Poll::Ready(self.offset)
    }

    fn poll_aborted(&mut self, _cx: &mut Context<'_>) -> Poll<()> {
        if self.aborted {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }

    fn terminate(&mut self) {
        self.terminated = true;
    }
}

/// Deterministic file contents of the given size.
pub fn pattern(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// A file that counts how often it is released, and can fail after some bytes.
pub struct CountingFile {
    inner: Cursor<Bytes>,
    fail_after: Option<u64>,
    drops: Arc<AtomicUsize>,
}

impl AsyncRead for CountingFile {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<Result<(), Error>> {
        if let Some(limit) = self.fail_after {
            if self.inner.position() >= limit {
                return Poll::Ready(Err(Error::new(ErrorKind::Other, "disk on fire")));
            }
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl Drop for CountingFile {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// A single-file filesystem handing out `CountingFile`s.
#[derive(Clone)]
pub struct CountingFs {
    pub path: PathBuf,
    pub data: Bytes,
    /// Size reported by `stat`, if different from the data length.
    pub announced_size: Option<u64>,
    pub fail_after: Option<u64>,
    /// Fail every `open` with this error kind, while `stat` still succeeds.
    pub open_error: Option<ErrorKind>,
    pub opens: Arc<AtomicUsize>,
    pub drops: Arc<AtomicUsize>,
}

impl CountingFs {
    pub fn new(path: impl Into<PathBuf>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
            announced_size: None,
            fail_after: None,
            open_error: None,
            opens: Arc::default(),
            drops: Arc::default(),
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

impl Vfs for CountingFs {
    type File = CountingFile;
    type StatFuture = Ready<Result<Option<FileStat>, Error>>;
    type OpenFuture = Ready<Result<CountingFile, Error>>;

    fn stat(&self, path: &Path) -> Self::StatFuture {
        ready(Ok((path == self.path).then(|| FileStat {
            size: self.announced_size.unwrap_or(self.data.len() as u64),
            modified: None,
            is_file: true,
        })))
    }

    fn open(&self, path: &Path) -> Self::OpenFuture {
        if path != self.path {
            return ready(Err(Error::new(ErrorKind::NotFound, "Not found")));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = self.open_error {
            return ready(Err(Error::new(kind, "access denied")));
        }
        ready(Ok(CountingFile {
            inner: Cursor::new(self.data.clone()),
            fail_after: self.fail_after,
            drops: self.drops.clone(),
        }))
    }
}
