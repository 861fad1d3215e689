use std::{
    future::Future,
    io::Error as IoError,
    path::{Path, PathBuf},
    pin::Pin,
};

use http::{Method, Request, Response, StatusCode};
use tokio::io::AsyncRead;
use tracing::{debug, error, warn};

use crate::mime::MimeLookup;
use crate::request::RequestContext;
use crate::resolve::{FileReference, ResolveResult, Resolver};
use crate::response_builder::{Prepared, ResponseBuilder};
use crate::sink::Sink;
use crate::transfer::{stream, TransferOutcome};
use crate::util::{channel, SinkBody};
use crate::vfs::{TokioFs, Vfs};

const DEFAULT_WRITE_BUFFER: usize = 64 * 1024;

/// How a request was answered by `ServeDir::serve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Served {
    /// The response was ended without streaming a file.
    Ended(StatusCode),
    /// A file was streamed as the body.
    Streamed(StatusCode, TransferOutcome),
    /// Streaming failed after the head was sent, and the connection was terminated.
    Terminated,
}

/// High-level interface for serving static files.
///
/// This struct serves files from a single root path, which may be absolute or relative. The
/// request is mapped onto the filesystem by appending its URL path to the root path. If the
/// filesystem path corresponds to a regular file, it is streamed to the client. A request for the
/// root itself serves the default document. Directories are never served.
///
/// This struct is configured using the builder pattern. It also implements the
/// `hyper::service::Service` trait, which wraps `ServeDir::serve_hyper`.
#[derive(Clone)]
pub struct ServeDir<V = TokioFs> {
    /// Resolver for request paths.
    pub resolver: Resolver<V>,
    /// Whether only `GET` and `HEAD` are served, with 405 for other methods.
    pub read_only: bool,
    /// Request path of a document to serve, with status 404, when a file is not found.
    pub not_found_document: Option<String>,
    /// Number of body bytes `serve_hyper` buffers before applying backpressure.
    pub write_buffer: usize,
}

impl ServeDir<TokioFs> {
    /// Create a new instance of `ServeDir` with a given root path.
    ///
    /// If `Path::new("")` is given, files will be served from the current directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, IoError> {
        Self::with_vfs(root, TokioFs)
    }
}

impl<V> ServeDir<V> {
    /// Create a new instance of `ServeDir` with a given root path and filesystem.
    pub fn with_vfs(root: impl Into<PathBuf>, vfs: V) -> Result<Self, IoError> {
        Ok(Self {
            resolver: Resolver::with_vfs(root, vfs)?,
            read_only: false,
            not_found_document: None,
            write_buffer: DEFAULT_WRITE_BUFFER,
        })
    }

    /// The absolute, normalized root path.
    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    /// Set the document served for a request of the root itself.
    pub fn default_document(&mut self, name: impl Into<String>) -> &mut Self {
        self.resolver.default_document(name);
        self
    }

    /// Set the content type lookup.
    pub fn mime_lookup(&mut self, lookup: impl MimeLookup + Send + Sync + 'static) -> &mut Self {
        self.resolver.mime_lookup(lookup);
        self
    }

    /// Restrict serving to `GET` and `HEAD` requests.
    pub fn read_only(&mut self, value: bool) -> &mut Self {
        self.read_only = value;
        self
    }

    /// Serve the given document, with status 404, for files that are not found.
    pub fn not_found_document(&mut self, value: Option<String>) -> &mut Self {
        self.not_found_document = value;
        self
    }

    /// Set the number of body bytes `serve_hyper` buffers before applying backpressure.
    pub fn write_buffer(&mut self, bytes: usize) -> &mut Self {
        self.write_buffer = bytes;
        self
    }
}

impl<V> ServeDir<V>
where
    V: Vfs,
    V::OpenFuture: Unpin,
    V::File: AsyncRead + Unpin,
{
    /// Serve a request into a sink.
    ///
    /// Every outcome is answered on the sink; nothing is returned as an error. A transfer that
    /// fails before the sink took any body bytes, such as a file that cannot be opened, is
    /// answered with 500. A failure after that terminates the sink instead of writing a new
    /// status.
    pub async fn serve<R, S>(&self, req: &R, sink: &mut S) -> Served
    where
        R: RequestContext + ?Sized,
        S: Sink,
    {
        let builder = ResponseBuilder::from_request(req);
        let method = req.method();
        let path = req.path();

        if self.read_only && !matches!(*method, Method::GET | Method::HEAD) {
            debug!(%method, path, "method not allowed");
            return Served::Ended(builder.method_not_allowed(sink));
        }

        let result = match self.resolver.resolve(path).await {
            Ok(result) => result,
            Err(err) => {
                error!(path, error = %err, "failed to resolve request");
                return Served::Ended(builder.internal_error(&err, sink));
            }
        };

        let prepared = match result {
            ResolveResult::NotFound => match self.resolve_not_found_document().await {
                Some(file) => builder.build_file(StatusCode::NOT_FOUND, file, sink),
                None => {
                    debug!(path, "not found");
                    builder.build(ResolveResult::NotFound, sink)
                }
            },
            result => builder.build(result, sink),
        };

        let (status, file) = match prepared {
            Prepared::Ended(status) => return Served::Ended(status),
            Prepared::Stream(status, file) => (status, file),
        };

        match stream(sink, self.resolver.vfs(), &file).await {
            Ok(outcome) => {
                debug!(path, ?outcome, "transfer finished");
                Served::Streamed(status, outcome)
            }
            // Nothing of the body was taken, so the head is still uncommitted.
            Err(err) if sink.write_offset() == 0 => {
                error!(path, error = %err, "transfer failed before the body started");
                Served::Ended(builder.internal_error(&err, sink))
            }
            Err(err) => {
                error!(path, error = %err, "transfer failed, terminating response");
                sink.terminate();
                Served::Terminated
            }
        }
    }

    async fn resolve_not_found_document(&self) -> Option<FileReference> {
        let document = self.not_found_document.as_deref()?;
        match self.resolver.resolve(document).await {
            Ok(ResolveResult::Found(file)) => Some(file),
            Ok(_) => {
                warn!(document, "not found document is not a servable file");
                None
            }
            Err(err) => {
                warn!(document, error = %err, "failed to resolve not found document");
                None
            }
        }
    }
}

impl<V> ServeDir<V>
where
    V: Vfs + Clone + Send + Sync + 'static,
    V::StatFuture: Send,
    V::OpenFuture: Unpin + Send,
    V::File: AsyncRead + Unpin + Send,
{
    /// Serve a hyper request.
    ///
    /// The response is streamed by a task spawned on the tokio runtime, writing through a
    /// `ChannelSink`. The returned future resolves once the response head is committed.
    pub async fn serve_hyper<B>(&self, req: Request<B>) -> Result<Response<SinkBody>, IoError> {
        let (parts, _) = req.into_parts();
        let req = Request::from_parts(parts, ());
        let (mut sink, body, head) = channel(self.write_buffer);

        let this = self.clone();
        tokio::spawn(async move {
            this.serve(&req, &mut sink).await;
        });

        let head = head
            .await
            .map_err(|_| IoError::other("response terminated before the head was sent"))?;
        let (parts, ()) = head.into_parts();
        Ok(Response::from_parts(parts, body))
    }
}

impl<V, B> hyper::service::Service<Request<B>> for ServeDir<V>
where
    V: Vfs + Clone + Send + Sync + 'static,
    V::StatFuture: Send,
    V::OpenFuture: Unpin + Send,
    V::File: AsyncRead + Unpin + Send,
    B: Send + 'static,
{
    type Response = Response<SinkBody>;
    type Error = IoError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, request: Request<B>) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { this.serve_hyper(request).await })
    }
}
