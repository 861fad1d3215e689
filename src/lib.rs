#![crate_name = "staticfile_stream"]
#![deny(missing_docs)]

//! Directory-scoped static file serving, streamed into a sink with backpressure.
//!
//! This library resolves request paths to files under a fixed root, answers `If-Modified-Since`
//! requests, and streams file bytes into a `Sink`: an abstraction over the client connection
//! that accepts writes, reports its write offset, signals writability and signals abort.
//!
//! ## Basic usage
//!
//! The `ServeDir` type holds the settings, and a `serve` method to answer one request on a sink.
//! It follows the builder pattern. With hyper, `serve_hyper` drives a `ChannelSink` on a spawned
//! task and returns a `hyper::Response`; `ServeDir` also implements `hyper::service::Service`.
//!
//! ```rust,no_run
//! # async fn example() -> std::io::Result<()> {
//! // Instance of `ServeDir` containing configuration.
//! let mut serve_dir = staticfile_stream::ServeDir::new("my/doc/root/")?;
//! serve_dir.read_only(true);
//!
//! // A dummy request, but normally obtained from Hyper.
//! let request = http::Request::get("/foo/bar.txt").body(()).unwrap();
//!
//! // Serve the request. The body streams in the background.
//! let response = serve_dir.serve_hyper(request).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Advanced usage
//!
//! `ServeDir` is a wrapper for `Resolver`, `ResponseBuilder` and `stream`:
//!
//! - `Resolver::resolve` turns a request path into a `ResolveResult`. Paths escaping the root are
//!   `Forbidden`, decided lexically before the filesystem is touched. Found files come with a
//!   `FileReference` carrying the size, content type and formatted modification time.
//! - `ResponseBuilder` writes the response head to the sink, handling `If-Modified-Since` (by
//!   exact comparison with `Last-Modified`) and `HEAD` requests.
//! - `stream` returns a `TransferSession`, a future that pulls chunks from the file and writes
//!   them to the sink. When the sink does not take a whole chunk, the file is paused until the
//!   sink is writable again, and only the unacknowledged tail is offered. An aborted sink releases
//!   the file immediately.
//!
//! Filesystem access goes through the `Vfs` trait, implemented by `TokioFs` and `MemoryFs`.

mod conditional;
mod error;
mod mime;
mod request;
mod resolve;
mod response_builder;
mod service;
mod sink;
mod transfer;
mod util;
mod vfs;

pub use crate::conditional::*;
pub use crate::error::*;
pub use crate::mime::*;
pub use crate::request::*;
pub use crate::resolve::*;
pub use crate::response_builder::*;
pub use crate::service::*;
pub use crate::sink::*;
pub use crate::transfer::*;
pub use crate::util::{channel, ChannelSink, FileBytesStream, SinkBody, SystemTimeHttp};
pub use crate::vfs::*;
