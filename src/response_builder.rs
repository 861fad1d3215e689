use http::{header, HeaderValue, Method, StatusCode};
use tracing::debug;

use crate::conditional::{check_freshness, Freshness};
use crate::request::RequestContext;
use crate::resolve::{FileReference, ResolveResult};
use crate::sink::Sink;

/// Methods allowed when serving is restricted to read-only methods.
pub const ALLOWED_METHODS: &str = "GET, HEAD";

/// What remains to be done after the response head was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prepared {
    /// The response has been ended with the given status.
    Ended(StatusCode),
    /// The head is set; the file must be streamed as the body.
    Stream(StatusCode, FileReference),
}

/// Utility to build the response head for a resolved request.
///
/// This struct allows direct access to its fields, but these fields are typically initialized by
/// the accessors, using the builder pattern. It is typically a short-lived, per-request instance.
#[derive(Clone, Debug, Default)]
pub struct ResponseBuilder {
    /// Whether this is a `HEAD` request, with no response body.
    pub is_head: bool,
    /// The raw value of the `If-Modified-Since` request header.
    pub if_modified_since: Option<String>,
}

impl ResponseBuilder {
    /// Create a new builder with a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new builder for the given request.
    pub fn from_request<R: RequestContext + ?Sized>(req: &R) -> Self {
        let mut builder = Self::new();
        builder.method(req.method());
        builder.if_modified_since_header(req.header(&header::IF_MODIFIED_SINCE));
        builder
    }

    /// Build responses for the given request method.
    pub fn method(&mut self, value: &Method) -> &mut Self {
        self.is_head = *value == Method::HEAD;
        self
    }

    /// Build responses for the given `If-Modified-Since` request header value.
    pub fn if_modified_since_header(&mut self, value: Option<&str>) -> &mut Self {
        self.if_modified_since = value.map(str::to_owned);
        self
    }

    /// Build the response head for a `resolve` result.
    pub fn build<S: Sink>(&self, result: ResolveResult, sink: &mut S) -> Prepared {
        match result {
            ResolveResult::Found(file) => self.build_file(StatusCode::OK, file, sink),
            ResolveResult::NotFound => end(StatusCode::NOT_FOUND, sink),
            ResolveResult::Forbidden | ResolveResult::PermissionDenied => {
                end(StatusCode::FORBIDDEN, sink)
            }
        }
    }

    /// Build the response head for serving a file with the given status.
    ///
    /// Only `200 OK` responses are subject to the `If-Modified-Since` check.
    pub fn build_file<S: Sink>(
        &self,
        status: StatusCode,
        file: FileReference,
        sink: &mut S,
    ) -> Prepared {
        if status == StatusCode::OK
            && check_freshness(file.last_modified(), self.if_modified_since.as_deref())
                == Freshness::NotModified
        {
            debug!(path = %file.path().display(), "not modified");
            return end(StatusCode::NOT_MODIFIED, sink);
        }

        sink.set_status(status);
        if let Ok(value) = HeaderValue::from_str(file.content_type()) {
            sink.set_header(header::CONTENT_TYPE, value);
        }
        if let Some(value) = file.last_modified().and_then(|v| HeaderValue::from_str(v).ok()) {
            sink.set_header(header::LAST_MODIFIED, value);
        }

        if self.is_head {
            sink.set_header(header::CONTENT_LENGTH, HeaderValue::from(file.size()));
            sink.end_without_body();
            return Prepared::Ended(status);
        }

        Prepared::Stream(status, file)
    }

    /// Build a `405 Method Not Allowed` response.
    pub fn method_not_allowed<S: Sink>(&self, sink: &mut S) -> StatusCode {
        sink.set_status(StatusCode::METHOD_NOT_ALLOWED);
        sink.set_header(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
        sink.end_without_body();
        StatusCode::METHOD_NOT_ALLOWED
    }

    /// Build a `500 Internal Server Error` response, with the error as the body.
    ///
    /// Only valid while the sink has not taken any body bytes.
    pub fn internal_error<S: Sink>(
        &self,
        err: &dyn std::error::Error,
        sink: &mut S,
    ) -> StatusCode {
        sink.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        sink.set_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        sink.end(err.to_string().as_bytes());
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn end<S: Sink>(status: StatusCode, sink: &mut S) -> Prepared {
    sink.set_status(status);
    sink.end_without_body();
    Prepared::Ended(status)
}
