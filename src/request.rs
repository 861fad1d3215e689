use http::{HeaderName, Method, Request};

/// The parts of an incoming request the responder reads.
pub trait RequestContext {
    /// The request path, without query string.
    fn path(&self) -> &str;

    /// The request method.
    fn method(&self) -> &Method;

    /// A header value, if present and valid UTF-8.
    fn header(&self, name: &HeaderName) -> Option<&str>;
}

impl<B> RequestContext for Request<B> {
    fn path(&self) -> &str {
        self.uri().path()
    }

    fn method(&self) -> &Method {
        Request::method(self)
    }

    fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers().get(name).and_then(|v| v.to_str().ok())
    }
}
