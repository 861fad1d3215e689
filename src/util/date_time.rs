use std::time::SystemTime;

/// Extensions to `SystemTime` for HTTP.
pub trait SystemTimeHttp {
    /// Returns an HTTP format date string, such as `Sat, 26 Oct 1985 01:22:00 GMT`.
    fn to_http_date(&self) -> String;
}

impl SystemTimeHttp for SystemTime {
    fn to_http_date(&self) -> String {
        httpdate::fmt_http_date(*self)
    }
}
