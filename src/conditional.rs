/// Outcome of the `If-Modified-Since` check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Send the file.
    Fresh,
    /// The client copy is current; answer 304.
    NotModified,
}

/// Compare the served `Last-Modified` value against a request's `If-Modified-Since`.
///
/// The comparison is exact string equality on the formatted date. Dates are not parsed, so a
/// semantically equal timestamp in another format is still `Fresh`.
pub fn check_freshness(last_modified: Option<&str>, if_modified_since: Option<&str>) -> Freshness {
    match (last_modified, if_modified_since) {
        (Some(served), Some(client)) if served == client => Freshness::NotModified,
        _ => Freshness::Fresh,
    }
}
