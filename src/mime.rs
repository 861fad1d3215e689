/// The content type used when an extension is missing or unrecognized.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Maps a file extension (without the leading dot) to a content type.
///
/// Implemented for closures, so a custom table can be injected with
/// `ServeDir::mime_lookup(|ext: &str| ...)`.
pub trait MimeLookup {
    /// Look up the content type for an extension.
    fn lookup(&self, extension: &str) -> Option<String>;
}

impl<F> MimeLookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn lookup(&self, extension: &str) -> Option<String> {
        self(extension)
    }
}

/// The default lookup, backed by `mime_guess`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuessMime;

impl MimeLookup for GuessMime {
    fn lookup(&self, extension: &str) -> Option<String> {
        mime_guess::from_ext(extension)
            .first_raw()
            .map(str::to_owned)
    }
}
