use std::{
    io::{Error as IoError, ErrorKind as IoErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::debug;

use crate::mime::{GuessMime, MimeLookup, OCTET_STREAM};
use crate::util::{normalize_path, RequestedPath, SystemTimeHttp};
use crate::vfs::{TokioFs, Vfs};

/// The default document served for a request of the root itself.
pub const DEFAULT_DOCUMENT: &str = "index.html";

/// A resolved, validated file inside the root.
///
/// Only ever constructed for paths that passed the containment check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    path: PathBuf,
    size: u64,
    content_type: String,
    last_modified: Option<String>,
}

impl FileReference {
    /// Absolute filesystem path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Content type derived from the file extension.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Modification time formatted as an HTTP date, if the filesystem reports one.
    pub fn last_modified(&self) -> Option<&str> {
        self.last_modified.as_deref()
    }
}

/// The result of `Resolver::resolve`.
///
/// Covers all the possible 'normal' scenarios encountered when serving static files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveResult {
    /// The requested path escapes the root.
    Forbidden,
    /// The requested file does not exist, or is a directory.
    NotFound,
    /// The requested file could not be accessed.
    PermissionDenied,
    /// The requested file was found.
    Found(FileReference),
}

/// Resolves request paths to files under a fixed root.
#[derive(Clone)]
pub struct Resolver<V = TokioFs> {
    root: PathBuf,
    default_document: String,
    mime_lookup: Arc<dyn MimeLookup + Send + Sync>,
    vfs: V,
}

impl Resolver<TokioFs> {
    /// Create a resolver for a root on the real filesystem.
    ///
    /// The root may be absolute or relative; a relative root is made absolute against the
    /// current directory here, once. If `Path::new("")` is given, files will be resolved from the
    /// current directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, IoError> {
        Self::with_vfs(root, TokioFs)
    }
}

impl<V> Resolver<V> {
    /// Create a resolver for a root on the given filesystem.
    pub fn with_vfs(root: impl Into<PathBuf>, vfs: V) -> Result<Self, IoError> {
        let mut root = root.into();
        if root.as_os_str().is_empty() {
            root.push(".");
        }
        Ok(Self {
            root: normalize_path(&std::path::absolute(root)?),
            default_document: DEFAULT_DOCUMENT.to_owned(),
            mime_lookup: Arc::new(GuessMime),
            vfs,
        })
    }

    /// The absolute, normalized root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The filesystem files are resolved on.
    pub fn vfs(&self) -> &V {
        &self.vfs
    }

    /// Set the document served for a request of the root itself.
    pub fn default_document(&mut self, name: impl Into<String>) -> &mut Self {
        self.default_document = name.into();
        self
    }

    /// Set the content type lookup.
    pub fn mime_lookup(&mut self, lookup: impl MimeLookup + Send + Sync + 'static) -> &mut Self {
        self.mime_lookup = Arc::new(lookup);
        self
    }

    fn content_type(&self, path: &Path) -> String {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.mime_lookup.lookup(ext))
            .unwrap_or_else(|| OCTET_STREAM.to_owned())
    }
}

impl<V: Vfs> Resolver<V> {
    /// Resolve the request path by trying to find the file in the root.
    ///
    /// The request path is percent-decoded, joined onto the root and lexically normalized. A
    /// result outside the root is `Forbidden`; this is decided before the filesystem is touched.
    /// Directories are never served, and resolve to `NotFound`.
    ///
    /// The returned future may error for unexpected IO errors, passing on the `std::io::Error`.
    /// Certain expected IO errors are handled, though, and simply reflected in the result.
    pub async fn resolve(&self, request_path: &str) -> Result<ResolveResult, IoError> {
        let Some(RequestedPath {
            full_path,
            is_contained,
        }) = RequestedPath::resolve(&self.root, request_path, &self.default_document)
        else {
            return Ok(ResolveResult::NotFound);
        };

        if !is_contained {
            debug!(request_path, "path escapes root");
            return Ok(ResolveResult::Forbidden);
        }

        let stat = match self.vfs.stat(&full_path).await {
            Ok(Some(stat)) => stat,
            Ok(None) => return Ok(ResolveResult::NotFound),
            Err(err) if err.kind() == IoErrorKind::PermissionDenied => {
                return Ok(ResolveResult::PermissionDenied)
            }
            Err(err) => return Err(err),
        };

        if !stat.is_file {
            return Ok(ResolveResult::NotFound);
        }

        Ok(ResolveResult::Found(FileReference {
            content_type: self.content_type(&full_path),
            last_modified: stat.modified.map(|time| time.to_http_date()),
            size: stat.size,
            path: full_path,
        }))
    }
}

/// Resolve the request path in the given root on the real filesystem.
///
/// Shorthand for `Resolver::new(root)?.resolve(request_path)`, with the default settings.
pub async fn resolve(
    root: impl Into<PathBuf>,
    request_path: &str,
) -> Result<ResolveResult, IoError> {
    Resolver::new(root)?.resolve(request_path).await
}
