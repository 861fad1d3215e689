use std::path::{Component, Path, PathBuf};

#[inline]
fn decode_percents(string: &str) -> String {
    percent_encoding::percent_decode_str(string)
        .decode_utf8_lossy()
        .into_owned()
}

/// Lexically resolve `.` and `..` segments without touching the filesystem.
///
/// `..` at the root stays at the root, like `path.resolve`-style resolution does.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.components()
        .fold(PathBuf::new(), |mut result, p| match p {
            Component::Normal(x) => {
                // Parse again to prevent a malicious component containing
                // a Windows drive letter, e.g.: `/anypath/c:/windows/win.ini`
                if Path::new(&x)
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)))
                {
                    result.push(x);
                }
                result
            }
            Component::ParentDir => {
                result.pop();
                result
            }
            Component::CurDir => result,
            Component::RootDir | Component::Prefix(_) => {
                result.push(p.as_os_str());
                result
            }
        })
}

/// Resolved request path.
#[derive(Debug)]
pub struct RequestedPath {
    /// Root-joined, normalized filesystem path of the request.
    pub full_path: PathBuf,
    /// Whether the path stays inside the root.
    pub is_contained: bool,
}

impl RequestedPath {
    /// Map a request path onto the (absolute, normalized) root.
    ///
    /// Returns `None` if the decoded path cannot name a file at all.
    pub fn resolve(root: &Path, request_path: &str, default_document: &str) -> Option<Self> {
        let decoded = decode_percents(request_path);
        if decoded.contains('\0') {
            return None;
        }

        let relative = match decoded.strip_prefix('/').unwrap_or(decoded.as_str()) {
            "" => default_document,
            rest => rest,
        };

        // Joining an absolute remainder replaces the root entirely; the
        // containment check below is what rejects it.
        let full_path = normalize_path(&root.join(relative));
        let is_contained = full_path.starts_with(root);
        Some(RequestedPath {
            full_path,
            is_contained,
        })
    }
}
