use std::{
    collections::HashMap,
    fs,
    future::Future,
    io::{Cursor, Error, ErrorKind},
    path::{Path, PathBuf},
    pin::Pin,
    task::{Context, Poll},
    time::SystemTime,
};

use futures_util::future::{ready, Ready};
use hyper::body::Bytes;
use tokio::{
    fs::File,
    task::{spawn_blocking, JoinHandle},
};

use crate::util::normalize_path;

/// Metadata of a filesystem entry, as needed to serve it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: Option<SystemTime>,
    /// Whether this is a regular file. Directories and special files are never served.
    pub is_file: bool,
}

/// Trait for a simple virtual filesystem layer.
///
/// The resolver uses `stat` to probe a path, and a transfer uses `open` to lazily open the file
/// it streams. Paths passed in are always absolute and already checked to be inside the root.
pub trait Vfs {
    /// File handle type.
    ///
    /// In order to stream files, the handle must implement `AsyncRead` and be `Unpin`.
    type File;

    /// Future type that `stat` returns.
    type StatFuture: Future<Output = Result<Option<FileStat>, Error>>;

    /// Future type that `open` returns.
    ///
    /// In order to stream files, this future must be `Unpin`.
    type OpenFuture: Future<Output = Result<Self::File, Error>>;

    /// Probe a path. Resolves to `None` if there is no entry at the path.
    fn stat(&self, path: &Path) -> Self::StatFuture;

    /// Open a file for reading.
    fn open(&self, path: &Path) -> Self::OpenFuture;
}

/// Filesystem implementation that uses `tokio`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFs;

impl Vfs for TokioFs {
    type File = File;
    type StatFuture = BlockingFuture<Option<FileStat>>;
    type OpenFuture = BlockingFuture<File>;

    fn stat(&self, path: &Path) -> Self::StatFuture {
        let path = path.to_path_buf();
        BlockingFuture {
            inner: spawn_blocking(move || match fs::metadata(path) {
                Ok(metadata) => Ok(Some(FileStat {
                    size: metadata.len(),
                    modified: metadata.modified().ok(),
                    is_file: metadata.is_file(),
                })),
                Err(err) if is_missing(&err) => Ok(None),
                Err(err) => Err(err),
            }),
        }
    }

    fn open(&self, path: &Path) -> Self::OpenFuture {
        let path = path.to_path_buf();
        BlockingFuture {
            inner: spawn_blocking(move || fs::File::open(path).map(File::from_std)),
        }
    }
}

/// A path component being a file instead of a directory means the entry is missing too.
fn is_missing(err: &Error) -> bool {
    matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}

/// Future type produced by `TokioFs`.
///
/// This type mostly exists just to prevent a `Box<dyn Future>`.
pub struct BlockingFuture<T> {
    inner: JoinHandle<Result<T, Error>>,
}

impl<T> Future for BlockingFuture<T> {
    type Output = Result<T, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // The task produces a result, but so does the `JoinHandle`, so this is a
        // `Result<Result<..>>`. We map the `JoinHandle` error to an IO error, so that we can
        // flatten the results.
        match Pin::new(&mut self.inner).poll(cx) {
            Poll::Ready(Ok(res)) => Poll::Ready(res),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::other("background task failed"))),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[derive(Debug, Clone)]
struct MemoryFile {
    data: Bytes,
    stat: FileStat,
}

/// An in-memory virtual filesystem.
///
/// Entries are keyed by absolute path. This type implements `Vfs`, and can be directly used in
/// `ServeDir::with_vfs`, for example.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: HashMap<PathBuf, MemoryFile>,
}

impl MemoryFs {
    /// Initialize a `MemoryFs` from a directory.
    ///
    /// This loads all files and their contents into memory, keyed by their absolute path.
    /// Symlinks are followed.
    pub async fn from_dir(path: impl AsRef<Path>) -> Result<Self, Error> {
        let mut fs = Self::default();
        let root = normalize_path(&std::path::absolute(path)?);

        let mut dirs = vec![root];
        while let Some(dir) = dirs.pop() {
            let mut iter = tokio::fs::read_dir(dir).await?;
            while let Some(entry) = iter.next_entry().await? {
                let metadata = tokio::fs::metadata(entry.path()).await?;
                if metadata.is_dir() {
                    dirs.push(entry.path());
                } else if metadata.is_file() {
                    let data = tokio::fs::read(entry.path()).await?;
                    fs.add(entry.path(), data.into(), metadata.modified().ok());
                }
            }
        }

        Ok(fs)
    }

    /// Add a file to the `MemoryFs`.
    ///
    /// This automatically creates directory entries leading up to the path. Any existing entries
    /// are overwritten.
    pub fn add(
        &mut self,
        path: impl AsRef<Path>,
        data: Bytes,
        modified: Option<SystemTime>,
    ) -> &mut Self {
        let path = normalize_path(path.as_ref());

        for dir in path.ancestors().skip(1) {
            self.files.insert(
                dir.to_path_buf(),
                MemoryFile {
                    data: Bytes::new(),
                    stat: FileStat {
                        size: 0,
                        modified: None,
                        is_file: false,
                    },
                },
            );
        }

        let size = data.len() as u64;
        self.files.insert(
            path,
            MemoryFile {
                data,
                stat: FileStat {
                    size,
                    modified,
                    is_file: true,
                },
            },
        );

        self
    }
}

impl Vfs for MemoryFs {
    type File = Cursor<Bytes>;
    type StatFuture = Ready<Result<Option<FileStat>, Error>>;
    type OpenFuture = Ready<Result<Self::File, Error>>;

    fn stat(&self, path: &Path) -> Self::StatFuture {
        ready(Ok(self.files.get(path).map(|file| file.stat)))
    }

    fn open(&self, path: &Path) -> Self::OpenFuture {
        ready(
            self.files
                .get(path)
                .filter(|file| file.stat.is_file)
                .map(|file| Cursor::new(file.data.clone()))
                .ok_or_else(|| Error::new(ErrorKind::NotFound, "Not found")),
        )
    }
}
