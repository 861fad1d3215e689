use std::io::Error as IoError;

/// A failure while streaming a file body.
///
/// By the time one of these occurs, the response head is usually committed. The only recourse
/// is terminating the connection.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The file could not be opened.
    #[error("failed to open file: {0}")]
    Open(#[source] IoError),

    /// Reading from the file failed mid-stream.
    #[error("failed to read file: {0}")]
    Read(#[source] IoError),

    /// The file ended before the sink received the announced length.
    #[error("file ended after {read} of {expected} bytes")]
    UnexpectedEof {
        /// Announced body length.
        expected: u64,
        /// Bytes actually read from the file.
        read: u64,
    },
}
