mod body;
mod date_time;
mod file_bytes_stream;
mod requested_path;

pub use self::body::*;
pub use self::date_time::*;
pub use self::file_bytes_stream::*;

pub(crate) use self::requested_path::*;
