//! Async I/O traits and utilities re-exported from Tokio.

pub use tokio::io::{
    copy, empty, AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite,
    AsyncWriteExt, BufReader, BufWriter, ReadBuf,
};

/// Boxed reader handed across bridge boundaries.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed writer handed across bridge boundaries.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
