use std::io;

/// Error taxonomy for the whole crate.
///
/// Per-entry failures during a scheduled operation (missing file, read
/// failure, digest mismatch) are downgraded to completion outcomes and never
/// surface through this type; everything that aborts an operation or a
/// parse does.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A requested operation failed to complete.
    #[error("operation failed")]
    Failed,
    /// An error in a lower-level system facility (thread start, wait anomaly).
    #[error("system error: {0}")]
    SystemError(&'static str),
    /// Error while performing file I/O.
    #[error("file i/o error: {0}")]
    FileIo(#[from] io::Error),
    /// Error in a lower-level hashing facility.
    #[error("hasher failure")]
    HasherFailure,
    /// Error while parsing a checksum file or digest string.
    #[error("parser error")]
    Parser,
    /// Error raised by an ffi-plugin.
    #[error("plugin error: {0}")]
    Plugin(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable numeric code, e.g. for result files and plugin boundaries.
    pub fn code(&self) -> i32 {
        match self {
            Error::Failed => 1,
            Error::SystemError(_) => 3,
            Error::FileIo(_) => 5,
            Error::HasherFailure => 10,
            Error::Parser => 11,
            Error::Plugin(_) => 12,
        }
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Error::Failed => Error::Failed,
            Error::SystemError(s) => Error::SystemError(s),
            Error::FileIo(e) => Error::FileIo(io::Error::new(e.kind(), e.to_string())),
            Error::HasherFailure => Error::HasherFailure,
            Error::Parser => Error::Parser,
            Error::Plugin(s) => Error::Plugin(s),
        }
    }
}

/// Terminate the process on a violated programmer invariant.
///
/// Reserved for conditions that indicate a bug in this crate or a plugin
/// host mismatch (ref-count underflow, impossible argument lengths). All
/// format and parse failures go through [`Error`] instead.
#[macro_export]
macro_rules! enforce {
    ($cond:expr) => {
        if !$cond {
            eprintln!(
                "qsfv: internal invariant violated at {}:{}: {}",
                file!(),
                line!(),
                stringify!($cond)
            );
            std::process::abort();
        }
    };
}
