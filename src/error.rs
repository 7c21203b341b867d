use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Failures of a single top-phrases search run.
///
/// Storage errors are fatal: a partially mapped store is indistinguishable
/// from a complete one, so no partial result is ever produced.
#[derive(Debug)]
pub enum SearchError {
    /// A filesystem operation on the counter store failed.
    Storage(io::Error),
    /// Two phrases of different length mapped to the same fingerprint.
    DigestCollision {
        path: PathBuf,
        stored_len: u64,
        new_len: u64,
    },
    /// Unusable caller input (unreadable source, bad separator).
    InvalidArgument(String),
}

impl SearchError {
    /// Storage error with the failing operation and path folded into the
    /// message, keeping the original `io::ErrorKind`.
    pub fn storage_context(context: &str, path: &std::path::Path, err: io::Error) -> SearchError {
        SearchError::Storage(io::Error::new(
            err.kind(),
            format!("{} \"{}\": {}", context, path.display(), err),
        ))
    }
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SearchError::Storage(err) => write!(f, "storage IO error: {}", err),
            SearchError::DigestCollision {
                path,
                stored_len,
                new_len,
            } => write!(
                f,
                "digest collision at \"{}\": stored {}B, new phrase {}B",
                path.display(),
                stored_len,
                new_len
            ),
            SearchError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SearchError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for SearchError {
    fn from(err: io::Error) -> SearchError {
        SearchError::Storage(err)
    }
}
