use std::fmt;

#[non_exhaustive]
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Serde(serde_json::Error),
    InvalidUrl { url: String, reason: String },
    /// Reported by the runtime thread; the original error stays there.
    Backend(String),
    /// The runtime thread is gone.
    Disconnected,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "store io error: {err}"),
            StoreError::Serde(err) => write!(f, "store file is not valid: {err}"),
            StoreError::InvalidUrl { url, reason } => {
                write!(f, "invalid document url `{url}`: {reason}")
            }
            StoreError::Backend(reason) => write!(f, "store backend error: {reason}"),
            StoreError::Disconnected => write!(f, "store runtime is not running"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(err) => Some(err),
            StoreError::Serde(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serde(err)
    }
}
