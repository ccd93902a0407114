use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("runtime unavailable at {endpoint}: {reason}")]
    RuntimeUnavailable {
        endpoint: String,
        reason:   String,
    },

    #[error("lookup of container {id} failed: {reason}")]
    ContainerLookupFailed {
        id:     String,
        reason: String,
    },

    #[error("cannot read {}: {source}", path.display())]
    TableUnreadable {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("metrics encoding failed: {0}")]
    Encode(#[from] prometheus::Error),
}

impl Error {
    pub fn unavailable(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Self::RuntimeUnavailable {
            endpoint: endpoint.into(),
            reason:   reason.to_string(),
        }
    }

    pub fn lookup(id: impl Into<String>, reason: impl ToString) -> Self {
        Self::ContainerLookupFailed {
            id:     id.into(),
            reason: reason.to_string(),
        }
    }
}
