//! Error taxonomy for the annotation engine

use crate::data::{Entity, RecordId};

/// How an error should be surfaced to the user
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Expected and silent (superseded render, surface not mounted yet)
    Transient,
    /// Shown as a notification, prior state kept, retry possible
    Recoverable,
    /// Viewer stops issuing document operations until re-initialized
    Fatal,
}

/// Errors from the page rasterization backend
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RasterFault {
    #[error("render superseded by a newer request")]
    Superseded,

    #[error("page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: usize, count: usize },

    #[error("document handle already destroyed")]
    Destroyed,

    #[error("unsupported document: {0}")]
    Unsupported(String),

    #[error("rasterizer failed to initialize: {0}")]
    Init(String),

    #[error("rasterizer engine: {0}")]
    Engine(String),
}

impl RasterFault {
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    #[must_use]
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::Superseded => Severity::Transient,
            Self::Init(_) => Severity::Fatal,
            _ => Severity::Recoverable,
        }
    }
}

/// Errors from the record storage collaborator
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("{entity} #{id} not found")]
    NotFound { entity: Entity, id: RecordId },

    #[error("{0} records are not available")]
    Unavailable(Entity),

    #[error("storage rejected the operation: {0}")]
    Rejected(String),

    #[error("storage I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Errors surfaced by the viewer and its components
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("document viewer unavailable: {0}")]
    BackendUnavailable(String),

    #[error("no document is open")]
    NoDocument,

    #[error("failed to open document: {0}")]
    Document(#[source] RasterFault),

    #[error("failed to render page: {0}")]
    Raster(#[from] RasterFault),

    #[error("{0}")]
    Validation(String),

    #[error("nothing to assign: no pending region")]
    NoPendingRegion,

    #[error(transparent)]
    Data(#[from] DataError),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::BackendUnavailable(_) => Severity::Fatal,
            Self::Raster(fault) => fault.severity(),
            _ => Severity::Recoverable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superseded_is_transient() {
        assert_eq!(RasterFault::Superseded.severity(), Severity::Transient);
        assert_eq!(
            EngineError::from(RasterFault::Superseded).severity(),
            Severity::Transient
        );
    }

    #[test]
    fn init_failure_is_fatal() {
        assert_eq!(RasterFault::Init("x".into()).severity(), Severity::Fatal);
        assert_eq!(
            EngineError::BackendUnavailable("x".into()).severity(),
            Severity::Fatal
        );
    }

    #[test]
    fn data_errors_are_recoverable() {
        let err = EngineError::from(DataError::Rejected("locked".into()));
        assert_eq!(err.severity(), Severity::Recoverable);
        assert_eq!(err.to_string(), "storage rejected the operation: locked");
    }
}
