use thiserror::Error;

/// Engine error surface. Each variant maps onto one class of the
/// management-API error contract.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad input at the API boundary (bad parameters, unknown blend mode,
    /// malformed schedule rule).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Name collision or exclusive-span conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A UDP send failed. Transient; counted per fixture, never fatal on
    /// its own.
    #[error("send failed: {0}")]
    Send(#[from] std::io::Error),

    /// The fixture address could not be resolved.
    #[error("unknown fixture '{0}'")]
    UnknownFixture(String),

    /// Invariant break inside the engine.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<lumen_fixtures::CatalogError> for EngineError {
    fn from(err: lumen_fixtures::CatalogError) -> Self {
        use lumen_fixtures::CatalogError;
        match err {
            CatalogError::Invalid(msg) => EngineError::Validation(msg),
            CatalogError::UnknownFixture(id) => EngineError::NotFound(format!("fixture '{}'", id)),
            CatalogError::UnknownGroup(id) => EngineError::NotFound(format!("group '{}'", id)),
            CatalogError::UnknownVirtual(id) => EngineError::NotFound(format!("virtual '{}'", id)),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
