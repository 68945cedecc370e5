//! Catalog error types.
//!
//! This module defines the unified error type for all catalog operations,
//! covering both engine faults and registry/lifecycle rule violations.

use thiserror::Error;

/// Unified errors from catalog operations.
///
/// Used by the `SearchIndexProvider` trait, the registry, the lifecycle and
/// the page router. Every variant carries a status-like code (see
/// [`CatalogError::status_code`]) so callers can surface it unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// No matching context or page.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Ambiguous match under strict lookup, or a duplicate context.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Attempt to change a field that is fixed once a context is active.
    #[error("Field '{0}' cannot be changed once the context is active")]
    ImmutableField(String),

    /// The requested mapping definition does not exist.
    #[error("Mapping definition not found: {0}")]
    MappingNotFound(String),

    /// The engine (or the definition store) rejected a mapping.
    #[error("Mapping rejected: {0}")]
    MappingRejected(String),

    /// A physical index could not be created.
    #[error("Index creation failed for '{index}': {reason}")]
    IndexCreationFailed { index: String, reason: String },

    /// The engine rejected an alias put or delete.
    #[error("Alias '{alias}' rejected for index '{index}': {reason}")]
    AliasRejected {
        index: String,
        alias: String,
        reason: String,
    },

    /// The engine refused the request as malformed (e.g. an id lookup on an
    /// alias spanning several indices).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Input failed validation before reaching the engine.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Network or protocol fault talking to the engine.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// The call did not finish before its deadline.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The call was cancelled by its caller.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Failed to parse a response from the engine.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize a document for the engine.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl CatalogError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn immutable_field(field: impl Into<String>) -> Self {
        Self::ImmutableField(field.into())
    }

    pub fn mapping_not_found(name: impl Into<String>) -> Self {
        Self::MappingNotFound(name.into())
    }

    pub fn mapping_rejected(msg: impl Into<String>) -> Self {
        Self::MappingRejected(msg.into())
    }

    pub fn index_creation_failed(index: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IndexCreationFailed {
            index: index.into(),
            reason: reason.into(),
        }
    }

    pub fn alias_rejected(
        index: impl Into<String>,
        alias: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::AliasRejected {
            index: index.into(),
            alias: alias.into(),
            reason: reason.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Map a non-success engine status to an error.
    ///
    /// 5xx responses are transport faults (and therefore retried); 4xx
    /// responses are request faults and never are.
    ///
    /// # Arguments
    ///
    /// * `status` - The HTTP status returned by the engine
    /// * `operation` - What was being attempted, for the message
    /// * `body` - The response body, for the message
    pub fn from_status(status: u16, operation: &str, body: &str) -> Self {
        let msg = format!("{} failed with status {}: {}", operation, status, body);
        match status {
            400 => Self::BadRequest(msg),
            404 => Self::NotFound(msg),
            409 => Self::Conflict(msg),
            500..=599 => Self::TransportError(msg),
            _ => Self::BadRequest(msg),
        }
    }

    /// Status-like code for surfacing the error to API clients.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::ImmutableField(_) => 405,
            Self::MappingNotFound(_) => 404,
            Self::MappingRejected(_) => 400,
            Self::IndexCreationFailed { .. } => 500,
            Self::AliasRejected { .. } => 502,
            Self::BadRequest(_) => 400,
            Self::ValidationError(_) => 422,
            Self::TransportError(_) => 503,
            Self::Timeout(_) => 504,
            Self::Cancelled(_) => 499,
            Self::ParseError(_) => 502,
            Self::SerializationError(_) => 500,
        }
    }

    /// True for faults worth retrying: network trouble and timeouts.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransportError(_) | Self::Timeout(_))
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(
            CatalogError::from_status(400, "get", "bad"),
            CatalogError::BadRequest(_)
        ));
        assert!(matches!(
            CatalogError::from_status(404, "get", "missing"),
            CatalogError::NotFound(_)
        ));
        assert!(matches!(
            CatalogError::from_status(409, "index", "version conflict"),
            CatalogError::Conflict(_)
        ));
        assert!(matches!(
            CatalogError::from_status(503, "search", "unavailable"),
            CatalogError::TransportError(_)
        ));
        assert!(matches!(
            CatalogError::from_status(403, "search", "forbidden"),
            CatalogError::BadRequest(_)
        ));
    }

    #[test]
    fn test_only_transport_and_timeout_are_transient() {
        assert!(CatalogError::transport("reset").is_transient());
        assert!(CatalogError::timeout("slow").is_transient());
        assert!(!CatalogError::bad_request("bad").is_transient());
        assert!(!CatalogError::not_found("gone").is_transient());
        assert!(!CatalogError::mapping_rejected("nope").is_transient());
        assert!(!CatalogError::cancelled("stop").is_transient());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(CatalogError::not_found("x").status_code(), 404);
        assert_eq!(CatalogError::conflict("x").status_code(), 409);
        assert_eq!(CatalogError::immutable_field("name").status_code(), 405);
        assert_eq!(CatalogError::validation("x").status_code(), 422);
        assert_eq!(
            CatalogError::alias_rejected("lab1_v1", "meta", "x").status_code(),
            502
        );
    }

    #[test]
    fn test_messages_name_the_index() {
        let err = CatalogError::alias_rejected("lab1_v1", "meta", "forbidden");
        let msg = err.to_string();
        assert!(msg.contains("lab1_v1"));
        assert!(msg.contains("meta"));
    }
}
