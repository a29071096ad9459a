//! Error taxonomy for the tenant lifecycle manager.
//!
//! Every fallible operation in this crate returns [`TlmError`], a tagged
//! union rather than an exception hierarchy: callers branch on [`ErrorKind`]
//! instead of matching concrete variants when they only care about the
//! class of failure (client-caused, missing entity, invariant violation, or
//! "resource in use" signal).

use thiserror::Error;

/// The four-way failure taxonomy surfaced by every TLM operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Client-caused: duplicate tenant id, unknown action verb, interface
    /// version mismatch, dependency/conflict diagnostics, ...
    User,
    /// The addressed entity (tenant, module, interface) is absent.
    NotFound,
    /// Invariant violation or unexpected sub-system failure.
    Internal,
    /// A signal that isn't a failure of the caller's request so much as a
    /// fact about the world (e.g. "module still in use by tenant X").
    Any,
}

#[derive(Error, Debug)]
pub enum TlmError {
    #[error("{0}")]
    User(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("module {module_id} still in use by tenant {tenant_id}")]
    InUse { module_id: String, tenant_id: String },
}

impl TlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TlmError::User(_) => ErrorKind::User,
            TlmError::NotFound(_) => ErrorKind::NotFound,
            TlmError::Internal(_) => ErrorKind::Internal,
            TlmError::InUse { .. } => ErrorKind::Any,
        }
    }

    pub fn user(msg: impl Into<String>) -> Self {
        TlmError::User(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        TlmError::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        TlmError::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, TlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_maps_each_variant() {
        assert_eq!(TlmError::user("x").kind(), ErrorKind::User);
        assert_eq!(TlmError::not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(TlmError::internal("x").kind(), ErrorKind::Internal);
        assert_eq!(
            TlmError::InUse {
                module_id: "modA-1.0.0".into(),
                tenant_id: "t1".into(),
            }
            .kind(),
            ErrorKind::Any
        );
    }
}
