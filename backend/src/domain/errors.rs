use thiserror::Error;

/// Failure taxonomy for ledger operations. Every variant is local to the
/// single operation that raised it; there is no cross-operation retry.
/// Duplicate initial receipts are not an error (see
/// `CreateReceiptOutcome::DuplicateSuppressed`).
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Missing or invalid input, rejected before any write
    #[error("{0}")]
    Validation(String),

    /// The referenced row does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An identifier is already in use (member-number collision on restore
    /// or manual rename)
    #[error("{0}")]
    Conflict(String),

    /// Underlying storage failure
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        LedgerError::Conflict(message.into())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
