//! The caller-facing error taxonomy.
//!
//! Every variant maps to exactly one of a small fixed set of error kinds;
//! `kind()` is what an operator-facing transport (HTTP status, gRPC code) should
//! switch on instead of matching variants directly, so new internal error sources
//! can be added without widening the taxonomy callers see.

use trust_root::QuoteVerificationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    PermissionDenied,
    StateError,
    QuoteVerificationFailed,
    CryptoError,
    ResourceExhausted,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("coordinator is not in a state that accepts this operation: {0}")]
    StateError(String),

    #[error(transparent)]
    QuoteVerificationFailed(#[from] QuoteVerificationError),

    #[error("crypto error: {0}")]
    CryptoError(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("internal error (correlation_id={correlation_id})")]
    Internal { correlation_id: String },
}

impl CoordinatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoordinatorError::InvalidInput(_) => ErrorKind::InvalidInput,
            CoordinatorError::NotFound(_) => ErrorKind::NotFound,
            CoordinatorError::PermissionDenied => ErrorKind::PermissionDenied,
            CoordinatorError::StateError(_) => ErrorKind::StateError,
            CoordinatorError::QuoteVerificationFailed(_) => ErrorKind::QuoteVerificationFailed,
            CoordinatorError::CryptoError(_) => ErrorKind::CryptoError,
            CoordinatorError::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            CoordinatorError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Build an `internal` error with a correlation ID, logging the real cause at
    /// `error` level — `reason` is never included in the variant the caller sees,
    /// only the correlation ID, so untrusted callers never learn internal detail.
    pub fn internal(reason: impl std::fmt::Display) -> Self {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        tracing::error!(correlation_id = %correlation_id, %reason, "internal invariant violation");
        CoordinatorError::Internal { correlation_id }
    }
}

impl From<secret_manager::SecretManagerError> for CoordinatorError {
    fn from(err: secret_manager::SecretManagerError) -> Self {
        match err {
            secret_manager::SecretManagerError::Undefined(name) => CoordinatorError::NotFound(format!("secret '{name}'")),
            secret_manager::SecretManagerError::NotUserDefined(_) => CoordinatorError::InvalidInput(err.to_string()),
            secret_manager::SecretManagerError::NoCertificate(_) => CoordinatorError::NotFound(err.to_string()),
            secret_manager::SecretManagerError::InvalidDefinition { .. } => CoordinatorError::InvalidInput(err.to_string()),
            secret_manager::SecretManagerError::Generation { .. } => CoordinatorError::CryptoError(err.to_string()),
        }
    }
}

impl From<tls_manager::TlsManagerError> for CoordinatorError {
    fn from(err: tls_manager::TlsManagerError) -> Self {
        match err {
            tls_manager::TlsManagerError::Generation(_) => CoordinatorError::CryptoError(err.to_string()),
            tls_manager::TlsManagerError::NotFound(_) => CoordinatorError::NotFound(err.to_string()),
            tls_manager::TlsManagerError::CaLoad(_) => CoordinatorError::internal(err),
        }
    }
}

impl From<user_manager::UserManagerError> for CoordinatorError {
    fn from(err: user_manager::UserManagerError) -> Self {
        match err {
            user_manager::UserManagerError::UnknownCertificate => CoordinatorError::NotFound(err.to_string()),
            user_manager::UserManagerError::InvalidCertificate(_) => CoordinatorError::InvalidInput(err.to_string()),
            user_manager::UserManagerError::UnknownRole(_) => CoordinatorError::InvalidInput(err.to_string()),
        }
    }
}

impl From<recovery_manager::RecoveryManagerError> for CoordinatorError {
    fn from(err: recovery_manager::RecoveryManagerError) -> Self {
        match err {
            recovery_manager::RecoveryManagerError::InvalidPublicKey(..) => CoordinatorError::InvalidInput(err.to_string()),
            recovery_manager::RecoveryManagerError::ThresholdExceedsKeys { .. } => CoordinatorError::InvalidInput(err.to_string()),
            recovery_manager::RecoveryManagerError::NoRecoveryData(_) => CoordinatorError::NotFound(err.to_string()),
            recovery_manager::RecoveryManagerError::UnknownHolder(_) => CoordinatorError::InvalidInput(err.to_string()),
            recovery_manager::RecoveryManagerError::BelowThreshold { .. } => CoordinatorError::InvalidInput(err.to_string()),
            recovery_manager::RecoveryManagerError::ShareMismatch => CoordinatorError::CryptoError(err.to_string()),
            recovery_manager::RecoveryManagerError::Crypto(_) => CoordinatorError::CryptoError(err.to_string()),
        }
    }
}

impl From<trust_root::TrustRootError> for CoordinatorError {
    fn from(err: trust_root::TrustRootError) -> Self {
        CoordinatorError::CryptoError(err.to_string())
    }
}

impl From<Vec<manifest::ValidationError>> for CoordinatorError {
    fn from(errors: Vec<manifest::ValidationError>) -> Self {
        let joined = errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
        CoordinatorError::InvalidInput(joined)
    }
}
