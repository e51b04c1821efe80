#[derive(Debug, thiserror::Error)]
pub enum SecretManagerError {
    #[error("secret '{0}' is not declared in the manifest")]
    Undefined(String),

    #[error("secret '{0}' is not user_defined and cannot be set directly")]
    NotUserDefined(String),

    #[error("secret '{0}' has no certificate material")]
    NoCertificate(String),

    #[error("invalid secret definition for '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("key generation failed for '{name}': {reason}")]
    Generation { name: String, reason: String },
}
