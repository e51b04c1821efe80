#[derive(Debug, thiserror::Error)]
pub enum UserManagerError {
    #[error("no user matches the presented certificate")]
    UnknownCertificate,

    #[error("invalid certificate PEM: {0}")]
    InvalidCertificate(String),

    #[error("user '{0}' references an undeclared role")]
    UnknownRole(String),
}
