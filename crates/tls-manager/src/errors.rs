#[derive(Debug, thiserror::Error)]
pub enum TlsManagerError {
    #[error("certificate generation failed: {0}")]
    Generation(String),

    #[error("no issued certificate found for uuid '{0}'")]
    NotFound(String),

    #[error("failed to load CA from sealed state: {0}")]
    CaLoad(String),
}
