#[derive(Debug, thiserror::Error)]
pub enum RecoveryManagerError {
    #[error("invalid RSA public key PEM for holder '{0}': {1}")]
    InvalidPublicKey(String, String),

    #[error("recovery threshold {threshold} exceeds the number of configured keys {key_count}")]
    ThresholdExceedsKeys { threshold: usize, key_count: usize },

    #[error("no recovery data has been generated for holder '{0}'")]
    NoRecoveryData(String),

    #[error("presented share is from an unknown holder: {0}")]
    UnknownHolder(String),

    #[error("{presented} shares presented, but the threshold is {threshold}")]
    BelowThreshold { presented: usize, threshold: usize },

    #[error("presented shares do not agree on the recovered sealing key")]
    ShareMismatch,

    #[error("RSA-OAEP failure: {0}")]
    Crypto(String),
}
