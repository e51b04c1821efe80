/// Errors raised directly by [`crate::TrustRoot`] (sealing and quote generation).
///
/// Quote *verification* failures use the more detailed
/// [`crate::QuoteVerificationError`] instead, since callers need the field
/// name/expected/actual triple preserved all the way up.
#[derive(Debug, thiserror::Error)]
pub enum TrustRootError {
    #[error("report data must be at most 64 bytes, got {0}")]
    ReportDataTooLong(usize),

    #[error("sealed blob is malformed: {0}")]
    MalformedSealedBlob(String),

    #[error("unsealing failed: authentication tag mismatch")]
    UnsealAuthenticationFailed,

    #[error("crypto error: {0}")]
    Crypto(String),
}
