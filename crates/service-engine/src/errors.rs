#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("service '{0}' registered after start(); registration must happen before start")]
    RegisteredAfterStart(String),

    #[error("no service registered with id '{0}'")]
    NotFound(String),

    #[error("service '{id}' failed to start: {reason}")]
    StartFailed { id: String, reason: String },

    #[error("one or more services failed to stop: {0:?}")]
    StopFailed(Vec<String>),

    #[error("one or more services reported unhealthy: {0:?}")]
    Unhealthy(Vec<String>),
}
