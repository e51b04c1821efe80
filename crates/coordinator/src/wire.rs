//! Wire-agnostic request/response types for the Activate protocol. Any
//! transport (gRPC, HTTPS, an in-process call) carries these shapes; nothing here
//! assumes a specific wire encoding.

use crate::state::CoordinatorState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::SystemTime;

/// A point-in-time operator view of the coordinator, returned by `get_status`.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorStatus {
    pub state: CoordinatorState,
    pub failed_activations: u64,
    pub last_activation_at: Option<SystemTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationRequest {
    pub marble_name: String,
    pub uuid: String,
    pub quote: Vec<u8>,
    #[serde(default)]
    pub csr: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationResponse {
    pub secrets: BTreeMap<String, Vec<u8>>,
    pub env: BTreeMap<String, String>,
    pub files: BTreeMap<String, Vec<u8>>,
    #[serde(default)]
    pub certificate: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub root_ca: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ActivateError {
    #[error("coordinator is not accepting marble activations")]
    NotAcceptingMarbles,

    #[error("unknown marble '{0}'")]
    UnknownMarble(String),

    #[error("marble '{0}' has reached its max_activations limit")]
    MaxActivationsReached(String),

    #[error("quote verification failed: field={field} expected={expected} actual={actual}")]
    QuoteVerificationFailed {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("missing secret '{0}' declared by the marble")]
    MissingSecret(String),
}

impl From<trust_root::QuoteVerificationError> for ActivateError {
    fn from(err: trust_root::QuoteVerificationError) -> Self {
        ActivateError::QuoteVerificationFailed {
            field: err.field,
            expected: err.expected,
            actual: err.actual,
        }
    }
}
