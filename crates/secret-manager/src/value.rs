use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// A sealing-safe snapshot of one secret's material, used when the Coordinator
/// persists its whole generation to sealed state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedSecret {
    pub private: Vec<u8>,
    pub cert_pem: Option<String>,
    pub key_pem: Option<String>,
    pub user_defined: bool,
}

/// Material held for a single secret. Private bytes and key PEM are wrapped in
/// [`Zeroizing`] so a drop (including on an error path) always scrubs them.
pub struct SecretValue {
    pub private: Zeroizing<Vec<u8>>,
    pub public: Option<Vec<u8>>,
    pub cert_pem: Option<String>,
    pub key_pem: Option<Zeroizing<String>>,
    pub user_defined: bool,
}

impl SecretValue {
    pub fn symmetric(bytes: Vec<u8>) -> Self {
        Self {
            private: Zeroizing::new(bytes),
            public: None,
            cert_pem: None,
            key_pem: None,
            user_defined: false,
        }
    }

    pub fn plain(bytes: Vec<u8>) -> Self {
        Self {
            private: Zeroizing::new(bytes),
            public: None,
            cert_pem: None,
            key_pem: None,
            user_defined: true,
        }
    }

    pub fn certificate(cert_pem: String, key_pem: String) -> Self {
        Self {
            private: Zeroizing::new(key_pem.clone().into_bytes()),
            public: Some(cert_pem.clone().into_bytes()),
            cert_pem: Some(cert_pem),
            key_pem: Some(Zeroizing::new(key_pem)),
            user_defined: false,
        }
    }
}
