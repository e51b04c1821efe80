//! The mesh manifest: a typed, serde-deserializable configuration document and its
//! referential-integrity validation pass.
//!
//! This crate is a pure data model — it never generates secrets, issues certs, or
//! mutates anything. Managers downstream consume a validated [`Manifest`] by value.

mod types;
mod validate;

pub use types::{
    extract_placeholder_names, CertConfig, Manifest, Marble, MarbleTls, Package, Parameters,
    Role, SecretDefinition, SecretType, TlsConfig, TlsPolicy, User,
};
pub use validate::{validate, ValidationError};
