//! The service registry: ordered start/stop with rollback, health aggregation, and
//! capability descriptors.

mod engine;
mod errors;
mod service;

pub use engine::{Engine, EngineState};
pub use errors::EngineError;
pub use service::{Service, ServiceDescriptor};
