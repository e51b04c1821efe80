use async_trait::async_trait;

/// A long-running collaborator the engine starts and stops in registration order.
///
/// A plain start/stop/health contract; concrete implementations (HTTP listeners,
/// background workers, whatever a deployment wires in) are the caller's concern.
#[async_trait]
pub trait Service: Send + Sync {
    fn id(&self) -> &str;

    async fn start(&self) -> Result<(), String>;

    async fn stop(&self) -> Result<(), String>;

    async fn health(&self) -> Result<(), String>;
}

/// A read-only snapshot of what a service advertises, for operator introspection.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub id: String,
    pub name: String,
    pub capabilities: Vec<String>,
}
