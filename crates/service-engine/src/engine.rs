use crate::errors::EngineError;
use crate::service::{Service, ServiceDescriptor};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

struct Registered {
    service: Arc<dyn Service>,
    descriptor: ServiceDescriptor,
}

/// A registry of [`Service`]s, started in registration order and stopped in
/// reverse, with rollback-by-stop if any service fails to start.
pub struct Engine {
    services: RwLock<Vec<Registered>>,
    started: RwLock<bool>,
    state: RwLock<EngineState>,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            services: RwLock::new(Vec::new()),
            started: RwLock::new(false),
            state: RwLock::new(EngineState::Stopped),
        }
    }

    /// Register `service` under `descriptor`. Fails once [`Engine::start`] has run.
    pub fn register(&self, service: Arc<dyn Service>, descriptor: ServiceDescriptor) -> Result<(), EngineError> {
        if *self.started.read() {
            return Err(EngineError::RegisteredAfterStart(descriptor.id));
        }
        self.services.write().push(Registered { service, descriptor });
        Ok(())
    }

    /// Start every registered service in registration order. On the first
    /// failure, already-started services are stopped in reverse order before the
    /// error is returned.
    pub async fn start(&self) -> Result<(), EngineError> {
        *self.state.write() = EngineState::Starting;
        *self.started.write() = true;

        let services: Vec<Arc<dyn Service>> = self.services.read().iter().map(|r| r.service.clone()).collect();

        let mut started_ok = Vec::new();
        for service in &services {
            match service.start().await {
                Ok(()) => started_ok.push(service.clone()),
                Err(reason) => {
                    tracing::error!(service = service.id(), %reason, "service failed to start, rolling back");
                    for rollback in started_ok.iter().rev() {
                        if let Err(stop_err) = rollback.stop().await {
                            tracing::warn!(service = rollback.id(), error = %stop_err, "rollback stop failed");
                        }
                    }
                    return Err(EngineError::StartFailed {
                        id: service.id().to_string(),
                        reason,
                    });
                }
            }
        }

        *self.state.write() = EngineState::Running;
        tracing::info!("engine transitioned Starting -> Running");
        Ok(())
    }

    /// Stop every service in reverse registration order. Errors are collected but
    /// do not halt the sweep.
    pub async fn stop(&self) -> Result<(), EngineError> {
        *self.state.write() = EngineState::Stopping;

        let services: Vec<Arc<dyn Service>> = self.services.read().iter().map(|r| r.service.clone()).collect();

        let mut failed = Vec::new();
        for service in services.iter().rev() {
            if let Err(reason) = service.stop().await {
                tracing::warn!(service = service.id(), %reason, "service failed to stop");
                failed.push(service.id().to_string());
            }
        }

        *self.state.write() = EngineState::Stopped;
        tracing::info!("engine transitioned Stopping -> Stopped");

        if failed.is_empty() {
            Ok(())
        } else {
            Err(EngineError::StopFailed(failed))
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Service>> {
        self.services
            .read()
            .iter()
            .find(|r| r.descriptor.id == id)
            .map(|r| r.service.clone())
    }

    pub fn list(&self) -> Vec<String> {
        self.services.read().iter().map(|r| r.descriptor.id.clone()).collect()
    }

    pub async fn health(&self) -> Result<(), EngineError> {
        let services: Vec<Arc<dyn Service>> = self.services.read().iter().map(|r| r.service.clone()).collect();
        let mut unhealthy = Vec::new();
        for service in &services {
            if service.health().await.is_err() {
                unhealthy.push(service.id().to_string());
            }
        }
        if unhealthy.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Unhealthy(unhealthy))
        }
    }

    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.services.read().iter().map(|r| r.descriptor.clone()).collect()
    }

    pub fn state(&self) -> EngineState {
        *self.state.read()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Recorder {
        id: &'static str,
        order: Arc<RwLock<Vec<&'static str>>>,
        fail_start: bool,
        started: AtomicBool,
    }

    #[async_trait]
    impl Service for Recorder {
        fn id(&self) -> &str {
            self.id
        }

        async fn start(&self) -> Result<(), String> {
            if self.fail_start {
                return Err("boom".to_string());
            }
            self.started.store(true, Ordering::SeqCst);
            self.order.write().push(self.id);
            Ok(())
        }

        async fn stop(&self) -> Result<(), String> {
            self.order.write().push(self.id);
            Ok(())
        }

        async fn health(&self) -> Result<(), String> {
            if self.started.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err("not started".to_string())
            }
        }
    }

    fn descriptor(id: &str) -> ServiceDescriptor {
        ServiceDescriptor {
            id: id.to_string(),
            name: id.to_string(),
            capabilities: vec![],
        }
    }

    #[tokio::test]
    async fn starts_in_order_stops_in_reverse() {
        let engine = Engine::new();
        let order = Arc::new(RwLock::new(Vec::new()));

        for id in ["a", "b", "c"] {
            let service = Arc::new(Recorder {
                id,
                order: order.clone(),
                fail_start: false,
                started: AtomicBool::new(false),
            });
            engine.register(service, descriptor(id)).unwrap();
        }

        engine.start().await.unwrap();
        assert_eq!(*order.read(), vec!["a", "b", "c"]);

        order.write().clear();
        engine.stop().await.unwrap();
        assert_eq!(*order.read(), vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn failed_start_rolls_back_already_started_services() {
        let engine = Engine::new();
        let order = Arc::new(RwLock::new(Vec::new()));

        let a = Arc::new(Recorder {
            id: "a",
            order: order.clone(),
            fail_start: false,
            started: AtomicBool::new(false),
        });
        let b = Arc::new(Recorder {
            id: "b",
            order: order.clone(),
            fail_start: true,
            started: AtomicBool::new(false),
        });
        engine.register(a, descriptor("a")).unwrap();
        engine.register(b, descriptor("b")).unwrap();

        let err = engine.start().await.unwrap_err();
        assert!(matches!(err, EngineError::StartFailed { id, .. } if id == "b"));
        assert_eq!(*order.read(), vec!["a", "a"]);
    }

    #[tokio::test]
    async fn register_after_start_fails() {
        let engine = Engine::new();
        engine.start().await.unwrap();
        let service = Arc::new(Recorder {
            id: "late",
            order: Arc::new(RwLock::new(Vec::new())),
            fail_start: false,
            started: AtomicBool::new(false),
        });
        assert!(engine.register(service, descriptor("late")).is_err());
    }
}
