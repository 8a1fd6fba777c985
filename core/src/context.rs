use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::backend::ModelInvoker;
use crate::config::{AppConfig, ModelsConfig};
use crate::dispatch::{TaskError, TaskRegistry};
use crate::error::DispatchError;
use crate::jobs::{analyze_section, process_chat, ChatRequest, SectionRequest};
use crate::throttle::RequestManager;

/// Handle bundle captured by job futures.
///
/// Jobs never reach into the registry or the manager's internals; everything
/// they need travels in this clone.
#[derive(Clone)]
pub struct JobServices {
    pub throttle: Arc<RequestManager>,
    pub invoker: Arc<dyn ModelInvoker>,
    pub models: ModelsConfig,
    pub admission_timeout: Duration,
}

/// Process-wide service container, constructed once at startup and passed by
/// handle to whatever submits work. There is deliberately no global instance.
#[derive(Clone)]
pub struct AppContext {
    cfg: AppConfig,
    throttle: Arc<RequestManager>,
    registry: TaskRegistry,
    invoker: Arc<dyn ModelInvoker>,
}

impl AppContext {
    /// Build the services. Must be called from within a tokio runtime (the
    /// registry starts its background sweep here).
    pub fn new(cfg: AppConfig, invoker: Arc<dyn ModelInvoker>) -> Self {
        let throttle = Arc::new(RequestManager::new(&cfg.throttle));
        let registry = TaskRegistry::new(&cfg.dispatch);
        Self {
            cfg,
            throttle,
            registry,
            invoker,
        }
    }

    pub fn cfg(&self) -> &AppConfig {
        &self.cfg
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn throttle(&self) -> &Arc<RequestManager> {
        &self.throttle
    }

    pub fn job_services(&self) -> JobServices {
        JobServices {
            throttle: self.throttle.clone(),
            invoker: self.invoker.clone(),
            models: self.cfg.models.clone(),
            admission_timeout: Duration::from_secs(self.cfg.throttle.admission_timeout_secs),
        }
    }

    /// Queue a section analysis; returns the task id to poll.
    pub fn submit_analysis(&self, request: SectionRequest) -> Result<Uuid, DispatchError> {
        let services = self.job_services();
        self.registry.submit("analyze_section", async move {
            analyze_section(&services, &request)
                .await
                .map_err(TaskError::from)
        })
    }

    /// Queue a chat turn; returns the task id to poll.
    pub fn submit_chat(&self, request: ChatRequest) -> Result<Uuid, DispatchError> {
        let services = self.job_services();
        self.registry.submit("process_chat", async move {
            process_chat(&services, &request)
                .await
                .map_err(TaskError::from)
        })
    }

    /// Combined dispatch + throttle snapshot for an operational endpoint.
    pub fn health_snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "dispatch": self.registry.stats(),
            "throttle": self.throttle.snapshot(),
        })
    }

    /// Stop accepting new work; in-flight tasks finish and stay pollable.
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}
