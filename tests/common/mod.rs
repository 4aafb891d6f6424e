#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use provider_orchestrator::config::{ProviderSeed, RoutingConfig, Settings};
use provider_orchestrator::persistence::MemoryPersistence;
use provider_orchestrator::recognition::{
    Detection, LocalFallback, ProviderInvoker, RecognitionRequest, RecognitionResult,
};
use provider_orchestrator::{InvokeError, Orchestrator};

/// Seed with a credential so it starts active
pub fn seed(id: &str, priority: i64, quota_limit: u64) -> ProviderSeed {
    ProviderSeed {
        credential: format!("{}-key", id),
        ..ProviderSeed::new(id, &id.to_uppercase(), quota_limit, priority)
    }
}

pub fn settings(seeds: Vec<ProviderSeed>, auto_fallback: bool, fallback_to_local: bool) -> Settings {
    Settings {
        routing: RoutingConfig {
            auto_fallback,
            fallback_to_local,
        },
        providers: seeds,
        ..Settings::default()
    }
}

pub async fn start(settings: &Settings) -> (Orchestrator, Arc<MemoryPersistence>) {
    let persistence = Arc::new(MemoryPersistence::new());
    let orchestrator =
        Orchestrator::bootstrap(settings, persistence.clone(), Arc::new(LocalLabel)).await;
    (orchestrator, persistence)
}

pub fn request() -> RecognitionRequest {
    RecognitionRequest::new(vec![0x89, 0x50, 0x4E, 0x47], "image/png")
}

/// Local fallback tagging its single detection "local"
pub struct LocalLabel;

#[async_trait]
impl LocalFallback for LocalLabel {
    async fn recognize(&self, _request: &RecognitionRequest) -> RecognitionResult {
        RecognitionResult::new(vec![Detection::new("local", 0.1)])
    }
}

/// Invoker that always succeeds or always fails, counting its calls
pub struct StubInvoker {
    label: String,
    fail: bool,
    calls: AtomicUsize,
    credentials: Mutex<Vec<String>>,
}

impl StubInvoker {
    pub fn ok(label: &str) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            fail: false,
            calls: AtomicUsize::new(0),
            credentials: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            label: String::new(),
            fail: true,
            calls: AtomicUsize::new(0),
            credentials: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn credentials(&self) -> Vec<String> {
        self.credentials.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderInvoker for StubInvoker {
    async fn invoke(
        &self,
        _request: &RecognitionRequest,
        credential: &str,
    ) -> Result<RecognitionResult, InvokeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.credentials.lock().unwrap().push(credential.to_string());

        if self.fail {
            Err(InvokeError::Upstream("503 Service Unavailable".to_string()))
        } else {
            Ok(RecognitionResult::new(vec![Detection::new(&self.label, 0.95)]))
        }
    }
}
