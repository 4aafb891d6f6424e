//! Recognition request/result types and the provider call seams.
//!
//! The orchestrator treats every provider as an opaque async operation:
//! it hands over the request and the provider's credential and gets back
//! either detections or an [`InvokeError`]. Network clients, SDKs and the
//! local image-analysis routine all live behind these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::InvokeError;

/// One image to recognize
#[derive(Clone, Debug)]
pub struct RecognitionRequest {
    /// Correlates log lines for the whole call chain
    pub request_id: Uuid,
    /// Encoded image bytes, shared cheaply between attempts
    pub image: Arc<[u8]>,
    /// e.g. "image/jpeg"
    pub mime_type: String,
    /// Upper bound on detections a provider should return
    pub max_results: Option<u32>,
}

impl RecognitionRequest {
    pub fn new(image: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            image: image.into(),
            mime_type: mime_type.into(),
            max_results: None,
        }
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }
}

/// Axis-aligned box in normalized image coordinates (0.0 - 1.0)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A single recognized object
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub label: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
            bounding_box: None,
        }
    }

    pub fn with_bounding_box(mut self, bounding_box: BoundingBox) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    pub detections: Vec<Detection>,
}

impl RecognitionResult {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Result handed back by the orchestrator
#[derive(Clone, Debug, PartialEq)]
pub struct Recognition {
    pub result: RecognitionResult,
    /// Provider that produced the result; `None` for the local path
    pub provider_id: Option<String>,
}

impl Recognition {
    pub fn from_provider(result: RecognitionResult, provider_id: impl Into<String>) -> Self {
        Self {
            result,
            provider_id: Some(provider_id.into()),
        }
    }

    pub fn local(result: RecognitionResult) -> Self {
        Self {
            result,
            provider_id: None,
        }
    }

    pub fn is_local_fallback(&self) -> bool {
        self.provider_id.is_none()
    }
}

/// Opaque per-provider call
///
/// Timeouts are the invoker's concern; to the orchestrator a timeout is just
/// another failed attempt.
#[async_trait]
pub trait ProviderInvoker: Send + Sync {
    async fn invoke(
        &self,
        request: &RecognitionRequest,
        credential: &str,
    ) -> Result<RecognitionResult, InvokeError>;
}

/// Adapter turning an async closure into a [`ProviderInvoker`]
///
/// ```
/// use provider_orchestrator::error::InvokeError;
/// use provider_orchestrator::recognition::{FnInvoker, RecognitionRequest, RecognitionResult};
///
/// let invoker = FnInvoker::new(|_request: RecognitionRequest, _credential: String| async move {
///     Ok::<_, InvokeError>(RecognitionResult::default())
/// });
/// # let _ = invoker;
/// ```
pub struct FnInvoker<F> {
    call: F,
}

impl<F> FnInvoker<F> {
    pub fn new(call: F) -> Self {
        Self { call }
    }
}

#[async_trait]
impl<F, Fut> ProviderInvoker for FnInvoker<F>
where
    F: Fn(RecognitionRequest, String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RecognitionResult, InvokeError>> + Send,
{
    async fn invoke(
        &self,
        request: &RecognitionRequest,
        credential: &str,
    ) -> Result<RecognitionResult, InvokeError> {
        (self.call)(request.clone(), credential.to_string()).await
    }
}

/// Invokers keyed by provider id, supplied per `execute` call
///
/// A provider without an entry is skipped as if it were ineligible.
#[derive(Clone, Default)]
pub struct InvokeTable {
    invokers: HashMap<String, Arc<dyn ProviderInvoker>>,
}

impl InvokeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration
    pub fn with(mut self, provider_id: impl Into<String>, invoker: Arc<dyn ProviderInvoker>) -> Self {
        self.insert(provider_id, invoker);
        self
    }

    /// Register `invoker` for `provider_id`, replacing any previous entry
    pub fn insert(&mut self, provider_id: impl Into<String>, invoker: Arc<dyn ProviderInvoker>) {
        self.invokers.insert(provider_id.into(), invoker);
    }

    pub fn get(&self, provider_id: &str) -> Option<&Arc<dyn ProviderInvoker>> {
        self.invokers.get(provider_id)
    }

    pub fn contains(&self, provider_id: &str) -> bool {
        self.invokers.contains_key(provider_id)
    }

    pub fn len(&self) -> usize {
        self.invokers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invokers.is_empty()
    }
}

impl fmt::Debug for InvokeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.invokers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("InvokeTable").field("providers", &ids).finish()
    }
}

/// Non-networked path used when no provider can serve a request
#[async_trait]
pub trait LocalFallback: Send + Sync {
    async fn recognize(&self, request: &RecognitionRequest) -> RecognitionResult;
}

/// Local fallback producing no detections
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyFallback;

#[async_trait]
impl LocalFallback for EmptyFallback {
    async fn recognize(&self, _request: &RecognitionRequest) -> RecognitionResult {
        RecognitionResult::default()
    }
}
