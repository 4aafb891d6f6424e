use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::context::Shared;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::logging::sanitize_log_value;
use crate::recognition::{InvokeTable, Recognition, RecognitionRequest};
use crate::tracker::UsageTracker;

/// Drives one recognition request through the eligible providers.
///
/// Providers are tried strictly one at a time in eligibility order and the
/// first success wins. State is never locked across an invocation, so each
/// candidate is re-checked right before it is called: a provider that another
/// request pushed over quota or into `error` meanwhile is skipped.
#[derive(Clone)]
pub struct CallOrchestrator {
    shared: Arc<Shared>,
}

impl CallOrchestrator {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Execute `request` against the providers in `invokers`.
    ///
    /// Providers without an entry in `invokers` are skipped as if ineligible.
    /// Cancelling `cancel` aborts the in-flight invocation; nothing is
    /// recorded for it and `Cancelled` is returned.
    pub async fn execute(
        &self,
        request: &RecognitionRequest,
        invokers: &InvokeTable,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Recognition> {
        let span = tracing::info_span!("execute", request_id = %request.request_id);

        let result = self
            .execute_inner(request, invokers, cancel)
            .instrument(span)
            .await;

        if let Err(e) = &result {
            crate::metrics::record_error(e.error_type_name());
        }
        result
    }

    async fn execute_inner(
        &self,
        request: &RecognitionRequest,
        invokers: &InvokeTable,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Recognition> {
        if cancel.is_cancelled() {
            tracing::debug!("Request cancelled before selection");
            return Err(OrchestratorError::Cancelled);
        }

        let candidates = self.select_candidates(invokers).await;
        if candidates.is_empty() {
            return self.no_provider_result(request, "no_eligible").await;
        }

        tracing::debug!(candidates = ?candidates, "Selected provider candidates");

        let mut attempted = Vec::new();

        for provider_id in candidates {
            let Some(invoker) = invokers.get(&provider_id) else {
                continue;
            };

            // Another request may have tripped or exhausted it while we waited
            let credential = {
                let state = self.shared.read().await;
                match state.providers.get(&provider_id) {
                    Some(provider) if provider.is_eligible() => provider.credential.clone(),
                    _ => {
                        tracing::debug!(
                            provider = %provider_id,
                            "Skipping provider that is no longer eligible"
                        );
                        continue;
                    }
                }
            };

            tracing::debug!(provider = %provider_id, "Invoking provider");
            let start = Instant::now();

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(
                        provider = %provider_id,
                        "Request cancelled during provider invocation, outcome not recorded"
                    );
                    return Err(OrchestratorError::Cancelled);
                }
                outcome = invoker.invoke(request, &credential) => outcome,
            };

            let elapsed = start.elapsed();
            attempted.push(provider_id.clone());

            match outcome {
                Ok(result) => {
                    crate::metrics::record_attempt(&provider_id, "success", elapsed);
                    {
                        let mut state = self.shared.write().await;
                        UsageTracker::new(&mut state.providers).record_outcome(
                            &provider_id,
                            true,
                            Utc::now(),
                        );
                        state.current_provider_id = Some(provider_id.clone());
                        self.shared.persist(&state);
                    }

                    tracing::info!(
                        provider = %provider_id,
                        attempts = attempted.len(),
                        duration_ms = elapsed.as_millis(),
                        detections = result.detections.len(),
                        "Request served by provider"
                    );

                    return Ok(Recognition::from_provider(result, provider_id));
                }
                Err(e) => {
                    crate::metrics::record_attempt(&provider_id, "failure", elapsed);
                    let auto_fallback = {
                        let mut state = self.shared.write().await;
                        UsageTracker::new(&mut state.providers).record_outcome(
                            &provider_id,
                            false,
                            Utc::now(),
                        );
                        self.shared.persist(&state);
                        state.auto_fallback
                    };

                    tracing::warn!(
                        provider = %provider_id,
                        error = %sanitize_log_value(&e.to_string()),
                        duration_ms = elapsed.as_millis(),
                        auto_fallback = auto_fallback,
                        "Provider invocation failed"
                    );

                    if !auto_fallback {
                        return Err(OrchestratorError::ProviderInvocationFailed {
                            provider_id,
                            source: e,
                        });
                    }
                }
            }
        }

        if attempted.is_empty() {
            // Every candidate dropped out before it could be called
            return self.no_provider_result(request, "no_eligible").await;
        }

        let fallback_to_local = self.shared.read().await.fallback_to_local;
        if fallback_to_local {
            tracing::warn!(
                attempted = ?attempted,
                "All providers failed, using local fallback"
            );
            return Ok(self.local_result(request, "exhausted").await);
        }

        tracing::warn!(attempted = ?attempted, "All providers failed");
        Err(OrchestratorError::AllProvidersFailed { attempted })
    }

    /// Roll over due quota periods, then list eligible ids that have an invoker
    async fn select_candidates(&self, invokers: &InvokeTable) -> Vec<String> {
        let mut state = self.shared.write().await;

        let reset = UsageTracker::new(&mut state.providers).apply_due_resets(Utc::now());
        if !reset.is_empty() {
            tracing::info!(providers = ?reset, "Quota period rolled over");
            self.shared.persist(&state);
        }

        state
            .providers
            .eligible()
            .into_iter()
            .filter(|provider| {
                let registered = invokers.contains(&provider.id);
                if !registered {
                    tracing::debug!(provider = %provider.id, "No invoker registered, skipping");
                }
                registered
            })
            .map(|provider| provider.id.clone())
            .collect()
    }

    async fn no_provider_result(
        &self,
        request: &RecognitionRequest,
        reason: &'static str,
    ) -> OrchestratorResult<Recognition> {
        let fallback_to_local = self.shared.read().await.fallback_to_local;
        if fallback_to_local {
            tracing::info!("No eligible providers, using local fallback");
            Ok(self.local_result(request, reason).await)
        } else {
            tracing::warn!("No eligible providers and local fallback disabled");
            Err(OrchestratorError::NoProvidersAvailable)
        }
    }

    async fn local_result(&self, request: &RecognitionRequest, reason: &'static str) -> Recognition {
        crate::metrics::record_local_fallback(reason);
        let result = self.shared.local_fallback.recognize(request).await;
        Recognition::local(result)
    }
}
