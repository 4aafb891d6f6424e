//! Typed wire schema for persisted and exported orchestrator state.
//!
//! Decoding is the data-repair step: raw JSON is checked structurally,
//! timestamps are parsed explicitly (RFC 3339 strings, or epoch
//! milliseconds written by older exports) and the result is validated before
//! it can replace live state. Encoding always writes RFC 3339 UTC with as
//! many fractional digits as needed, so export → import is lossless.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;
use crate::provider::{ProviderConfig, ProviderStatus};
use crate::registry::ProviderRegistry;
use crate::state::OrchestratorState;

/// Serialized timestamp as found on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimestampRepr {
    Rfc3339(String),
    EpochMillis(i64),
}

impl TimestampRepr {
    pub fn encode(value: DateTime<Utc>) -> Self {
        Self::Rfc3339(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn decode(&self, field: &str) -> Result<DateTime<Utc>, OrchestratorError> {
        match self {
            Self::Rfc3339(text) => DateTime::parse_from_rfc3339(text)
                .map(|value| value.with_timezone(&Utc))
                .map_err(|e| {
                    OrchestratorError::InvalidConfiguration(format!(
                        "{}: invalid timestamp '{}': {}",
                        field, text, e
                    ))
                }),
            Self::EpochMillis(millis) => Utc.timestamp_millis_opt(*millis).single().ok_or_else(|| {
                OrchestratorError::InvalidConfiguration(format!(
                    "{}: timestamp {} out of range",
                    field, millis
                ))
            }),
        }
    }
}

/// Provider record as persisted/exported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRecord {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub credential: String,
    pub quota_limit: u64,
    #[serde(default)]
    pub used_count: u64,
    pub priority: i64,
    #[serde(default)]
    pub last_used_at: Option<TimestampRepr>,
    pub status: ProviderStatus,
    #[serde(default)]
    pub error_count: u32,
    pub max_errors: u32,
    pub quota_reset_at: TimestampRepr,
}

/// Whole-state record as persisted/exported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    pub providers: Vec<ProviderRecord>,
    #[serde(default = "default_true")]
    pub auto_fallback: bool,
    #[serde(default = "default_true")]
    pub fallback_to_local: bool,
    #[serde(default)]
    pub current_provider_id: Option<String>,
}

fn default_true() -> bool {
    true
}

impl From<&ProviderConfig> for ProviderRecord {
    fn from(provider: &ProviderConfig) -> Self {
        Self {
            id: provider.id.clone(),
            name: provider.name.clone(),
            enabled: provider.enabled,
            credential: provider.credential.clone(),
            quota_limit: provider.quota_limit,
            used_count: provider.used_count,
            priority: provider.priority,
            last_used_at: provider.last_used_at.map(TimestampRepr::encode),
            status: provider.status,
            error_count: provider.error_count,
            max_errors: provider.max_errors,
            quota_reset_at: TimestampRepr::encode(provider.quota_reset_at),
        }
    }
}

impl TryFrom<ProviderRecord> for ProviderConfig {
    type Error = OrchestratorError;

    fn try_from(record: ProviderRecord) -> Result<Self, Self::Error> {
        if record.max_errors < 1 {
            return Err(OrchestratorError::InvalidConfiguration(format!(
                "provider '{}': maxErrors must be >= 1",
                record.id
            )));
        }

        let last_used_at = record
            .last_used_at
            .as_ref()
            .map(|ts| ts.decode(&format!("provider '{}' lastUsedAt", record.id)))
            .transpose()?;
        let quota_reset_at = record
            .quota_reset_at
            .decode(&format!("provider '{}' quotaResetAt", record.id))?;

        let mut provider = ProviderConfig {
            id: record.id,
            name: record.name,
            enabled: record.enabled,
            credential: record.credential,
            quota_limit: record.quota_limit,
            used_count: record.used_count,
            priority: record.priority,
            last_used_at,
            status: record.status,
            error_count: record.error_count,
            max_errors: record.max_errors,
            quota_reset_at,
        };
        // Hand-edited or legacy records may carry a status the counters contradict
        provider.reconcile_status();

        Ok(provider)
    }
}

impl From<&OrchestratorState> for StateRecord {
    fn from(state: &OrchestratorState) -> Self {
        Self {
            providers: state.providers.iter().map(ProviderRecord::from).collect(),
            auto_fallback: state.auto_fallback,
            fallback_to_local: state.fallback_to_local,
            current_provider_id: state.current_provider_id.clone(),
        }
    }
}

impl TryFrom<StateRecord> for OrchestratorState {
    type Error = OrchestratorError;

    fn try_from(record: StateRecord) -> Result<Self, Self::Error> {
        let providers = record
            .providers
            .into_iter()
            .map(ProviderConfig::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let providers =
            ProviderRegistry::from_providers(providers).map_err(OrchestratorError::InvalidConfiguration)?;

        let current_provider_id = match record.current_provider_id {
            Some(id) if providers.contains(&id) => Some(id),
            Some(id) => {
                tracing::warn!(provider = %id, "Dropping unknown currentProviderId");
                None
            }
            None => None,
        };

        Ok(Self {
            providers,
            auto_fallback: record.auto_fallback,
            fallback_to_local: record.fallback_to_local,
            current_provider_id,
        })
    }
}

/// Decode a JSON document into validated state
pub fn decode_state(input: &str) -> Result<OrchestratorState, OrchestratorError> {
    let value: serde_json::Value = serde_json::from_str(input)?;

    match value.get("providers") {
        Some(serde_json::Value::Array(_)) => {}
        Some(_) => {
            return Err(OrchestratorError::InvalidConfiguration(
                "'providers' must be a sequence".to_string(),
            ))
        }
        None => {
            return Err(OrchestratorError::InvalidConfiguration(
                "missing required field 'providers'".to_string(),
            ))
        }
    }

    let record: StateRecord = serde_json::from_value(value)?;
    OrchestratorState::try_from(record)
}

/// Encode state as pretty-printed JSON
pub fn encode_state(state: &OrchestratorState) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&StateRecord::from(state))
}
