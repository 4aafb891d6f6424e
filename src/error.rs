use thiserror::Error;

/// Failure reported by a single provider invocation.
///
/// The orchestrator does not look inside these: a timeout, a transport
/// failure and a rejected request are all the same "failed attempt" for
/// health bookkeeping purposes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    /// Upstream rejected or failed the request
    #[error("Upstream error: {0}")]
    Upstream(String),
    /// Invocation did not complete within the invoker's own deadline
    #[error("Timed out after {0} seconds")]
    Timeout(u64),
    /// Transport-level failure (connection refused, DNS, ...)
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Orchestrator error types
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// No provider passes eligibility and local fallback is disabled
    #[error("No providers available")]
    NoProvidersAvailable,

    /// A single provider failed while auto fallback is disabled
    #[error("Provider '{provider_id}' invocation failed: {source}")]
    ProviderInvocationFailed {
        provider_id: String,
        #[source]
        source: InvokeError,
    },

    /// Every eligible provider was tried and failed
    #[error("All providers failed (attempted: {})", attempted.join(", "))]
    AllProvidersFailed { attempted: Vec<String> },

    /// Import or update rejected; state left unchanged
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Caller aborted the in-flight attempt
    #[error("Request cancelled")]
    Cancelled,

    /// Mutator addressed an id that is not registered
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),
}

impl OrchestratorError {
    /// Stable machine-readable name for the error kind
    pub fn error_type_name(&self) -> &'static str {
        match self {
            Self::NoProvidersAvailable => "no_providers_available",
            Self::ProviderInvocationFailed { .. } => "provider_invocation_failed",
            Self::AllProvidersFailed { .. } => "all_providers_failed",
            Self::InvalidConfiguration(_) => "invalid_configuration",
            Self::Cancelled => "cancelled",
            Self::ProviderNotFound(_) => "provider_not_found",
        }
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfiguration(format!("JSON error: {}", err))
    }
}

/// Persistence gateway failures. Never fatal to the orchestrator.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Stored state rejected: {0}")]
    Decode(String),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
