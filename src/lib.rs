pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod facade;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod persistence;
pub mod provider;
pub mod recognition;
pub mod registry;
pub mod state;
pub mod tracker;

pub use config::Settings;
pub use context::Orchestrator;
pub use error::{InvokeError, OrchestratorError, OrchestratorResult};
pub use facade::ConfigFacade;
pub use orchestrator::CallOrchestrator;
pub use recognition::{InvokeTable, Recognition, RecognitionRequest, RecognitionResult};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging
///
/// `RUST_LOG` takes precedence over the configured level. Can only be called
/// once per process; later calls are ignored.
pub fn init_tracing(logging: &config::LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);

    let result = if logging.format == "json" {
        registry
            .with(fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    if let Err(e) = result {
        eprintln!("Warning: Failed to initialize tracing: {}", e);
    }
}
