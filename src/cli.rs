use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "provider-orchestrator",
    version,
    about = "Recognition provider orchestrator"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "orchestrator.toml",
        env = "ORCHESTRATOR_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// State file path (overrides storage.state_path)
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show providers, usage and selection order (default)
    Status,

    /// Enable a provider and clear its error history
    Enable { id: String },

    /// Disable a provider
    Disable { id: String },

    /// Set a provider credential (empty string disables the provider)
    SetCredential { id: String, credential: String },

    /// Set selection priority (lower is tried first)
    SetPriority {
        id: String,
        #[arg(allow_hyphen_values = true)]
        priority: i64,
    },

    /// Set the per-period quota limit
    SetQuota { id: String, limit: u64 },

    /// Set consecutive failures tolerated before the provider is excluded
    SetMaxErrors { id: String, max_errors: u32 },

    /// Start a fresh quota period for a provider
    ResetQuota { id: String },

    /// Show or change routing flags
    Routing {
        /// Try the next provider when one fails
        #[arg(long)]
        auto_fallback: Option<bool>,

        /// Answer locally when no provider can serve a request
        #[arg(long)]
        fallback_to_local: Option<bool>,
    },

    /// Export the state as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace the state with an exported JSON document
    Import { path: PathBuf },

    /// Restore the configured provider defaults
    ResetDefaults,

    /// Test configuration file validity
    Test {
        /// Also print the resolved configuration (credentials masked)
        #[arg(long)]
        show: bool,
    },

    /// Show version information
    Version,
}

impl Cli {
    /// Get the command to execute, defaulting to Status if none provided
    pub fn get_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Status)
    }
}
