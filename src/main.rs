use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod lock;

use provider_orchestrator::{config, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let command = args.get_command();

    if let cli::Commands::Version = command {
        println!("Provider Orchestrator v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let settings = config::load_settings(&args.config)?;
    init_tracing(&settings.logging);

    if let cli::Commands::Test { show } = command {
        return commands::test::execute(&args.config, &settings, show);
    }

    let state_path = args
        .state
        .clone()
        .unwrap_or_else(|| settings.storage.state_path.clone());
    let session = commands::Session::open(&settings, &state_path).await?;
    let facade = session.orchestrator.config();

    let result = match command {
        cli::Commands::Status => commands::status::execute(&facade).await,
        cli::Commands::Enable { id } => commands::provider::enable(&facade, &id).await,
        cli::Commands::Disable { id } => commands::provider::disable(&facade, &id).await,
        cli::Commands::SetCredential { id, credential } => {
            commands::provider::set_credential(&facade, &id, credential).await
        }
        cli::Commands::SetPriority { id, priority } => {
            commands::provider::set_priority(&facade, &id, priority).await
        }
        cli::Commands::SetQuota { id, limit } => {
            commands::provider::set_quota(&facade, &id, limit).await
        }
        cli::Commands::SetMaxErrors { id, max_errors } => {
            commands::provider::set_max_errors(&facade, &id, max_errors).await
        }
        cli::Commands::ResetQuota { id } => commands::provider::reset_quota(&facade, &id).await,
        cli::Commands::Routing {
            auto_fallback,
            fallback_to_local,
        } => commands::state::routing(&facade, auto_fallback, fallback_to_local).await,
        cli::Commands::Export { output } => commands::state::export(&facade, output).await,
        cli::Commands::Import { path } => commands::state::import(&facade, &path).await,
        cli::Commands::ResetDefaults => commands::state::reset_defaults(&facade).await,
        cli::Commands::Test { .. } | cli::Commands::Version => Ok(()),
    };

    session.close().await;
    result
}
