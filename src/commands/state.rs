use anyhow::{Context, Result};
use colored::Colorize;
use provider_orchestrator::ConfigFacade;
use std::path::{Path, PathBuf};
use tracing::info;

/// Show routing flags, updating any that were given
pub async fn routing(
    facade: &ConfigFacade,
    auto_fallback: Option<bool>,
    fallback_to_local: Option<bool>,
) -> Result<()> {
    if auto_fallback.is_some() || fallback_to_local.is_some() {
        facade.set_routing(auto_fallback, fallback_to_local).await;
        println!("{}", "✓ Routing updated".green());
    }

    let snapshot = facade.snapshot().await;
    println!("  {}: {}", "Auto fallback".cyan(), snapshot.auto_fallback);
    println!(
        "  {}: {}",
        "Fallback to local".cyan(),
        snapshot.fallback_to_local
    );

    Ok(())
}

/// Export the state as JSON to `output` or stdout.
///
/// The export carries provider credentials in full so it can be imported
/// again; treat the file as a secret.
pub async fn export(facade: &ConfigFacade, output: Option<PathBuf>) -> Result<()> {
    let document = facade.export_json().await?;

    match output {
        Some(path) => {
            tokio::fs::write(&path, document)
                .await
                .with_context(|| format!("Failed to write export: {:?}", path))?;
            eprintln!("{} {:?}", "✓ State exported to".green(), path);
            info!(path = ?path, "State exported");
        }
        None => println!("{}", document),
    }

    Ok(())
}

pub async fn import(facade: &ConfigFacade, path: &Path) -> Result<()> {
    let document = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read import: {:?}", path))?;

    facade
        .import_state(&document)
        .await
        .with_context(|| format!("Import of {:?} rejected, state unchanged", path))?;

    let snapshot = facade.snapshot().await;
    println!(
        "{} ({} providers)",
        "✓ State imported".green(),
        snapshot.providers.len()
    );
    Ok(())
}

pub async fn reset_defaults(facade: &ConfigFacade) -> Result<()> {
    facade.reset_to_defaults().await;

    let snapshot = facade.snapshot().await;
    println!(
        "{} ({} providers)",
        "✓ Providers reset to configured defaults".green(),
        snapshot.providers.len()
    );
    Ok(())
}
