use anyhow::Result;
use colored::Colorize;
use provider_orchestrator::logging::mask_credential;
use provider_orchestrator::ConfigFacade;
use tracing::info;

pub async fn enable(facade: &ConfigFacade, id: &str) -> Result<()> {
    facade.enable(id).await?;
    report(facade, id, "enabled").await
}

pub async fn disable(facade: &ConfigFacade, id: &str) -> Result<()> {
    facade.disable(id).await?;
    report(facade, id, "disabled").await
}

pub async fn set_credential(facade: &ConfigFacade, id: &str, credential: String) -> Result<()> {
    let masked = mask_credential(&credential);
    facade.set_credential(id, credential).await?;
    report(facade, id, &format!("credential set to {}", masked)).await
}

pub async fn set_priority(facade: &ConfigFacade, id: &str, priority: i64) -> Result<()> {
    facade.set_priority(id, priority).await?;
    report(facade, id, &format!("priority set to {}", priority)).await
}

pub async fn set_quota(facade: &ConfigFacade, id: &str, limit: u64) -> Result<()> {
    facade.set_quota_limit(id, limit).await?;
    report(facade, id, &format!("quota limit set to {}", limit)).await
}

pub async fn set_max_errors(facade: &ConfigFacade, id: &str, max_errors: u32) -> Result<()> {
    facade.set_max_errors(id, max_errors).await?;
    report(facade, id, &format!("max errors set to {}", max_errors)).await
}

pub async fn reset_quota(facade: &ConfigFacade, id: &str) -> Result<()> {
    facade.reset_quota(id).await?;
    report(facade, id, "quota reset").await
}

/// Print the change and the status it left the provider in
async fn report(facade: &ConfigFacade, id: &str, change: &str) -> Result<()> {
    let stats = facade.stats(id).await?;

    println!("{} {}: {}", "✓".green(), id.bold(), change);
    println!(
        "  {}: {}  {}: {}/{}  {}: {}/{}",
        "Status".cyan(),
        stats.status,
        "Usage".cyan(),
        stats.used_count,
        stats.quota_limit,
        "Errors".cyan(),
        stats.error_count,
        stats.max_errors
    );

    info!(provider = %id, change = %change, "Provider updated from CLI");
    Ok(())
}
