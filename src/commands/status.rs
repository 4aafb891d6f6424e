use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use provider_orchestrator::logging::mask_credential;
use provider_orchestrator::provider::{ProviderStats, ProviderStatus};
use provider_orchestrator::ConfigFacade;

/// Execute the status command
///
/// Prints every provider with its usage and health, then the order a
/// request would try them in right now.
pub async fn execute(facade: &ConfigFacade) -> Result<()> {
    let snapshot = facade.snapshot().await;
    let stats = facade.all_stats().await;
    let eligible = facade.eligible().await;

    if stats.is_empty() {
        println!("{}", "No providers configured".yellow());
    } else {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        table.set_header(vec![
            Cell::new("ID").fg(Color::Cyan),
            Cell::new("NAME").fg(Color::Cyan),
            Cell::new("PRIORITY").fg(Color::Cyan),
            Cell::new("STATUS").fg(Color::Cyan),
            Cell::new("CREDENTIAL").fg(Color::Cyan),
            Cell::new("USAGE").fg(Color::Cyan),
            Cell::new("ERRORS").fg(Color::Cyan),
            Cell::new("LAST USED").fg(Color::Cyan),
            Cell::new("RESETS").fg(Color::Cyan),
        ]);

        for stat in &stats {
            let (priority, credential) = snapshot
                .providers
                .get(&stat.id)
                .map(|p| (p.priority.to_string(), mask_credential(&p.credential)))
                .unwrap_or_default();

            table.add_row(vec![
                Cell::new(&stat.id),
                Cell::new(&stat.name),
                Cell::new(priority),
                status_cell(stat),
                Cell::new(credential),
                Cell::new(format_usage(stat)),
                Cell::new(format!("{}/{}", stat.error_count, stat.max_errors)),
                Cell::new(format_timestamp(stat.last_used_at)),
                Cell::new(stat.quota_reset_at.format("%Y-%m-%d").to_string()),
            ]);
        }

        println!("{}", table);
    }

    println!();
    println!("{}", "Routing:".bold());
    println!("  {}: {}", "Auto fallback".cyan(), on_off(snapshot.auto_fallback));
    println!(
        "  {}: {}",
        "Fallback to local".cyan(),
        on_off(snapshot.fallback_to_local)
    );
    if let Some(current) = &snapshot.current_provider_id {
        println!("  {}: {}", "Last served by".cyan(), current);
    }

    println!();
    if eligible.is_empty() {
        println!("{}", "Selection order: (none eligible)".yellow());
    } else {
        let order: Vec<&str> = eligible.iter().map(|p| p.id.as_str()).collect();
        println!("{} {}", "Selection order:".bold(), order.join(" → "));
    }

    Ok(())
}

fn status_cell(stat: &ProviderStats) -> Cell {
    let color = match stat.status {
        ProviderStatus::Active => Color::Green,
        ProviderStatus::Disabled => Color::DarkGrey,
        ProviderStatus::QuotaExceeded => Color::Yellow,
        ProviderStatus::Error => Color::Red,
    };
    Cell::new(stat.status.as_str()).fg(color)
}

fn format_usage(stat: &ProviderStats) -> String {
    format!(
        "{}/{} ({:.1}%)",
        stat.used_count,
        stat.quota_limit,
        stat.usage_fraction * 100.0
    )
}

fn format_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string())
}

fn on_off(value: bool) -> colored::ColoredString {
    if value {
        "on".green()
    } else {
        "off".red()
    }
}
