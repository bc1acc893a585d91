use anyhow::Result;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use dbrouter_core::DbRouter;
use dbrouter_types::{ProviderRole, ProviderStatus, RouterStatus};

pub async fn handle_status(json: bool) -> Result<()> {
    let status = check_once().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}

pub async fn handle_check() -> Result<()> {
    let status = check_once().await?;
    print_status(&status);

    let master = status.master.as_ref().and_then(|name| status.providers.get(name));
    match master {
        Some(master) if master.status == ProviderStatus::Healthy => {
            println!("{} master '{}' is healthy", "✓".green(), master.name);
            Ok(())
        },
        Some(master) => anyhow::bail!("master '{}' is {}", master.name, master.status),
        None => anyhow::bail!("no master provider registered"),
    }
}

/// One health pass against the configured stores, then a clean disconnect.
async fn check_once() -> Result<RouterStatus> {
    let router = DbRouter::from_env()?;
    let status = router.check_health().await;
    router.shutdown().await;
    Ok(status)
}

fn print_status(status: &RouterStatus) {
    println!("{}", "dbrouter Status".cyan().bold());
    println!("  Master: {}", status.master.as_deref().unwrap_or("none"));
    println!(
        "  Sync queue: {} pending, {} synced, {} failed",
        status.sync_queue.pending, status.sync_queue.synced, status.sync_queue.failed
    );
    println!("  Version: {}", env!("CARGO_PKG_VERSION"));

    if status.providers.is_empty() {
        println!("{}", "No providers registered.".yellow());
        return;
    }
    println!("{}", provider_table(status));
}

pub(crate) fn provider_table(status: &RouterStatus) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_content_arrangement(ContentArrangement::Dynamic).set_header(
        vec!["Name", "Backend", "Role", "Status", "Priority", "Latency", "Failures"],
    );

    for provider in status.providers.values() {
        let status_color = match provider.status {
            ProviderStatus::Healthy => Color::Green,
            ProviderStatus::Unhealthy => Color::Red,
            ProviderStatus::Unknown => Color::Yellow,
        };
        let role = match provider.role {
            ProviderRole::Master => Cell::new("master").fg(Color::Cyan),
            ProviderRole::Slave => Cell::new("slave"),
        };
        let latency =
            provider.latency_ms.map_or_else(|| "-".to_string(), |ms| format!("{ms:.1} ms"));

        table.add_row(vec![
            Cell::new(&provider.name),
            Cell::new(&provider.backend),
            role,
            Cell::new(provider.status.to_string()).fg(status_color),
            Cell::new(provider.priority),
            Cell::new(latency),
            Cell::new(provider.failure_count),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::test_cluster;

    #[tokio::test]
    async fn test_provider_table_lists_every_provider() {
        let cluster = test_cluster().await;
        let status = cluster.state.router().status();

        let rendered = provider_table(&status).to_string();
        assert!(rendered.contains("master"));
        assert!(rendered.contains("slave"));
        assert!(rendered.contains("healthy"));
        assert!(rendered.contains("mock"));
    }
}
