//! `huddle tools` / `huddle models`

use anyhow::{Context, Result};
use huddle_driver::ToolDriver;
use huddle_supervisor::HuddleContext;

pub fn list_tools(context: &HuddleContext) -> Result<()> {
    println!(
        "{:<10} {:<14} {:<10} {:<30} {}",
        "Tool", "Name", "Available", "Command", "Capabilities"
    );
    println!("{}", "-".repeat(100));

    for driver in context.registry().all() {
        let capabilities: Vec<&str> = driver
            .capabilities()
            .list()
            .into_iter()
            .map(|c| c.as_str())
            .collect();
        println!(
            "{:<10} {:<14} {:<10} {:<30} {}",
            driver.id(),
            driver.display_name(),
            if driver.is_available() { "yes" } else { "no" },
            driver.command().program.display(),
            capabilities.join(", ")
        );
    }

    println!();
    println!("Team:");
    for role in context.config().team_roles() {
        let assignment = context.config().role_assignment(role);
        match assignment.model {
            Some(model) => println!("  {:<10} {} ({})", role.as_str(), assignment.tool, model),
            None => println!("  {:<10} {}", role.as_str(), assignment.tool),
        }
    }
    Ok(())
}

pub async fn list_models(context: &HuddleContext, tool: &str) -> Result<()> {
    let driver = context.registry().get(tool)?;
    let models = driver
        .list_models()
        .await
        .with_context(|| format!("Failed to list models for {}", tool))?;

    if models.is_empty() {
        println!("{} reported no models.", driver.display_name());
        return Ok(());
    }
    for model in models {
        println!("{}", model);
    }
    Ok(())
}
