//! `keepsake tools` — print the tool schemas the model receives.

use keepsake_config::AppConfig;
use keepsake_core::provider::ToolDefinition;
use keepsake_tools::{ToolSettings, default_registry};

fn definitions(bot_username: &str, only: Option<&str>) -> Result<Vec<ToolDefinition>, String> {
    let registry = default_registry(&ToolSettings {
        bot_username: bot_username.to_string(),
    });
    let mut schemas = registry.schemas();
    if let Some(name) = only {
        schemas.retain(|d| d.name == name);
        if schemas.is_empty() {
            return Err(format!("No tool named '{name}'. Known tools: {}", registry.names().join(", ")));
        }
    }
    Ok(schemas)
}

pub fn run(name: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().unwrap_or_default();
    let schemas = definitions(&config.bot.username, name.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&schemas)?);
    Ok(())
}
