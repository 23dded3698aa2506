//! `keepsake config` — Configuration management commands.

use keepsake_config::AppConfig;

pub fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ok  Config parsed and validated");

            if !config.has_api_key() {
                println!("   !   No API key set (set KEEPSAKE_API_KEY or ANTHROPIC_API_KEY)");
            }

            println!();
            println!("   Provider:        {}", config.provider.api_url);
            println!("   Model:           {}", config.provider.model);
            println!("   Batch window:    {} ms", config.batch.window_ms);
            println!("   Max fragments:   {}", config.batch.max_fragments);
            println!("   Max iterations:  {}", config.agent.max_iterations);
            println!("   Retry attempts:  {}", config.retry.max_attempts);
            println!("   Bot:             @{}", config.bot.username);
        }
        Err(e) => {
            println!("   error  {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

/// Render a config as TOML with the API key masked.
fn redacted_toml(config: &AppConfig) -> Result<String, toml::ser::Error> {
    let mut config = config.clone();
    if config.api_key.is_some() {
        config.api_key = Some("***".into());
    }
    toml::to_string_pretty(&config)
}

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", redacted_toml(&config)?);
    Ok(())
}

pub fn path() {
    println!("{}", AppConfig::config_dir().join("config.toml").display());
}

pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let dir = AppConfig::config_dir();
    let path = dir.join("config.toml");
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    std::fs::create_dir_all(&dir)?;
    std::fs::write(&path, AppConfig::default_toml())?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
