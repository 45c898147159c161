//! Config command implementation.
//!
//! Manages the user configuration file. Environment overrides are shown by
//! `show`/`get` but never written back by `set`.

use anyhow::Result;
use rely_ops::Config;

/// Show current configuration.
pub fn show(config: &Config) -> Result<()> {
    println!("Rely Configuration");
    println!("{:-<40}", "");
    println!("Store Path:  {}", config.store_path.display());
    println!("Color:       {}", config.color);
    println!("Show Clean:  {}", config.show_clean);

    if let Some(config_path) = Config::config_file_path() {
        println!("\nConfig file: {}", config_path.display());
    }

    Ok(())
}

/// Set a configuration value.
pub fn set(key: &str, value: &str) -> Result<()> {
    let mut config = Config::from_file()?;
    if config.get(key).is_none() {
        anyhow::bail!(
            "Unknown config key: {}. Valid keys: {}",
            key,
            Config::KEYS.join(", ")
        );
    }
    config.set(key, value)?;
    config.save()?;
    println!("Set {} to: {}", key, value);
    Ok(())
}

/// Get a configuration value.
pub fn get(config: &Config, key: &str) -> Result<()> {
    match config.get(key) {
        Some(value) => println!("{}", value),
        None => anyhow::bail!(
            "Unknown config key: {}. Valid keys: {}",
            key,
            Config::KEYS.join(", ")
        ),
    }
    Ok(())
}

/// Reset configuration to defaults.
pub fn reset() -> Result<()> {
    Config::default().save()?;
    println!("Configuration reset to defaults");
    Ok(())
}
