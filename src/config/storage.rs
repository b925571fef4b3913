use crate::config::schema::AppConfig;
use crate::error::{Result, VoxpilotError};
use std::fs;
use std::path::PathBuf;

/// Get the configuration file path. `VOXPILOT_CONFIG` overrides the
/// platform default.
pub fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("VOXPILOT_CONFIG") {
        return PathBuf::from(path);
    }

    dirs::config_dir()
        .map(|p| p.join("voxpilot"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.toml")
}

/// Load configuration from file, creating default if not exists.
pub fn load_config() -> Result<AppConfig> {
    let config_path = get_config_path();

    if !config_path.exists() {
        tracing::info!(
            "Config file not found at {:?}, creating default",
            config_path
        );
        return init_config();
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        VoxpilotError::Config(format!(
            "Failed to read config from {:?}: {}",
            config_path, e
        ))
    })?;

    let mut config: AppConfig = toml::from_str(&content)?;
    apply_env_overrides(&mut config);

    tracing::info!("Loaded config from {:?}", config_path);
    Ok(config)
}

/// Save configuration to file.
pub fn save_config(config: &AppConfig) -> Result<()> {
    let config_path = get_config_path();

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            VoxpilotError::Config(format!(
                "Failed to create config directory {:?}: {}",
                parent, e
            ))
        })?;
    }

    let content = toml::to_string_pretty(config)?;

    fs::write(&config_path, content).map_err(|e| {
        VoxpilotError::Config(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::info!("Saved config to {:?}", config_path);
    Ok(())
}

/// Initialize default configuration and save to file.
pub fn init_config() -> Result<AppConfig> {
    let mut config = AppConfig::default();
    save_config(&config)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Secrets may come from the environment instead of the config file.
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(key) = std::env::var("VOXPILOT_SPEECH_API_KEY") {
        if !key.is_empty() {
            config.speech.api_key = Some(key);
        }
    }
    if let Ok(key) = std::env::var("VOXPILOT_AGENT_API_KEY") {
        if !key.is_empty() {
            config.agent.api_key = Some(key);
        }
    }
    if let Ok(key) = std::env::var("VOXPILOT_API_KEY") {
        if !key.is_empty() {
            config.server.api_key = Some(key);
        }
    }
}
