use crate::config::schema::{AiConfig, AppConfig};
use crate::error::{Result, VoxpilotError};

/// Validate the full configuration before serving.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.server.host.trim().is_empty() {
        return Err(VoxpilotError::Validation(
            "Server host cannot be empty".to_string(),
        ));
    }

    if config.agent.controller_url.trim().is_empty() {
        return Err(VoxpilotError::Validation(
            "Agent controller URL cannot be empty".to_string(),
        ));
    }

    if config.agent.poll_interval_ms == 0 {
        return Err(VoxpilotError::Validation(
            "Agent poll interval must be greater than zero".to_string(),
        ));
    }

    if config.agent.max_steps == 0 {
        return Err(VoxpilotError::Validation(
            "Agent max_steps must be greater than zero".to_string(),
        ));
    }

    validate_ai(&config.ai)
}

/// Validate provider entries and the default generator selection.
pub fn validate_ai(ai: &AiConfig) -> Result<()> {
    for (id, provider) in &ai.providers {
        if id.trim().is_empty() {
            return Err(VoxpilotError::Validation(
                "Provider id cannot be empty".to_string(),
            ));
        }
        if provider.base_url.trim().is_empty() {
            return Err(VoxpilotError::Validation(format!(
                "Provider '{}' has an empty base URL",
                id
            )));
        }
    }

    if let Some(selection) = &ai.default_generator {
        let (provider_id, model) = parse_selection(selection)?;
        if !ai.providers.contains_key(provider_id) {
            return Err(VoxpilotError::Validation(format!(
                "default_generator references unknown provider '{}'",
                provider_id
            )));
        }
        if model.is_empty() {
            return Err(VoxpilotError::Validation(format!(
                "default_generator '{}' has an empty model name",
                selection
            )));
        }
    }

    Ok(())
}

/// Split a "provider_id:model_name" selection.
pub fn parse_selection(selection: &str) -> Result<(&str, &str)> {
    match selection.split_once(':') {
        Some((provider, model)) if !provider.is_empty() => Ok((provider, model)),
        _ => Err(VoxpilotError::Validation(format!(
            "Invalid selection '{}'. Expected 'provider_id:model_name'",
            selection
        ))),
    }
}
