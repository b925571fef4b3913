use anyhow::Context;
use tracing_subscriber::EnvFilter;
use voxpilot::{api, config, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(
                "Failed to load config: {}. Using in-memory defaults (not saving).",
                e
            );
            let mut c = config::AppConfig::default();
            config::apply_env_overrides(&mut c);
            c
        }
    };

    config::validate_config(&config).context("invalid configuration")?;

    let state = AppState::new(config);
    api::run_server(state).await.context("server error")?;
    Ok(())
}
