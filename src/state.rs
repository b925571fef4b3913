use crate::agent::AgentEngine;
use crate::config::AppConfig;
use crate::generator::GeneratorClient;
use crate::outbox::Outbox;
use crate::speech::SpeechClient;
use parking_lot::RwLock;
use std::sync::Arc;

/// Application global state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<AppConfig>>,
    pub outbox: Arc<Outbox>,
    pub engine: Arc<AgentEngine>,
    pub speech: Arc<SpeechClient>,
    pub generator: Arc<GeneratorClient>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let outbox = Arc::new(Outbox::new());
        let engine = Arc::new(AgentEngine::new(config.agent.clone(), Arc::clone(&outbox)));
        let speech = Arc::new(SpeechClient::new(config.speech.clone()));
        let generator = Arc::new(GeneratorClient::new(config.ai.clone()));
        Self {
            config: Arc::new(RwLock::new(config)),
            outbox,
            engine,
            speech,
            generator,
        }
    }
}
