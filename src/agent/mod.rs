pub mod controller;
pub mod engine;
pub mod types;

pub use controller::ControllerClient;
pub use engine::AgentEngine;
pub use types::{AgentEvent, SessionPhase, TaskOptions, TaskSession};
