use crate::error::{Result, VoxpilotError};
use serde::{Deserialize, Serialize};

/// Run options forwarded to the agent controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOptions {
    /// Run the browser headless
    #[serde(default)]
    pub headless: bool,
    /// Let the agent use the vision model on screenshots
    #[serde(default)]
    pub vision: bool,
    /// Maximum steps before the controller gives up
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            headless: false,
            vision: false,
            max_steps: default_max_steps(),
        }
    }
}

fn default_max_steps() -> u32 {
    20
}

/// Where a session sits in the login pause/resume cycle. A tagged value
/// instead of free flags, so at most one login sequence can be pending and
/// flag combinations like "awaiting credentials while idle" cannot exist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionPhase {
    /// No task running
    Idle,
    /// Agent is executing the task
    Running,
    /// Agent paused on a credential form; waiting for `continue` or `login`
    PausedForLogin { domain: String },
    /// User opted to supply credentials; waiting for "username password"
    AwaitingCredentials { domain: String },
}

impl SessionPhase {
    /// A task was accepted and handed to the controller.
    pub fn start(&self) -> Result<Self> {
        match self {
            SessionPhase::Idle => Ok(SessionPhase::Running),
            other => Err(VoxpilotError::Transition(format!(
                "cannot start a task from {:?}",
                other
            ))),
        }
    }

    /// The controller reported a credential form.
    pub fn intercept_login(&self, domain: &str) -> Result<Self> {
        match self {
            SessionPhase::Running => Ok(SessionPhase::PausedForLogin {
                domain: domain.to_string(),
            }),
            other => Err(VoxpilotError::Transition(format!(
                "login interception only applies to a running task, not {:?}",
                other
            ))),
        }
    }

    /// The user chose to type the credentials themselves.
    pub fn request_credentials(&self) -> Result<Self> {
        match self {
            SessionPhase::PausedForLogin { domain } => Ok(SessionPhase::AwaitingCredentials {
                domain: domain.clone(),
            }),
            other => Err(VoxpilotError::Transition(format!(
                "no login is pending in {:?}",
                other
            ))),
        }
    }

    /// Login resolved (credentials supplied or manual continue); task resumes.
    pub fn resume(&self) -> Result<Self> {
        match self {
            SessionPhase::PausedForLogin { .. } | SessionPhase::AwaitingCredentials { .. } => {
                Ok(SessionPhase::Running)
            }
            other => Err(VoxpilotError::Transition(format!(
                "cannot resume from {:?}",
                other
            ))),
        }
    }

    /// True while a login reply is expected from the user.
    pub fn login_pending(&self) -> bool {
        matches!(
            self,
            SessionPhase::PausedForLogin { .. } | SessionPhase::AwaitingCredentials { .. }
        )
    }

    pub fn domain(&self) -> Option<&str> {
        match self {
            SessionPhase::PausedForLogin { domain }
            | SessionPhase::AwaitingCredentials { domain } => Some(domain),
            _ => None,
        }
    }
}

/// One active run tracked by the engine.
#[derive(Debug, Clone)]
pub struct TaskSession {
    /// Engine-side session id
    pub id: String,
    /// Controller-side run id
    pub run_id: String,
    /// Instruction handed to the controller
    pub instruction: String,
    /// Run options
    pub options: TaskOptions,
    /// Login cycle phase
    pub phase: SessionPhase,
    /// Stop flag checked by the supervision loop
    pub should_stop: bool,
    /// Last event sequence consumed from the controller
    pub last_seq: u64,
    /// Start time
    pub started_at: std::time::Instant,
}

impl TaskSession {
    /// `phase` comes out of [`SessionPhase::start`], so every session enters
    /// the machine through the Idle -> Running edge.
    pub fn new(
        id: String,
        run_id: String,
        instruction: String,
        options: TaskOptions,
        phase: SessionPhase,
    ) -> Self {
        Self {
            id,
            run_id,
            instruction,
            options,
            phase,
            should_stop: false,
            last_seq: 0,
            started_at: std::time::Instant::now(),
        }
    }
}

/// Event emitted by the controller's polling endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The agent performed a step
    Step { seq: u64, message: String },
    /// Page analysis found a credential form; the run should be paused
    LoginRequired { seq: u64, domain: String },
    /// The run ended
    Finished {
        seq: u64,
        success: bool,
        #[serde(default)]
        summary: Option<String>,
    },
    /// Forward-compatible catch-all for event kinds this service ignores
    #[serde(other)]
    Unknown,
}

impl AgentEvent {
    pub fn seq(&self) -> u64 {
        match self {
            AgentEvent::Step { seq, .. }
            | AgentEvent::LoginRequired { seq, .. }
            | AgentEvent::Finished { seq, .. } => *seq,
            AgentEvent::Unknown => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transition_chain() {
        let phase = SessionPhase::Idle;
        let phase = phase.start().unwrap();
        assert_eq!(phase, SessionPhase::Running);
        let phase = phase.intercept_login("example.com").unwrap();
        assert_eq!(
            phase,
            SessionPhase::PausedForLogin {
                domain: "example.com".to_string()
            }
        );
        let phase = phase.request_credentials().unwrap();
        assert_eq!(phase.domain(), Some("example.com"));
        let phase = phase.resume().unwrap();
        assert_eq!(phase, SessionPhase::Running);
    }

    #[test]
    fn test_session_enters_through_start() {
        let phase = SessionPhase::Idle.start().unwrap();
        let session = TaskSession::new(
            "s-1".to_string(),
            "r-1".to_string(),
            "open example.com".to_string(),
            TaskOptions::default(),
            phase,
        );
        assert_eq!(session.phase, SessionPhase::Running);
        assert!(!session.should_stop);
        assert_eq!(session.last_seq, 0);
    }

    #[test]
    fn test_manual_continue_skips_credentials() {
        let phase = SessionPhase::PausedForLogin {
            domain: "example.com".to_string(),
        };
        assert_eq!(phase.resume().unwrap(), SessionPhase::Running);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        assert!(SessionPhase::Idle.intercept_login("x.com").is_err());
        assert!(SessionPhase::Idle.resume().is_err());
        assert!(SessionPhase::Running.request_credentials().is_err());
        assert!(SessionPhase::Running.start().is_err());

        // Double interception cannot happen: a paused session is not Running.
        let paused = SessionPhase::PausedForLogin {
            domain: "a.com".to_string(),
        };
        assert!(paused.intercept_login("b.com").is_err());
    }

    #[test]
    fn test_login_pending() {
        assert!(!SessionPhase::Idle.login_pending());
        assert!(!SessionPhase::Running.login_pending());
        assert!(SessionPhase::PausedForLogin {
            domain: "a".to_string()
        }
        .login_pending());
        assert!(SessionPhase::AwaitingCredentials {
            domain: "a".to_string()
        }
        .login_pending());
    }

    #[test]
    fn test_event_decoding() {
        let events: Vec<AgentEvent> = serde_json::from_str(
            r#"[
                {"kind": "step", "seq": 1, "message": "Navigated to example.com"},
                {"kind": "login_required", "seq": 2, "domain": "example.com"},
                {"kind": "telemetry", "seq": 3},
                {"kind": "finished", "seq": 4, "success": true, "summary": "done"}
            ]"#,
        )
        .unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].seq(), 1);
        assert!(matches!(events[1], AgentEvent::LoginRequired { .. }));
        assert!(matches!(events[2], AgentEvent::Unknown));
        assert!(matches!(
            events[3],
            AgentEvent::Finished { success: true, .. }
        ));
    }

    #[test]
    fn test_phase_serialization_shape() {
        let json = serde_json::to_value(SessionPhase::PausedForLogin {
            domain: "shop.example".to_string(),
        })
        .unwrap();
        assert_eq!(json["phase"], "paused_for_login");
        assert_eq!(json["domain"], "shop.example");
    }
}
