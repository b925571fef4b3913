use crate::agent::controller::ControllerClient;
use crate::agent::types::{AgentEvent, SessionPhase, TaskOptions, TaskSession};
use crate::config::AgentConfig;
use crate::error::{Result, VoxpilotError};
use crate::outbox::{Outbox, OutboundMessage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Coordinates controller runs: submission, event polling, the login
/// pause/resume cycle, and end-of-run cleanup.
pub struct AgentEngine {
    sessions: Arc<RwLock<HashMap<String, TaskSession>>>,
    /// Session currently being supervised; one run at a time.
    active: Arc<RwLock<Option<String>>>,
    controller: Arc<ControllerClient>,
    outbox: Arc<Outbox>,
    config: AgentConfig,
}

impl AgentEngine {
    pub fn new(config: AgentConfig, outbox: Arc<Outbox>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            active: Arc::new(RwLock::new(None)),
            controller: Arc::new(ControllerClient::new(config.clone())),
            outbox,
            config,
        }
    }

    /// True while a run is being supervised.
    pub async fn is_busy(&self) -> bool {
        self.active.read().await.is_some()
    }

    /// Phase of the active session, if any.
    pub async fn active_phase(&self) -> Option<SessionPhase> {
        let active = self.active.read().await;
        let id = active.as_ref()?;
        let sessions = self.sessions.read().await;
        sessions.get(id).map(|s| s.phase.clone())
    }

    /// True while the active session expects a login follow-up message.
    pub async fn login_pending(&self) -> bool {
        self.active_phase()
            .await
            .map(|p| p.login_pending())
            .unwrap_or(false)
    }

    /// Hand an instruction to the controller and supervise it in the
    /// background. Returns the new session id immediately.
    pub async fn submit(&self, instruction: String, options: TaskOptions) -> Result<String> {
        // New sessions enter the phase machine through the Idle -> Running edge.
        let phase = SessionPhase::Idle.start()?;

        {
            let mut active = self.active.write().await;
            if active.is_some() {
                return Err(VoxpilotError::Controller(
                    "A task is already running".to_string(),
                ));
            }
            // Reserve the slot before the controller call so two concurrent
            // submissions cannot both pass the check.
            *active = Some(String::new());
        }

        // The step limit comes from the config, not the request.
        let options = TaskOptions {
            max_steps: self.config.max_steps,
            ..options
        };

        let run_id = match self.controller.run(&instruction, &options).await {
            Ok(id) => id,
            Err(e) => {
                *self.active.write().await = None;
                return Err(e);
            }
        };

        let session_id = Uuid::new_v4().to_string();
        let session = TaskSession::new(
            session_id.clone(),
            run_id,
            instruction.clone(),
            options,
            phase,
        );

        {
            let mut sessions = self.sessions.write().await;
            sessions.insert(session_id.clone(), session);
        }
        *self.active.write().await = Some(session_id.clone());

        self.outbox
            .push_text(format!("Running instruction: {}", instruction));

        let sessions = Arc::clone(&self.sessions);
        let active = Arc::clone(&self.active);
        let controller = Arc::clone(&self.controller);
        let outbox = Arc::clone(&self.outbox);
        let config = self.config.clone();
        let id = session_id.clone();

        tokio::spawn(async move {
            Self::supervise(id, sessions, active, controller, outbox, config).await;
        });

        Ok(session_id)
    }

    /// Supervision wrapper: runs the polling loop, then performs cleanup on
    /// every exit path exactly once.
    async fn supervise(
        session_id: String,
        sessions: Arc<RwLock<HashMap<String, TaskSession>>>,
        active: Arc<RwLock<Option<String>>>,
        controller: Arc<ControllerClient>,
        outbox: Arc<Outbox>,
        config: AgentConfig,
    ) {
        let run_id = {
            let sessions = sessions.read().await;
            sessions.get(&session_id).map(|s| s.run_id.clone())
        };
        let Some(run_id) = run_id else {
            tracing::error!("Session {} vanished before supervision", session_id);
            *active.write().await = None;
            return;
        };

        let outcome = Self::poll_loop(
            &session_id,
            &run_id,
            &sessions,
            &controller,
            &outbox,
            &config,
        )
        .await;

        if let Err(e) = &outcome {
            tracing::error!("Supervision loop error: {}", e);
            outbox.push_text(format!("Agent error: {}", e));
        }

        // Cleanup: stop the controller run (idempotent on finished runs),
        // emit the recording artifact, release the session.
        if let Err(e) = controller.stop(&run_id).await {
            tracing::warn!("Controller stop during cleanup failed: {}", e);
        }

        match crate::media::gif_data_uri(&config.gif_path) {
            Ok(uri) => outbox.push(OutboundMessage::image(uri)),
            Err(e) => tracing::debug!("No run recording at {:?}: {}", config.gif_path, e),
        }

        {
            let mut sessions = sessions.write().await;
            sessions.remove(&session_id);
        }
        *active.write().await = None;
        tracing::info!(session_id = %session_id, "Session cleaned up");
    }

    /// Poll controller events until the run finishes or a stop is requested.
    async fn poll_loop(
        session_id: &str,
        run_id: &str,
        sessions: &Arc<RwLock<HashMap<String, TaskSession>>>,
        controller: &Arc<ControllerClient>,
        outbox: &Arc<Outbox>,
        config: &AgentConfig,
    ) -> Result<()> {
        let interval = tokio::time::Duration::from_millis(config.poll_interval_ms);
        let mut poll_failures: u32 = 0;

        loop {
            tokio::time::sleep(interval).await;

            let (should_stop, last_seq) = {
                let sessions = sessions.read().await;
                match sessions.get(session_id) {
                    Some(s) => (s.should_stop, s.last_seq),
                    None => return Ok(()),
                }
            };

            if should_stop {
                controller.stop(run_id).await?;
                outbox.push_text("Agent stopped.");
                return Ok(());
            }

            let events = match controller.events(run_id, last_seq).await {
                Ok(events) => {
                    poll_failures = 0;
                    events
                }
                Err(e) => {
                    poll_failures += 1;
                    tracing::warn!("Event poll failed ({}): {}", poll_failures, e);
                    if poll_failures >= 5 {
                        return Err(e);
                    }
                    continue;
                }
            };

            for event in events {
                let seq = event.seq();
                if seq > 0 {
                    let mut sessions = sessions.write().await;
                    if let Some(s) = sessions.get_mut(session_id) {
                        s.last_seq = seq;
                    }
                }

                match event {
                    AgentEvent::Step { message, .. } => {
                        outbox.push_text(message);
                    }
                    AgentEvent::LoginRequired { domain, .. } => {
                        Self::handle_login_required(
                            session_id, run_id, &domain, sessions, controller, outbox,
                        )
                        .await?;
                    }
                    AgentEvent::Finished {
                        success, summary, ..
                    } => {
                        if success {
                            outbox.push_text("Task completed successfully.");
                        } else {
                            outbox.push_text("Task failed.");
                        }
                        if let Some(summary) = summary {
                            outbox.push_text(summary);
                        }
                        return Ok(());
                    }
                    AgentEvent::Unknown => {}
                }
            }
        }
    }

    /// Pause the run and move the session into the login cycle.
    async fn handle_login_required(
        session_id: &str,
        run_id: &str,
        domain: &str,
        sessions: &Arc<RwLock<HashMap<String, TaskSession>>>,
        controller: &Arc<ControllerClient>,
        outbox: &Arc<Outbox>,
    ) -> Result<()> {
        let next = {
            let sessions = sessions.read().await;
            let session = sessions
                .get(session_id)
                .ok_or_else(|| VoxpilotError::SessionNotFound(session_id.to_string()))?;
            session.phase.intercept_login(domain)
        };

        let next = match next {
            Ok(next) => next,
            Err(e) => {
                // A second interception while already paused is a controller
                // replay; the pending sequence stays as-is.
                tracing::warn!("Ignoring login event: {}", e);
                return Ok(());
            }
        };

        controller.pause(run_id).await?;

        {
            let mut sessions = sessions.write().await;
            if let Some(session) = sessions.get_mut(session_id) {
                session.phase = next;
            }
        }

        outbox.push_text(format!(
            "Login required on {}. Reply 'login' to send credentials through chat, \
             or log in manually in the browser and reply 'continue'.",
            domain
        ));
        Ok(())
    }

    /// Route a follow-up chat message while a login sequence is pending.
    pub async fn handle_login_reply(&self, text: &str) -> Result<()> {
        let session_id = self
            .active
            .read()
            .await
            .clone()
            .ok_or_else(|| VoxpilotError::SessionNotFound("no active session".to_string()))?;

        let (phase, run_id) = {
            let sessions = self.sessions.read().await;
            let session = sessions
                .get(&session_id)
                .ok_or_else(|| VoxpilotError::SessionNotFound(session_id.clone()))?;
            (session.phase.clone(), session.run_id.clone())
        };

        let reply = text.trim();
        match &phase {
            SessionPhase::PausedForLogin { domain } => {
                if reply.eq_ignore_ascii_case("continue") {
                    self.resume_session(&session_id, &run_id, &phase).await?;
                } else if reply.eq_ignore_ascii_case("login") {
                    let next = phase.request_credentials()?;
                    self.set_phase(&session_id, next).await;
                    self.outbox.push_text(format!(
                        "Send your {} username and password separated by a space.",
                        domain
                    ));
                } else {
                    self.outbox.push_text(
                        "Waiting on the login. Reply 'login' to send credentials, or \
                         'continue' once you have logged in manually.",
                    );
                }
            }
            SessionPhase::AwaitingCredentials { domain } => {
                if reply.eq_ignore_ascii_case("continue") {
                    self.resume_session(&session_id, &run_id, &phase).await?;
                } else {
                    let mut parts = reply.split_whitespace();
                    match (parts.next(), parts.next(), parts.next()) {
                        (Some(username), Some(password), None) => {
                            self.controller
                                .add_task(
                                    &run_id,
                                    &credential_instruction(domain, username, password),
                                )
                                .await?;
                            self.resume_session(&session_id, &run_id, &phase).await?;
                        }
                        _ => {
                            self.outbox.push_text(
                                "Could not read those credentials. Send exactly \
                                 'username password', or reply 'continue'.",
                            );
                        }
                    }
                }
            }
            other => {
                return Err(VoxpilotError::Transition(format!(
                    "no login is pending in {:?}",
                    other
                )));
            }
        }
        Ok(())
    }

    async fn resume_session(
        &self,
        session_id: &str,
        run_id: &str,
        phase: &SessionPhase,
    ) -> Result<()> {
        let next = phase.resume()?;
        self.controller.resume(run_id).await?;
        self.set_phase(session_id, next).await;
        self.outbox.push_text("Resuming task...");
        Ok(())
    }

    async fn set_phase(&self, session_id: &str, phase: SessionPhase) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            session.phase = phase;
        }
    }

    /// Request the active run to stop; the supervision loop performs the
    /// actual controller stop and cleanup.
    pub async fn stop_active(&self) -> Result<()> {
        let session_id = self
            .active
            .read()
            .await
            .clone()
            .ok_or_else(|| VoxpilotError::SessionNotFound("no active session".to_string()))?;

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| VoxpilotError::SessionNotFound(session_id.clone()))?;
        session.should_stop = true;
        tracing::info!(session_id = %session_id, "Stop requested");
        Ok(())
    }
}

/// Instruction queued on the run so the agent fills the credential form.
fn credential_instruction(domain: &str, username: &str, password: &str) -> String {
    format!(
        "Enter the username '{}' and the password '{}' into the login form on {}, \
         submit it, then continue the original task.",
        username, password, domain
    )
}
