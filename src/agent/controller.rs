//! HTTP client for the external browser-automation agent controller.
//! The controller owns the browser and the planning loop; this service only
//! drives its run/pause/resume/stop/add-task primitives.

use crate::agent::types::{AgentEvent, TaskOptions};
use crate::config::AgentConfig;
use crate::error::{Result, VoxpilotError};
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RunResponse {
    run_id: String,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: Vec<AgentEvent>,
}

pub struct ControllerClient {
    client: Client,
    config: AgentConfig,
}

impl ControllerClient {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.config.controller_url.trim_end_matches('/'),
            path
        )
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("X-API-Key", key),
            None => request,
        }
    }

    async fn check(&self, response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(VoxpilotError::Controller(format!(
            "{} failed with {}: {}",
            what, status, body
        )))
    }

    /// Start a run for the given instruction. Returns the controller run id.
    pub async fn run(&self, instruction: &str, options: &TaskOptions) -> Result<String> {
        let body = serde_json::json!({
            "task": instruction,
            "headless": options.headless,
            "vision": options.vision,
            "max_steps": options.max_steps,
        });
        let response = self
            .authed(self.client.post(self.url("/agent/run")).json(&body))
            .send()
            .await?;
        let response = self.check(response, "run").await?;
        let parsed: RunResponse = response
            .json()
            .await
            .map_err(|e| VoxpilotError::Controller(format!("Failed to parse response: {}", e)))?;
        tracing::info!(run_id = %parsed.run_id, "Controller run started");
        Ok(parsed.run_id)
    }

    pub async fn pause(&self, run_id: &str) -> Result<()> {
        let response = self
            .authed(
                self.client
                    .post(self.url(&format!("/agent/{}/pause", run_id))),
            )
            .send()
            .await?;
        self.check(response, "pause").await?;
        Ok(())
    }

    pub async fn resume(&self, run_id: &str) -> Result<()> {
        let response = self
            .authed(
                self.client
                    .post(self.url(&format!("/agent/{}/resume", run_id))),
            )
            .send()
            .await?;
        self.check(response, "resume").await?;
        Ok(())
    }

    pub async fn stop(&self, run_id: &str) -> Result<()> {
        let response = self
            .authed(
                self.client
                    .post(self.url(&format!("/agent/{}/stop", run_id))),
            )
            .send()
            .await?;
        self.check(response, "stop").await?;
        Ok(())
    }

    /// Queue a follow-up instruction on a run (used for credential entry).
    pub async fn add_task(&self, run_id: &str, task: &str) -> Result<()> {
        let body = serde_json::json!({ "task": task });
        let response = self
            .authed(
                self.client
                    .post(self.url(&format!("/agent/{}/task", run_id)))
                    .json(&body),
            )
            .send()
            .await?;
        self.check(response, "add_task").await?;
        Ok(())
    }

    /// Fetch events with sequence numbers greater than `after`.
    pub async fn events(&self, run_id: &str, after: u64) -> Result<Vec<AgentEvent>> {
        let response = self
            .authed(
                self.client
                    .get(self.url(&format!("/agent/{}/events", run_id)))
                    .query(&[("after", after)]),
            )
            .send()
            .await?;
        let response = self.check(response, "events").await?;
        let parsed: EventsResponse = response
            .json()
            .await
            .map_err(|e| VoxpilotError::Controller(format!("Failed to parse response: {}", e)))?;
        Ok(drop_replayed(parsed.events, after))
    }
}

/// Drop events at or below the last consumed sequence. Controllers restarted
/// mid-run can replay their whole log, and some honor `after` only loosely.
fn drop_replayed(events: Vec<AgentEvent>, after: u64) -> Vec<AgentEvent> {
    events.into_iter().filter(|e| e.seq() > after).collect()
}
