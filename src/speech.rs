//! Speech-to-text client for the hosted recognition service.

use crate::config::SpeechConfig;
use crate::error::{Result, VoxpilotError};
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RecognitionResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<RecognitionAlternative>,
}

#[derive(Debug, Deserialize)]
struct RecognitionAlternative {
    transcript: String,
}

/// Thin client over the recognition HTTP endpoint.
pub struct SpeechClient {
    client: Client,
    config: SpeechConfig,
}

impl SpeechClient {
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Transcribe a recorded `audio/webm` clip. Joins the top alternative of
    /// every result segment with single spaces.
    pub async fn transcribe(&self, audio: Vec<u8>) -> Result<String> {
        let url = format!(
            "{}/v1/recognize?model={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "audio/webm")
            .body(audio);

        if let Some(api_key) = &self.config.api_key {
            // IAM-style key auth: basic with "apikey" user
            request = request.basic_auth("apikey", Some(api_key));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VoxpilotError::Speech(format!(
                "Recognition request failed with {}: {}",
                status, body
            )));
        }

        let parsed: RecognitionResponse = response
            .json()
            .await
            .map_err(|e| VoxpilotError::Speech(format!("Failed to parse response: {}", e)))?;

        let transcript = join_transcripts(&parsed);
        if transcript.is_empty() {
            return Err(VoxpilotError::NoSpeechDetected);
        }

        tracing::info!("Transcribed speech: {}", transcript);
        Ok(transcript)
    }
}

fn join_transcripts(response: &RecognitionResponse) -> String {
    response
        .results
        .iter()
        .filter_map(|r| r.alternatives.first())
        .map(|a| a.transcript.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
