//! Completion backend client (llama.cpp-compatible HTTP server)
//!
//! - Health: `GET /v1/models`, short timeout, advisory only
//! - Generate: `POST /v1/completions`, single bounded wait, non-streaming
//!
//! The availability state is shared by concurrent requests through an
//! atomic; every request still attempts generation regardless of it.

use reqwest::Client;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::config::GenerationConfig;
use crate::errors::{PipelineError, Result};
use crate::generation::fallback::{extractive_answer, TIMEOUT_MESSAGE};
use crate::generation::postprocess::clean_response;
use crate::generation::types::{
    AnswerSource, BackendState, Completion, CompletionRequest, CompletionResponse,
    GeneratedAnswer, GenerationParams,
};
use crate::rag::context::AssembledContext;
use crate::types::RankedDocuments;

#[derive(Debug)]
pub struct GenerationClient {
    client: Client,
    base_url: String,
    params: GenerationParams,
    request_timeout: Duration,
    health_timeout: Duration,
    state: AtomicU8,
    initialized: AtomicBool,
}

impl GenerationClient {
    /// Create client from the generation config section
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.health_timeout())
            .build()
            .map_err(PipelineError::Http)?;

        Ok(Self {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            params: GenerationParams::from(config),
            request_timeout: config.request_timeout(),
            health_timeout: config.health_timeout(),
            state: AtomicU8::new(BackendState::Unknown as u8),
            initialized: AtomicBool::new(true),
        })
    }

    /// Override both timeouts
    pub fn with_timeouts(mut self, request: Duration, health: Duration) -> Self {
        self.request_timeout = request;
        self.health_timeout = health;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sampling parameters from configuration
    pub fn default_params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn state(&self) -> BackendState {
        BackendState::from_u8(self.state.load(Ordering::Relaxed))
    }

    fn set_state(&self, state: BackendState) {
        let previous = BackendState::from_u8(self.state.swap(state as u8, Ordering::Relaxed));
        if previous != state {
            info!(from = ?previous, to = ?state, "Generation backend state changed");
        }
    }

    /// Skip the network entirely; every call fails as unavailable
    pub fn mark_uninitialized(&self) {
        self.initialized.store(false, Ordering::Relaxed);
        self.set_state(BackendState::Unavailable);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Relaxed)
    }

    /// Probe `GET /v1/models`; updates the availability state
    pub async fn health_check(&self) -> bool {
        if !self.is_initialized() {
            return false;
        }

        let url = format!("{}/v1/models", self.base_url);
        let healthy = match self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Health check failed");
                false
            }
        };

        self.set_state(if healthy {
            BackendState::Healthy
        } else {
            BackendState::Unavailable
        });
        healthy
    }

    /// Request one completion and post-process it
    ///
    /// Any failure moves the state to `Unavailable`; a successful call moves
    /// it back to `Healthy`. An empty post-processed text is still `Ok`.
    #[instrument(skip_all, fields(prompt_chars = prompt.len(), max_tokens = params.max_tokens))]
    pub async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<Completion> {
        if !self.is_initialized() {
            self.set_state(BackendState::Unavailable);
            return Err(PipelineError::GenerationUnavailable(
                "client marked uninitialized".to_string(),
            ));
        }

        let started = Instant::now();
        match self.request_completion(prompt, params).await {
            Ok(raw) => {
                self.set_state(BackendState::Healthy);
                let text = clean_response(&raw);
                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    raw_chars = raw.len(),
                    chars = text.len(),
                    "Generated completion"
                );
                Ok(Completion { raw, text })
            }
            Err(e) => {
                self.set_state(BackendState::Unavailable);
                Err(e)
            }
        }
    }

    async fn request_completion(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let url = format!("{}/v1/completions", self.base_url);
        let request = CompletionRequest {
            prompt,
            params,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PipelineError::GenerationServer {
                status: status.as_u16(),
                message,
            });
        }

        let body: CompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.classify(e)
            } else {
                PipelineError::GenerationServer {
                    status: status.as_u16(),
                    message: format!("malformed completion response: {}", e),
                }
            }
        })?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .ok_or_else(|| PipelineError::GenerationServer {
                status: status.as_u16(),
                message: "completion response has no choices".to_string(),
            })
    }

    fn classify(&self, error: reqwest::Error) -> PipelineError {
        if error.is_timeout() {
            PipelineError::GenerationTimeout {
                duration_ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            PipelineError::GenerationUnavailable(error.to_string())
        }
    }

    /// Generate, degrading to the timeout message or an extractive answer
    pub async fn answer_or_fallback(
        &self,
        prompt: &str,
        params: &GenerationParams,
        context: &AssembledContext,
        documents: &RankedDocuments,
    ) -> GeneratedAnswer {
        match self.generate(prompt, params).await {
            Ok(completion) if !completion.text.is_empty() => {
                GeneratedAnswer::new(completion.text, AnswerSource::Generated)
            }
            Ok(completion) => {
                warn!(
                    raw_chars = completion.raw.len(),
                    "Empty completion, using extractive fallback"
                );
                extractive_answer(context, documents)
            }
            Err(PipelineError::GenerationTimeout { duration_ms }) => {
                warn!(duration_ms, "Generation timed out");
                GeneratedAnswer::new(TIMEOUT_MESSAGE, AnswerSource::Apology)
            }
            Err(e) => {
                warn!(error = %e, "Generation failed, using extractive fallback");
                extractive_answer(context, documents)
            }
        }
    }
}
