//! Gemini `generateContent` client.
use std::time::Duration;

use oneline_logging::{oneline_debug, oneline_warn};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{ApiKey, ConfigError};
use crate::deadline::StageContext;
use crate::generate::{ModelClient, Prompt};
use crate::types::{GenerationFailure, PipelineError, Stage};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<ApiKey>,
    pub model: String,
    pub api_base: String,
    pub connect_timeout: Duration,
    pub temperature: f32,
    pub top_p: f32,
    /// Loose cap; the hard length limit is applied to the cleaned output.
    pub max_output_tokens: u32,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            connect_timeout: Duration::from_secs(3),
            temperature: 0.3,
            top_p: 0.95,
            max_output_tokens: 320,
        }
    }
}

pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: Url,
    api_key_header: Option<HeaderValue>,
    generation_config: GenerationConfig,
}

impl GeminiClient {
    /// A missing key is accepted here; each call then fails with the
    /// missing-credential generation failure.
    pub fn new(settings: &GeminiSettings) -> Result<Self, ConfigError> {
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            settings.api_base.trim_end_matches('/'),
            settings.model
        );
        let endpoint = Url::parse(&endpoint)
            .map_err(|err| ConfigError::InvalidSetting(format!("model endpoint: {err}")))?;

        let api_key_header = settings
            .api_key
            .as_ref()
            .map(|key| {
                let mut value = HeaderValue::from_str(key.expose()).map_err(|_| {
                    ConfigError::InvalidSetting("API key contains invalid characters".into())
                })?;
                value.set_sensitive(true);
                Ok::<_, ConfigError>(value)
            })
            .transpose()?;

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key_header,
            generation_config: GenerationConfig {
                temperature: settings.temperature,
                top_p: settings.top_p,
                max_output_tokens: settings.max_output_tokens,
            },
        })
    }

    async fn send(&self, api_key: HeaderValue, body: Vec<u8>) -> Result<String, PipelineError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, api_key)
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            oneline_warn!("Model API answered HTTP {}", status.as_u16());
            return Err(PipelineError::generation(GenerationFailure::ApiStatus(
                status.as_u16(),
            )));
        }

        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        let parsed: GenerateResponse = serde_json::from_slice(&bytes).map_err(|err| {
            oneline_warn!("Unreadable model API response: {}", err);
            PipelineError::generation(GenerationFailure::MalformedResponse)
        })?;
        parsed
            .first_text()
            .ok_or_else(|| PipelineError::generation(GenerationFailure::EmptyResponse))
    }
}

#[async_trait::async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, prompt: &Prompt, ctx: &StageContext) -> Result<String, PipelineError> {
        let Some(api_key) = self.api_key_header.clone() else {
            return Err(PipelineError::generation(
                GenerationFailure::MissingCredential,
            ));
        };
        let request = GenerateRequest::new(prompt, self.generation_config);
        let body = serde_json::to_vec(&request).map_err(|err| {
            oneline_warn!("Cannot encode model request: {}", err);
            PipelineError::generation(GenerationFailure::Transport)
        })?;
        oneline_debug!(
            "Calling {} with {} prompt chars",
            self.endpoint,
            prompt.user_text.chars().count()
        );

        match ctx.run(self.send(api_key, body)).await {
            Ok(result) => result,
            Err(interrupted) => Err(interrupted.into_error(Stage::Summarizing)),
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> PipelineError {
    if err.is_timeout() {
        return PipelineError::timeout(Stage::Summarizing);
    }
    oneline_warn!("Model API transport error: {}", err.without_url());
    PipelineError::generation(GenerationFailure::Transport)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    system_instruction: Instruction<'a>,
    generation_config: GenerationConfig,
}

impl<'a> GenerateRequest<'a> {
    fn new(prompt: &'a Prompt, generation_config: GenerationConfig) -> Self {
        Self {
            contents: vec![Content {
                role: "user",
                parts: vec![TextPart {
                    text: &prompt.user_text,
                }],
            }],
            system_instruction: Instruction {
                parts: vec![TextPart {
                    text: &prompt.system_instruction,
                }],
            },
            generation_config,
        }
    }
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct Instruction<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate, or `None` when it is absent or blank.
    fn first_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|part| part.text).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}
