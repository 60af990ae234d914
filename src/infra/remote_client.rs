use crate::domain::models::{GenerationResult, ModelInfo, TokenCount};
use log::{debug, info};
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_API_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The remote model service the pipeline talks to.
///
/// The client is released when dropped.
pub trait RemoteClient {
    fn count_tokens(&self, text: &str) -> Result<TokenCount, ClientError>;
    fn model_info(&self) -> Result<ModelInfo, ClientError>;
    fn generate_content(&self, prompt: &str) -> Result<GenerationResult, ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Auth,
    RateLimit,
    InvalidRequest,
    NotFound,
    Server,
    Unknown,
}

impl ErrorCategory {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorCategory::Auth,
            429 => ErrorCategory::RateLimit,
            400 | 413 | 422 => ErrorCategory::InvalidRequest,
            404 => ErrorCategory::NotFound,
            500..=599 => ErrorCategory::Server,
            _ => ErrorCategory::Unknown,
        }
    }

    fn suggestion(self) -> &'static str {
        match self {
            ErrorCategory::Auth => {
                "Check that GEMINI_API_KEY is set to a valid key with access to this model."
            }
            ErrorCategory::RateLimit => {
                "You have hit the API rate limit or quota. Wait a moment and try again."
            }
            ErrorCategory::InvalidRequest => {
                "The request was rejected. Try reducing the context with --include, --exclude or --exclude-names."
            }
            ErrorCategory::NotFound => {
                "The model was not found. Check the --model name for typos."
            }
            ErrorCategory::Server => "The model service had an internal problem. Try again later.",
            ErrorCategory::Unknown => "Run again with --verbose for more details.",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Auth => "authentication",
            ErrorCategory::RateLimit => "rate limit",
            ErrorCategory::InvalidRequest => "invalid request",
            ErrorCategory::NotFound => "not found",
            ErrorCategory::Server => "server",
            ErrorCategory::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A well-formed error returned by the model API, enriched with a category
/// and a suggestion the CLI can show to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{category} error from model API (HTTP {status}): {message}")]
pub struct ApiError {
    pub status: u16,
    pub category: ErrorCategory,
    pub message: String,
    pub suggestion: String,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        let category = ErrorCategory::from_status(status);
        Self {
            status,
            category,
            message: message.into(),
            suggestion: category.suggestion().to_string(),
        }
    }

    /// Builds an error from a non-success response body. Falls back to the
    /// raw body when it is not the usual `{"error": {...}}` envelope.
    pub fn from_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|envelope| match envelope.error.status {
                Some(code) if !code.is_empty() => format!("{} ({})", envelope.error.message, code),
                _ => envelope.error.message,
            })
            .unwrap_or_else(|_| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    "empty error response".to_string()
                } else {
                    trimmed.to_string()
                }
            });
        Self::new(status, message)
    }

    pub fn user_facing(&self) -> String {
        format!("{}\n{}", self.message, self.suggestion)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("network error: {0}")]
    Network(String),

    #[error("response parse error: {0}")]
    Parse(String),
}

impl ClientError {
    /// Enriched API errors pass through untouched so callers can downcast to
    /// `ApiError`; anything else is prefixed with the phase that failed.
    pub fn in_phase(self, phase: &'static str) -> anyhow::Error {
        match self {
            ClientError::Api(api) => api.into(),
            other => anyhow::Error::new(other).context(phase),
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Serialize)]
struct ContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<TextPart<'a>>,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

impl<'a> ContentRequest<'a> {
    fn user_text(text: &'a str) -> Self {
        Self {
            contents: vec![Content {
                role: "user",
                parts: vec![TextPart { text }],
            }],
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    total_tokens: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelResponse {
    name: String,
    input_token_limit: i32,
    #[serde(default)]
    output_token_limit: i32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Client for the Generative Language REST API.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    fn model_url(&self, action: Option<&str>) -> String {
        match action {
            Some(action) => format!("{}/models/{}:{}", self.endpoint, self.model, action),
            None => format!("{}/models/{}", self.endpoint, self.model),
        }
    }

    fn post(&self, action: &str, text: &str) -> Result<Response, ClientError> {
        let url = self.model_url(Some(action));
        debug!("POST {} ({} chars)", url, text.len());
        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&ContentRequest::user_text(text))
            .send()
            .map_err(|e| ClientError::Network(e.to_string()))?;
        check_status(resp)
    }
}

fn check_status(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(ApiError::from_body(status.as_u16(), &body).into())
}

fn parse_json<T: for<'de> Deserialize<'de>>(resp: Response) -> Result<T, ClientError> {
    let body = resp.text().map_err(|e| ClientError::Network(e.to_string()))?;
    decode_body(&body)
}

fn decode_body<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, ClientError> {
    serde_json::from_str(body).map_err(|e| ClientError::Parse(e.to_string()))
}

fn model_info_from_response(parsed: ModelResponse) -> Result<ModelInfo, ClientError> {
    if parsed.input_token_limit <= 0 {
        return Err(ClientError::Parse(format!(
            "model {} reported no input token limit",
            parsed.name
        )));
    }
    Ok(ModelInfo {
        name: parsed
            .name
            .strip_prefix("models/")
            .unwrap_or(&parsed.name)
            .to_string(),
        input_limit: parsed.input_token_limit,
        output_limit: parsed.output_token_limit,
    })
}

impl RemoteClient for GeminiClient {
    fn count_tokens(&self, text: &str) -> Result<TokenCount, ClientError> {
        let resp = self.post("countTokens", text)?;
        let parsed: CountTokensResponse = parse_json(resp)?;
        debug!("Remote tokenizer counted {} tokens", parsed.total_tokens);
        Ok(TokenCount {
            total: parsed.total_tokens,
        })
    }

    fn model_info(&self) -> Result<ModelInfo, ClientError> {
        let url = self.model_url(None);
        debug!("GET {}", url);
        let resp = self
            .http
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .map_err(|e| ClientError::Network(e.to_string()))?;
        let parsed: ModelResponse = parse_json(check_status(resp)?)?;
        model_info_from_response(parsed)
    }

    fn generate_content(&self, prompt: &str) -> Result<GenerationResult, ClientError> {
        info!("Sending prompt to {}", self.model);
        let resp = self.post("generateContent", prompt)?;
        let parsed: GenerateResponse = parse_json(resp)?;
        generation_from_response(parsed)
    }
}

fn generation_from_response(parsed: GenerateResponse) -> Result<GenerationResult, ClientError> {
    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ClientError::Parse("response contained no candidates".to_string()))?;

    let content = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
        .unwrap_or_default();
    let truncated = candidate.finish_reason.as_deref() == Some("MAX_TOKENS");

    Ok(GenerationResult {
        content,
        finish_reason: candidate.finish_reason,
        truncated,
    })
}
