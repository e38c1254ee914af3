//! Remote question generator
//!
//! Asks a Gemini `generateContent` endpoint for questions over HTTP and
//! validates what comes back with [`super::payload`].

use reqwest::Client;
use tracing::{debug, warn};

use crate::question::Question;

use super::{
    GenerationFailure, QuestionSupply, SupplyRequest,
    payload::{GenerateRequest, GenerateResponse, parse_questions},
};

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Environment variable overriding [`DEFAULT_MODEL`]
pub const MODEL_ENV: &str = "GEMINI_MODEL";
/// Environment variable overriding [`DEFAULT_ENDPOINT`]
pub const ENDPOINT_ENV: &str = "GEMINI_ENDPOINT";

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
/// API base used when none is configured
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Reads a variable, treating unset and blank alike
fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Runtime configuration describing how to reach the generator
#[derive(Clone)]
pub struct GeminiConfig {
    api_key: String,
    model: String,
    endpoint: String,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl GeminiConfig {
    /// Construct a configuration for the default model and endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_owned(),
            endpoint: DEFAULT_ENDPOINT.to_owned(),
        }
    }

    /// Use another model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Use another API base, e.g. a local stand-in
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_owned();
        self
    }

    /// Build a configuration by reading the expected environment variables
    ///
    /// Blank model or endpoint variables fall back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationFailure::MissingConfiguration`] when the API key
    /// variable is unset or blank.
    pub fn from_env() -> Result<Self, GenerationFailure> {
        let api_key =
            env_value(API_KEY_ENV).ok_or(GenerationFailure::MissingConfiguration(API_KEY_ENV))?;

        let mut config = Self::new(api_key);
        if let Some(model) = env_value(MODEL_ENV) {
            config = config.with_model(model);
        }
        if let Some(endpoint) = env_value(ENDPOINT_ENV) {
            config = config.with_endpoint(endpoint);
        }
        Ok(config)
    }

    /// The model questions are requested from
    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

/// A supplier that generates questions with a Gemini model
#[derive(Debug, Clone)]
pub struct GeminiSupply {
    client: Client,
    config: GeminiConfig,
}

impl GeminiSupply {
    /// Creates a supplier with its own HTTP client
    ///
    /// # Errors
    ///
    /// Returns [`GenerationFailure::Upstream`] when the HTTP client cannot be
    /// built.
    pub fn new(config: GeminiConfig) -> Result<Self, GenerationFailure> {
        let client = Client::builder()
            .build()
            .map_err(|error| GenerationFailure::Upstream(error.to_string()))?;
        Ok(Self::with_client(client, config))
    }

    /// Creates a supplier sharing an existing HTTP client
    pub fn with_client(client: Client, config: GeminiConfig) -> Self {
        Self { client, config }
    }

    /// Reads the configuration from the environment and creates a supplier
    ///
    /// # Errors
    ///
    /// See [`GeminiConfig::from_env`] and [`GeminiSupply::new`].
    pub fn from_env() -> Result<Self, GenerationFailure> {
        Self::new(GeminiConfig::from_env()?)
    }
}

impl QuestionSupply for GeminiSupply {
    async fn supply(&self, request: &SupplyRequest) -> Result<Vec<Question>, GenerationFailure> {
        request.check()?;
        debug!(
            model = %self.config.model,
            topic = request.topic(),
            count = request.count(),
            "requesting generated questions"
        );

        let response = self
            .client
            .post(self.config.url())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&GenerateRequest::for_questions(request))
            .send()
            .await
            .map_err(|error| {
                warn!(%error, "question generator unreachable");
                GenerationFailure::Upstream(error.without_url().to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %body, "question generator returned an error");
            return Err(GenerationFailure::Upstream(format!(
                "generator responded with status {status}"
            )));
        }

        let response: GenerateResponse = response
            .json()
            .await
            .map_err(|error| GenerationFailure::MalformedPayload(error.without_url().to_string()))?;
        let text = response.text().ok_or_else(|| {
            GenerationFailure::MalformedPayload("response carried no candidate text".to_owned())
        })?;

        parse_questions(text, request.count())
    }
}
