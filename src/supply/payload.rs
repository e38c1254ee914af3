//! Generator payload handling
//!
//! Generative models are asked to answer with nothing but a JSON array of
//! questions, but in practice the array arrives wrapped in prose or code
//! fences, and individual items may be malformed. This module builds the
//! request body, digs the candidate text out of the response, extracts the
//! outermost JSON array, and keeps the items that pass shape validation.
//! None of it touches the network.

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use tracing::warn;

use crate::question::Question;

use super::{GenerationFailure, SupplyRequest, take_valid};

/// Builds the instruction sent to the generator
pub fn prompt(request: &SupplyRequest) -> String {
    format!(
        "Generate {count} multiple choice questions about {topic}. \n\n\
         Return ONLY a valid JSON array in this format:\n\
         [\n  {{\n    \"question\": \"Question text?\",\n    \"options\": [\"A\", \"B\", \"C\", \"D\"],\n    \"correct\": 0\n  }}\n]\n\n\
         - Each question must have 4 options\n\
         - \"correct\" must be the index (0-3)\n\
         - No explanation or text outside JSON",
        count = request.count(),
        topic = request.topic(),
    )
}

/// Body of a `generateContent` call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// The conversation turns, here a single user turn
    pub contents: Vec<Content>,
    /// Sampling parameters
    pub generation_config: GenerationConfig,
}

impl GenerateRequest {
    /// A request carrying the question prompt and default sampling settings
    pub fn for_questions(request: &SupplyRequest) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt(request)),
                }],
            }],
            generation_config: GenerationConfig::default(),
        }
    }
}

/// Sampling parameters for the generator
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Sampling temperature
    pub temperature: f32,
    /// Top-k sampling cutoff
    pub top_k: u32,
    /// Nucleus sampling cutoff
    pub top_p: f32,
    /// Upper bound on the answer length
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2048,
        }
    }
}

/// One turn of content
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    /// The parts making up the turn
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One part of a turn
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    /// Text of the part, if it is a text part
    pub text: Option<String>,
}

/// Response of a `generateContent` call, reduced to what is read
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    /// Generated candidates, best first
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// A generated candidate
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    /// The candidate's content
    #[serde(default)]
    pub content: Content,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate, if any
    pub fn text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .parts
            .first()?
            .text
            .as_deref()
    }
}

/// The span from the first `[` to the last `]`, if there is one
pub fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (start < end).then(|| &text[start..=end])
}

/// Turns raw generator text into exactly `requested` valid questions
///
/// Items that do not deserialize or fail shape validation are dropped;
/// extra valid items are cut off.
///
/// # Errors
///
/// * [`GenerationFailure::MalformedPayload`] when no JSON array can be found
///   or parsed
/// * [`GenerationFailure::InsufficientQuestions`] when fewer than
///   `requested` items survive
pub fn parse_questions(text: &str, requested: usize) -> Result<Vec<Question>, GenerationFailure> {
    let array = extract_json_array(text).ok_or_else(|| {
        GenerationFailure::MalformedPayload("response did not contain a JSON array".to_owned())
    })?;
    let items: Vec<serde_json::Value> = serde_json::from_str(array)
        .map_err(|error| GenerationFailure::MalformedPayload(error.to_string()))?;

    let total = items.len();
    let questions: Vec<Question> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<Question>(item).ok())
        .filter(|question| question.validate().is_ok())
        .collect();

    if questions.len() < total {
        warn!(
            dropped = total - questions.len(),
            total, "dropped malformed generated questions"
        );
    }

    take_valid(questions, requested)
}
