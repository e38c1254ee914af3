//! Question supply
//!
//! A supplier turns a topic and a requested count into a list of validated
//! questions, or fails with a [`GenerationFailure`] whose message can be shown
//! to the player. Requests are checked before any supplier is consulted, so a
//! bad count never reaches a generator.

use std::future::Future;

use garde::Validate;
use rustrict::CensorStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    constants::{
        session::{MAX_QUESTION_COUNT, MIN_QUESTION_COUNT},
        supply::MAX_TOPIC_LENGTH,
    },
    question::Question,
};

pub mod bank;
#[cfg(feature = "remote-supply")]
pub mod gemini;
pub mod payload;

pub use bank::StaticBank;
#[cfg(feature = "remote-supply")]
pub use gemini::{GeminiConfig, GeminiSupply};

/// Why a supplier could not produce a quiz
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum GenerationFailure {
    /// The topic or count was rejected before generation
    #[error("{0}")]
    InvalidRequest(String),
    /// A required setting is absent
    #[error("missing configuration: {0} is not set")]
    MissingConfiguration(&'static str),
    /// The generator could not be reached or reported an error
    #[error("question generator failed: {0}")]
    Upstream(String),
    /// The generator answered with something that is not a question list
    #[error("question generator returned a malformed payload: {0}")]
    MalformedPayload(String),
    /// Too few of the returned items passed shape validation
    #[error("question generator returned {received} valid questions out of {requested} requested")]
    InsufficientQuestions {
        /// Number of questions asked for
        requested: usize,
        /// Number of valid questions received
        received: usize,
    },
}

type ValidationResult = garde::Result;

fn validate_topic(val: &str) -> ValidationResult {
    if val.trim().is_empty() {
        Err(garde::Error::new("topic is required"))
    } else if val.is_inappropriate() {
        Err(garde::Error::new("topic is inappropriate"))
    } else {
        Ok(())
    }
}

/// A validated request for questions
///
/// Serialized with the field names of the generator HTTP boundary
/// (`topic`, `numQuestions`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SupplyRequest {
    /// Subject the questions should be about
    #[garde(length(chars, max = MAX_TOPIC_LENGTH), custom(|v, _| validate_topic(v)))]
    topic: String,
    /// Exact number of questions wanted
    #[serde(rename = "numQuestions")]
    #[garde(range(min = MIN_QUESTION_COUNT, max = MAX_QUESTION_COUNT))]
    count: usize,
}

impl SupplyRequest {
    /// Builds a request, trimming the topic
    ///
    /// # Errors
    ///
    /// Returns [`GenerationFailure::InvalidRequest`] when the topic is blank,
    /// too long or inappropriate, or when `count` is outside `[1,20]`.
    pub fn new(topic: &str, count: usize) -> Result<Self, GenerationFailure> {
        let request = Self {
            topic: rustrict::trim_whitespace(topic).to_owned(),
            count,
        };
        request.check()?;
        Ok(request)
    }

    /// Re-runs validation, for requests that arrived deserialized
    ///
    /// # Errors
    ///
    /// Same as [`SupplyRequest::new`].
    pub fn check(&self) -> Result<(), GenerationFailure> {
        self.validate()
            .map_err(|report| GenerationFailure::InvalidRequest(report.to_string()))
    }

    /// Subject the questions should be about
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Exact number of questions wanted
    pub fn count(&self) -> usize {
        self.count
    }
}

/// A source of quiz questions
///
/// Implementations must either return exactly `request.count()` questions
/// that pass shape validation, or fail.
pub trait QuestionSupply {
    /// Produces the questions for a request
    fn supply(
        &self,
        request: &SupplyRequest,
    ) -> impl Future<Output = Result<Vec<Question>, GenerationFailure>> + Send;
}

/// Keeps the first `requested` valid questions, failing when there are fewer
///
/// # Errors
///
/// Returns [`GenerationFailure::InsufficientQuestions`] when fewer than
/// `requested` questions pass validation.
pub fn take_valid(
    questions: impl IntoIterator<Item = Question>,
    requested: usize,
) -> Result<Vec<Question>, GenerationFailure> {
    let mut valid: Vec<Question> = questions
        .into_iter()
        .filter(|question| question.validate().is_ok())
        .collect();
    if valid.len() < requested {
        return Err(GenerationFailure::InsufficientQuestions {
            requested,
            received: valid.len(),
        });
    }
    valid.truncate(requested);
    Ok(valid)
}
