//! Multiple choice question records
//!
//! A question is supplied from outside the session (a static bank or a
//! remote generator) and is checked for its *shape* before a session may
//! start with it: a non-blank prompt, exactly four distinct options and a
//! correct index pointing at one of them. Correctness of the content itself
//! is never checked.

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::constants::question::{
    MAX_CORRECT_INDEX, MAX_OPTION_LENGTH, MAX_TEXT_LENGTH, OPTION_COUNT,
};

type ValidationResult = garde::Result;

/// Rejects strings that only contain whitespace
fn validate_not_blank(val: &str) -> ValidationResult {
    if val.trim().is_empty() {
        Err(garde::Error::new("must not be blank"))
    } else {
        Ok(())
    }
}

/// Rejects option lists that repeat the same display string
fn validate_distinct_options(val: &[String]) -> ValidationResult {
    if val.iter().map(|option| option.trim()).all_unique() {
        Ok(())
    } else {
        Err(garde::Error::new("options must be distinct"))
    }
}

/// A single multiple choice question
///
/// The serialized field names (`question`, `options`, `correct`) match the
/// JSON payload produced by question generators, so the same type is used on
/// both sides of the supply boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Question {
    /// The prompt shown to the player
    #[serde(rename = "question")]
    #[garde(length(chars, min = 1, max = MAX_TEXT_LENGTH), custom(|v, _| validate_not_blank(v)))]
    text: String,
    /// The answer options, in display order
    #[garde(
        length(min = OPTION_COUNT, max = OPTION_COUNT),
        inner(length(chars, min = 1, max = MAX_OPTION_LENGTH)),
        custom(|v, _| validate_distinct_options(v))
    )]
    options: Vec<String>,
    /// Index into `options` of the correct answer
    #[serde(rename = "correct")]
    #[garde(range(max = MAX_CORRECT_INDEX))]
    correct_index: usize,
}

impl Question {
    /// Builds a question and checks its shape
    ///
    /// # Errors
    ///
    /// Returns the `garde` report describing every shape violation when the
    /// prompt is blank, the option count is not four, options repeat, or the
    /// correct index is out of range.
    pub fn new<S: Into<String>>(
        text: impl Into<String>,
        options: impl IntoIterator<Item = S>,
        correct_index: usize,
    ) -> Result<Self, garde::Report> {
        let question = Self {
            text: text.into(),
            options: options.into_iter().map(Into::into).collect_vec(),
            correct_index,
        };
        question.validate()?;
        Ok(question)
    }

    /// The prompt shown to the player
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The answer options, in display order
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Index of the correct option
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    /// The option at `index`, if there is one
    pub fn option(&self, index: usize) -> Option<&str> {
        self.options.get(index).map(String::as_str)
    }

    /// The text of the correct option
    pub fn correct_option(&self) -> &str {
        self.option(self.correct_index).unwrap_or_default()
    }

    /// Whether a recorded answer matches the correct index
    pub fn is_correct(&self, answer: Option<usize>) -> bool {
        answer == Some(self.correct_index)
    }
}

/// Letter label (`A`, `B`, ...) used to display an option index
pub fn option_letter(index: usize) -> char {
    u8::try_from(index)
        .ok()
        .and_then(|i| b'A'.checked_add(i))
        .map_or('?', char::from)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn capital_of_france() -> Question {
        Question::new(
            "What is the capital of France?",
            ["London", "Berlin", "Paris", "Madrid"],
            2,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_question() {
        let question = capital_of_france();
        assert_eq!(question.text(), "What is the capital of France?");
        assert_eq!(question.options().len(), 4);
        assert_eq!(question.correct_index(), 2);
        assert_eq!(question.correct_option(), "Paris");
        assert!(question.validate().is_ok());
    }

    #[test]
    fn test_blank_text_rejected() {
        assert!(Question::new("", ["a", "b", "c", "d"], 0).is_err());
        assert!(Question::new("   ", ["a", "b", "c", "d"], 0).is_err());
    }

    #[test]
    fn test_text_too_long_rejected() {
        let text = "a".repeat(MAX_TEXT_LENGTH + 1);
        assert!(Question::new(text, ["a", "b", "c", "d"], 0).is_err());
    }

    #[test]
    fn test_lengths_count_characters() {
        let options = ["é", "ü", "ß", "ø"].map(|letter| letter.repeat(MAX_OPTION_LENGTH));
        assert!(Question::new("é".repeat(MAX_TEXT_LENGTH), options.clone(), 0).is_ok());
        assert!(Question::new("é".repeat(MAX_TEXT_LENGTH + 1), options, 0).is_err());
    }

    #[test]
    fn test_wrong_option_count_rejected() {
        assert!(Question::new("Q?", ["a", "b", "c"], 0).is_err());
        assert!(Question::new("Q?", ["a", "b", "c", "d", "e"], 0).is_err());
    }

    #[test]
    fn test_duplicate_options_rejected() {
        assert!(Question::new("Q?", ["a", "b", "a", "d"], 0).is_err());
    }

    #[test]
    fn test_empty_option_rejected() {
        assert!(Question::new("Q?", ["a", "", "c", "d"], 0).is_err());
    }

    #[test]
    fn test_correct_index_out_of_range_rejected() {
        assert!(Question::new("Q?", ["a", "b", "c", "d"], 4).is_err());
        assert!(Question::new("Q?", ["a", "b", "c", "d"], 3).is_ok());
    }

    #[test]
    fn test_is_correct() {
        let question = capital_of_france();
        assert!(question.is_correct(Some(2)));
        assert!(!question.is_correct(Some(1)));
        assert!(!question.is_correct(None));
    }

    #[test]
    fn test_option_lookup() {
        let question = capital_of_france();
        assert_eq!(question.option(0), Some("London"));
        assert_eq!(question.option(4), None);
    }

    #[test]
    fn test_option_letter() {
        assert_eq!(option_letter(0), 'A');
        assert_eq!(option_letter(3), 'D');
    }

    #[test]
    fn test_generator_field_names() {
        let json = r#"{"question":"2 + 2?","options":["3","4","5","6"],"correct":1}"#;
        let question: Question = serde_json::from_str(json).unwrap();
        assert_eq!(question.text(), "2 + 2?");
        assert_eq!(question.correct_index(), 1);
        assert!(question.validate().is_ok());

        let back = serde_json::to_value(&question).unwrap();
        assert_eq!(back["correct"], 1);
        assert_eq!(back["question"], "2 + 2?");
    }
}
