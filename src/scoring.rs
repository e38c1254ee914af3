//! Scoring and result computation
//!
//! Once every question of a session has been answered or has timed out, the
//! recorded answers are compared to the correct indices to produce a score,
//! a rounded percentage, a grade and a per-question review.

use std::time::Duration;

use heck::ToTitleCase;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::{
    constants::grade,
    question::{Question, option_letter},
};

/// Classification of a final percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
pub enum Grade {
    /// 80% and above
    #[display("excellent")]
    Excellent,
    /// 60% up to 80%
    #[display("good")]
    Good,
    /// 40% up to 60%
    #[display("fair")]
    Fair,
    /// Below 40%
    #[display("needs practice")]
    NeedsPractice,
}

impl Grade {
    /// Classifies a whole percentage using the fixed thresholds
    pub fn from_percentage(percentage: u32) -> Self {
        match percentage {
            p if p >= grade::EXCELLENT => Self::Excellent,
            p if p >= grade::GOOD => Self::Good,
            p if p >= grade::FAIR => Self::Fair,
            _ => Self::NeedsPractice,
        }
    }

    /// Headline shown above the final score
    pub fn message(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent!",
            Self::Good => "Good job!",
            Self::Fair => "Not bad!",
            Self::NeedsPractice => "Keep practicing!",
        }
    }
}

/// Counts the recorded answers that match their question's correct index
///
/// Answers beyond the question list are ignored, so the result never
/// exceeds `questions.len()`.
pub fn score(questions: &[Question], answers: &[Option<usize>]) -> usize {
    questions
        .iter()
        .zip(answers)
        .filter(|(question, answer)| question.is_correct(**answer))
        .count()
}

/// `round(100 * score / total)`, rounding halves up
///
/// An empty quiz scores 0%.
pub fn percentage(score: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let rounded = (200 * score + total) / (2 * total);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

/// One reviewed question of a finished session
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEntry {
    /// The question prompt
    pub question: String,
    /// The recorded answer index, `None` when time ran out
    pub answer: Option<usize>,
    /// The recorded answer's option text, if any
    pub answer_text: Option<String>,
    /// The correct option index
    pub correct_index: usize,
    /// The correct option text
    pub correct_text: String,
    /// Whether the recorded answer was correct
    pub correct: bool,
}

impl ReviewEntry {
    fn new(question: &Question, answer: Option<usize>) -> Self {
        Self {
            question: question.text().to_owned(),
            answer,
            answer_text: answer
                .and_then(|index| question.option(index))
                .map(ToOwned::to_owned),
            correct_index: question.correct_index(),
            correct_text: question.correct_option().to_owned(),
            correct: question.is_correct(answer),
        }
    }

    /// Display line for the player's answer, e.g. `C. Paris`
    pub fn answer_label(&self) -> String {
        match (self.answer, &self.answer_text) {
            (Some(index), Some(text)) => format!("{}. {text}", option_letter(index)),
            _ => "No answer (Time up)".to_owned(),
        }
    }

    /// Display line for the correct answer, e.g. `C. Paris`
    pub fn correct_label(&self) -> String {
        format!("{}. {}", option_letter(self.correct_index), self.correct_text)
    }
}

/// Final outcome of a completed session
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResult {
    /// Number of correct answers
    pub score: usize,
    /// Number of questions in the session
    pub total: usize,
    /// Rounded percentage of correct answers
    pub percentage: u32,
    /// Classification of the percentage
    pub grade: Grade,
    /// Per-question review, in question order
    pub review: Vec<ReviewEntry>,
    /// Wall-clock time between start and completion
    #[serde_as(as = "Option<serde_with::DurationMilliSeconds<u64>>")]
    pub elapsed: Option<Duration>,
    /// One-line summary for display
    pub summary: String,
}

impl QuizResult {
    /// Scores a finished list of answers against its questions
    pub fn compute(
        topic: &str,
        questions: &[Question],
        answers: &[Option<usize>],
        elapsed: Option<Duration>,
    ) -> Self {
        let score = score(questions, answers);
        let total = questions.len();
        let percentage = percentage(score, total);

        let review = questions
            .iter()
            .enumerate()
            .map(|(index, question)| ReviewEntry::new(question, answers.get(index).copied().flatten()))
            .collect_vec();

        let topic = topic.trim();
        let summary = if topic.is_empty() {
            format!(
                "You got {percentage}% correct ({score} out of {})!",
                pluralizer::pluralize("question", total as isize, true)
            )
        } else {
            format!(
                "You got {percentage}% correct on {}!",
                topic.to_title_case()
            )
        };

        Self {
            score,
            total,
            percentage,
            grade: Grade::from_percentage(percentage),
            review,
            elapsed,
            summary,
        }
    }
}
