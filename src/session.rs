//! Quiz session state machine
//!
//! A [`Session`] owns everything about one play-through: its phase, the
//! questions, the position in them, the provisional selection, the recorded
//! answers and the remaining time of the current question. All transitions
//! are synchronous `&mut self` calls, so only one of them can act on a
//! session at a time.
//!
//! ```text
//! Setup --begin--> Playing --advance/timeout on last--> Completed
//!   ^                 |                                     |
//!   +----restart------+-------------------------------------+
//! ```

use std::{fmt::Display, str::FromStr};

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;
use web_time::SystemTime;

use crate::{
    constants::{
        countdown::{CRITICAL_SECONDS, WARNING_SECONDS},
        question::MAX_CORRECT_INDEX,
        session::{MAX_QUESTION_COUNT, MAX_TOTAL_SECONDS, MIN_QUESTION_COUNT},
    },
    question::Question,
    scoring::QuizResult,
};

/// A unique identifier for a session instance
///
/// A new identifier is drawn every time a session is created or restarted,
/// so views and scheduled alarms can tell a replaced session apart from the
/// live one.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Coarse lifecycle stage of a session
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
pub enum Phase {
    /// No questions yet; waiting for supply
    #[default]
    #[display("setting up")]
    Setup,
    /// Questions are being presented
    #[display("playing")]
    Playing,
    /// Every question has been answered or timed out
    #[display("completed")]
    Completed,
}

/// Control calls that depend on the session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display)]
pub enum Action {
    /// Starting a session with supplied questions
    #[display("begin")]
    Begin,
    /// Choosing a provisional answer
    #[display("select an answer")]
    SelectAnswer,
    /// Finalizing the current question
    #[display("advance")]
    Advance,
    /// Finalizing the current question because its time ran out
    #[display("time out")]
    Timeout,
}

/// Malformed caller arguments
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum InvalidInput {
    /// The answer index does not name one of the four options
    #[error("answer index {0} is outside of the bounds [0,{max}]", max = MAX_CORRECT_INDEX)]
    AnswerIndex(usize),
    /// The number of questions is outside of the configured bounds
    #[error(
        "question count {0} is outside of the bounds [{min},{max}]",
        min = MIN_QUESTION_COUNT,
        max = MAX_QUESTION_COUNT
    )]
    QuestionCount(usize),
    /// The total time budget is zero, too large, or below one second per question
    #[error("a time budget of {total_seconds}s cannot cover {question_count} questions")]
    TimeBudget {
        /// The requested total budget
        total_seconds: u64,
        /// The number of questions it had to cover
        question_count: usize,
    },
    /// A supplied question failed shape validation
    #[error("question {index} is malformed: {reason}")]
    MalformedQuestion {
        /// Position of the question in the supplied list
        index: usize,
        /// The validation report
        reason: String,
    },
}

/// Errors returned by session transitions
///
/// Every error leaves the session exactly as it was before the call.
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The caller passed a malformed argument
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
    /// The call is not allowed in the current phase
    #[error("cannot {action} while the session is {phase}")]
    InvalidTransition {
        /// The rejected call
        action: Action,
        /// The phase the session was in
        phase: Phase,
    },
    /// A timeout arrived after an answer had been provisionally selected
    #[error("an answer is already selected for question {index}")]
    AnswerAlreadySelected {
        /// The question that kept its selection
        index: usize,
    },
}

/// What a finalizing transition did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Transition {
    /// Moved on to the question at this index
    NextQuestion(usize),
    /// The last question was finalized
    Completed,
}

/// Timer colour band for the remaining time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Urgency {
    /// More than the warning threshold remains
    Normal,
    /// At or below the warning threshold
    Warning,
    /// At or below the critical threshold
    Critical,
}

impl Urgency {
    /// Classifies a remaining number of seconds
    pub fn from_remaining(remaining_seconds: u64) -> Self {
        if remaining_seconds <= CRITICAL_SECONDS {
            Self::Critical
        } else if remaining_seconds <= WARNING_SECONDS {
            Self::Warning
        } else {
            Self::Normal
        }
    }
}

/// Checks that a total time budget gives every question at least a second
///
/// Returns the per-question time, `floor(total_seconds / question_count)`.
///
/// # Errors
///
/// Returns [`InvalidInput::QuestionCount`] for counts outside `[1,20]` and
/// [`InvalidInput::TimeBudget`] when the budget is larger than an hour or
/// leaves less than one second per question.
pub fn seconds_per_question(total_seconds: u64, question_count: usize) -> Result<u64, InvalidInput> {
    if !(MIN_QUESTION_COUNT..=MAX_QUESTION_COUNT).contains(&question_count) {
        return Err(InvalidInput::QuestionCount(question_count));
    }
    let per_question = total_seconds / question_count as u64;
    if total_seconds > MAX_TOTAL_SECONDS || per_question == 0 {
        return Err(InvalidInput::TimeBudget {
            total_seconds,
            question_count,
        });
    }
    Ok(per_question)
}

/// A single-player timed quiz session
///
/// Sessions serialize as a snapshot for views but are never read back: the
/// only way into `Playing` is [`Session::begin`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct Session {
    id: SessionId,
    phase: Phase,
    topic: String,
    questions: Vec<Question>,
    current_index: usize,
    selected_answer: Option<usize>,
    answers: Vec<Option<usize>>,
    remaining_seconds: u64,
    seconds_per_question: u64,
    started_at: Option<SystemTime>,
    completed_at: Option<SystemTime>,

    /// Computed once on completion
    #[serde(skip)]
    result: once_cell_serde::sync::OnceCell<QuizResult>,
}

impl Session {
    /// Creates an empty session in the `Setup` phase
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts playing with an already supplied list of questions
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidTransition`] unless the session is in `Setup`
    /// * [`InvalidInput::QuestionCount`] for fewer than 1 or more than 20 questions
    /// * [`InvalidInput::MalformedQuestion`] when any question fails shape validation
    /// * [`InvalidInput::TimeBudget`] when `total_seconds / count` is below one
    pub fn begin(
        &mut self,
        topic: impl Into<String>,
        questions: Vec<Question>,
        total_seconds: u64,
    ) -> Result<(), Error> {
        self.require(Action::Begin, Phase::Setup)?;

        let seconds_per_question = seconds_per_question(total_seconds, questions.len())?;
        if let Some((index, report)) = questions
            .iter()
            .enumerate()
            .find_map(|(index, question)| question.validate().err().map(|report| (index, report)))
        {
            return Err(InvalidInput::MalformedQuestion {
                index,
                reason: report.to_string(),
            }
            .into());
        }

        self.topic = topic.into();
        self.questions = questions;
        self.current_index = 0;
        self.answers = Vec::with_capacity(self.questions.len());
        self.selected_answer = None;
        self.seconds_per_question = seconds_per_question;
        self.remaining_seconds = seconds_per_question;
        self.started_at = Some(SystemTime::now());
        self.phase = Phase::Playing;

        info!(
            session = %self.id,
            questions = self.questions.len(),
            seconds_per_question,
            "quiz session started"
        );
        Ok(())
    }

    /// Provisionally selects an option for the current question
    ///
    /// Repeated calls overwrite the previous choice until the question is
    /// finalized.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidTransition`] unless the session is `Playing`
    /// * [`InvalidInput::AnswerIndex`] when `index` is not in `[0,3]`
    pub fn select_answer(&mut self, index: usize) -> Result<(), Error> {
        self.require(Action::SelectAnswer, Phase::Playing)?;
        if index > MAX_CORRECT_INDEX {
            return Err(InvalidInput::AnswerIndex(index).into());
        }

        self.selected_answer = Some(index);
        debug!(session = %self.id, question = self.current_index, answer = index, "answer selected");
        Ok(())
    }

    /// Finalizes the current question with whatever is selected
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless the session is `Playing`.
    pub fn advance(&mut self) -> Result<Transition, Error> {
        self.require(Action::Advance, Phase::Playing)?;
        Ok(self.finalize())
    }

    /// Finalizes the current question as unanswered because its time ran out
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidTransition`] unless the session is `Playing`
    /// * [`Error::AnswerAlreadySelected`] when a selection exists; the
    ///   selection is kept and nothing changes
    pub fn timeout(&mut self) -> Result<Transition, Error> {
        self.require(Action::Timeout, Phase::Playing)?;
        if self.selected_answer.is_some() {
            return Err(Error::AnswerAlreadySelected {
                index: self.current_index,
            });
        }

        debug!(session = %self.id, question = self.current_index, "question timed out");
        Ok(self.finalize())
    }

    /// Discards everything and returns to a fresh `Setup` session
    pub fn restart(&mut self) {
        debug!(session = %self.id, phase = %self.phase, "session restarted");
        *self = Self::new();
    }

    fn require(&self, action: Action, phase: Phase) -> Result<(), Error> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                action,
                phase: self.phase,
            })
        }
    }

    fn finalize(&mut self) -> Transition {
        self.answers.push(self.selected_answer.take());

        if self.current_index + 1 >= self.questions.len() {
            self.phase = Phase::Completed;
            self.completed_at = Some(SystemTime::now());
            let result = self.result_or_compute();
            info!(
                session = %self.id,
                score = result.score,
                total = result.total,
                "quiz session completed"
            );
            Transition::Completed
        } else {
            self.current_index += 1;
            self.remaining_seconds = self.seconds_per_question;
            Transition::NextQuestion(self.current_index)
        }
    }

    fn result_or_compute(&self) -> &QuizResult {
        self.result.get_or_init(|| {
            let elapsed = self
                .started_at
                .zip(self.completed_at)
                .and_then(|(start, end)| end.duration_since(start).ok());
            QuizResult::compute(&self.topic, &self.questions, &self.answers, elapsed)
        })
    }

    /// Counts the current question's clock down by one second
    ///
    /// Returns the new remaining time.
    pub(crate) fn decrement_remaining(&mut self) -> u64 {
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        self.remaining_seconds
    }

    /// Resets the visible clock to the full per-question time
    pub(crate) fn reset_remaining(&mut self) {
        self.remaining_seconds = self.seconds_per_question;
    }

    /// The identifier of this session instance
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The current lifecycle phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The topic label the questions were supplied for
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// All questions of the session, empty in `Setup`
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// 0-based position of the current question
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// The question being presented, only while `Playing`
    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            Phase::Playing => self.questions.get(self.current_index),
            Phase::Setup | Phase::Completed => None,
        }
    }

    /// The provisional selection for the current question
    pub fn selected_answer(&self) -> Option<usize> {
        self.selected_answer
    }

    /// Answers recorded so far, `None` for timed-out questions
    pub fn answers(&self) -> &[Option<usize>] {
        &self.answers
    }

    /// Seconds left for the current question
    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    /// Time allotted to each question
    pub fn seconds_per_question(&self) -> u64 {
        self.seconds_per_question
    }

    /// Whether the countdown should be running
    pub fn is_awaiting_answer(&self) -> bool {
        self.phase == Phase::Playing && self.selected_answer.is_none()
    }

    /// Whether the current question is the last one
    pub fn is_last_question(&self) -> bool {
        self.phase == Phase::Playing && self.current_index + 1 == self.questions.len()
    }

    /// Fraction of the quiz reached, counting the current question
    pub fn progress(&self) -> f64 {
        match self.phase {
            Phase::Setup => 0.,
            Phase::Playing => (self.current_index + 1) as f64 / self.questions.len() as f64,
            Phase::Completed => 1.,
        }
    }

    /// Timer colour band for the current question
    pub fn urgency(&self) -> Urgency {
        Urgency::from_remaining(self.remaining_seconds)
    }

    /// Score, percentage and review, only once `Completed`
    pub fn result(&self) -> Option<&QuizResult> {
        match self.phase {
            Phase::Completed => Some(self.result_or_compute()),
            Phase::Setup | Phase::Playing => None,
        }
    }
}
