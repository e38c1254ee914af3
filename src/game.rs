//! Game controller
//!
//! [`Game`] is the single entry point through which a quiz changes: it owns
//! one [`Session`] and its [`Countdown`], runs question supply, applies
//! player commands and countdown alarms, and tells the view what changed
//! through a [`Tunnel`]. Every mutating call takes `&mut self`, so commands
//! and ticks are applied strictly one after the other.

use std::{fmt::Debug, time::Duration};

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    AlarmMessage,
    countdown::{self, Countdown, TickOutcome},
    question::Question,
    scoring::QuizResult,
    session::{self, Action, Phase, Session, SessionId, Transition, Urgency},
    supply::{GenerationFailure, QuestionSupply, SupplyRequest},
    tunnel::Tunnel,
};

/// Errors returned to the view by game commands
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The session rejected the call
    #[error(transparent)]
    Session(#[from] session::Error),
    /// No quiz could be supplied
    #[error(transparent)]
    Generation(#[from] GenerationFailure),
}

/// Settings chosen on the setup screen
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QuizOptions {
    /// Subject of the quiz
    pub topic: String,
    /// Number of questions to play
    pub question_count: usize,
    /// Time budget shared by all questions, in seconds
    pub total_seconds: u64,
}

impl Default for QuizOptions {
    /// Five questions in five minutes
    fn default() -> Self {
        Self {
            topic: String::new(),
            question_count: 5,
            total_seconds: 300,
        }
    }
}

impl QuizOptions {
    /// Creates options for a topic, a question count and a time budget
    pub fn new(topic: impl Into<String>, question_count: usize, total_seconds: u64) -> Self {
        Self {
            topic: topic.into(),
            question_count,
            total_seconds,
        }
    }

    /// Checks the options and builds the supply request
    ///
    /// # Errors
    ///
    /// Returns a session [`session::InvalidInput`] for a count or time budget
    /// that cannot make a session, and [`GenerationFailure::InvalidRequest`]
    /// for an unusable topic.
    pub fn to_request(&self) -> Result<SupplyRequest, Error> {
        session::seconds_per_question(self.total_seconds, self.question_count)
            .map_err(session::Error::from)?;
        Ok(SupplyRequest::new(&self.topic, self.question_count)?)
    }
}

/// What the view shows for the current question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionView {
    /// Index of the current question (0-based)
    pub index: usize,
    /// Total number of questions
    pub count: usize,
    /// The prompt
    pub question: String,
    /// The four options
    pub options: Vec<String>,
    /// Seconds left on the clock
    pub remaining_seconds: u64,
    /// Colour band of the clock
    pub urgency: Urgency,
    /// Whether advancing finishes the quiz
    pub is_last: bool,
}

impl QuestionView {
    fn new(session: &Session, question: &Question) -> Self {
        Self {
            index: session.current_index(),
            count: session.questions().len(),
            question: question.text().to_owned(),
            options: question.options().to_vec(),
            remaining_seconds: session.remaining_seconds(),
            urgency: session.urgency(),
            is_last: session.is_last_question(),
        }
    }
}

/// Update messages about the quiz as a whole
#[derive(Debug, Clone, Serialize)]
pub enum UpdateMessage {
    /// A session started playing
    Started {
        /// The new session
        session: SessionId,
        /// Topic of the questions
        topic: String,
        /// Number of questions
        question_count: usize,
        /// Time allotted to each question
        seconds_per_question: u64,
    },
    /// A question is now presented
    Question(QuestionView),
    /// The provisional selection changed
    AnswerSelected(usize),
    /// Every question is resolved
    Completed(QuizResult),
    /// Starting failed; the message is meant for display
    StartFailed(String),
    /// The session was discarded and setup begins again
    Reset,
}

/// Sync messages describing the whole quiz state
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub enum SyncMessage {
    /// Waiting for options, possibly after a failed start
    Setup {
        /// Message of the last failed start
        error: Option<String>,
    },
    /// A question is being presented
    Playing {
        /// The session being played
        session: SessionId,
        /// The current question
        question: QuestionView,
        /// The provisional selection
        selected_answer: Option<usize>,
    },
    /// The quiz is over
    Completed(QuizResult),
}

/// A quiz session together with its countdown
#[derive(Default)]
pub struct Game {
    session: Session,
    countdown: Countdown,
    last_error: Option<String>,
}

impl Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("session", &self.session.id())
            .field("phase", &self.session.phase())
            .finish_non_exhaustive()
    }
}

impl Game {
    /// Creates a game waiting on the setup screen
    pub fn new() -> Self {
        Self::default()
    }

    /// The session being played
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether the countdown is currently running
    pub fn is_counting_down(&self) -> bool {
        self.countdown.is_armed()
    }

    /// Message of the last failed start, cleared by a successful one
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether a scheduled alarm still matters
    ///
    /// Hosts can use this to drop alarms that were cancelled by a selection,
    /// a question change or a restart before they fire.
    pub fn is_alarm_live(&self, alarm: &AlarmMessage) -> bool {
        match alarm {
            AlarmMessage::Countdown(tick) => self.countdown.is_live(tick),
        }
    }

    /// Supplies questions and starts playing
    ///
    /// Options are checked before the supplier is asked, so an out-of-range
    /// count never triggers a generation. On failure the game stays in setup,
    /// remembers the message for display, and may be started again.
    ///
    /// # Errors
    ///
    /// * [`session::Error::InvalidTransition`] unless the game is in setup
    /// * [`session::Error::InvalidInput`] for a bad count or time budget
    /// * [`GenerationFailure`] when the request or the supplier fails
    pub async fn start<Q, T, S>(
        &mut self,
        supply: &Q,
        options: &QuizOptions,
        tunnel: &T,
        schedule_message: S,
    ) -> Result<(), Error>
    where
        Q: QuestionSupply,
        T: Tunnel,
        S: FnMut(AlarmMessage, Duration),
    {
        self.require_setup()?;

        let supplied = match options.to_request() {
            Ok(request) => supply.supply(&request).await.map_err(Error::from),
            Err(error) => Err(error),
        };

        match supplied {
            Ok(questions) => self.start_with(
                &options.topic,
                questions,
                options.total_seconds,
                tunnel,
                schedule_message,
            ),
            Err(error) => {
                self.fail(&error, tunnel);
                Err(error)
            }
        }
    }

    /// Starts playing with questions that were supplied elsewhere
    ///
    /// # Errors
    ///
    /// See [`Session::begin`].
    pub fn start_with<T: Tunnel, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        topic: &str,
        questions: Vec<Question>,
        total_seconds: u64,
        tunnel: &T,
        schedule_message: S,
    ) -> Result<(), Error> {
        if let Err(error) = self.session.begin(topic.trim(), questions, total_seconds) {
            let error = Error::from(error);
            self.fail(&error, tunnel);
            return Err(error);
        }

        self.last_error = None;
        self.countdown.sync(&self.session, schedule_message);

        tunnel.send_message(
            &UpdateMessage::Started {
                session: self.session.id(),
                topic: self.session.topic().to_owned(),
                question_count: self.session.questions().len(),
                seconds_per_question: self.session.seconds_per_question(),
            }
            .into(),
        );
        self.announce_question(tunnel);
        Ok(())
    }

    /// Provisionally selects an option; the countdown stops
    ///
    /// # Errors
    ///
    /// See [`Session::select_answer`].
    pub fn select_answer<T: Tunnel>(&mut self, index: usize, tunnel: &T) -> Result<(), Error> {
        self.session.select_answer(index)?;
        if !self.session.is_awaiting_answer() {
            self.countdown.disarm();
        }
        tunnel.send_message(&UpdateMessage::AnswerSelected(index).into());
        Ok(())
    }

    /// Finalizes the current question and moves on
    ///
    /// # Errors
    ///
    /// See [`Session::advance`].
    pub fn advance<T: Tunnel, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        tunnel: &T,
        schedule_message: S,
    ) -> Result<(), Error> {
        let transition = self.session.advance()?;
        self.countdown.sync(&self.session, schedule_message);
        self.announce_transition(transition, tunnel);
        Ok(())
    }

    /// Discards the session and returns to setup
    ///
    /// Pending alarms of the discarded session become stale.
    pub fn restart<T: Tunnel>(&mut self, tunnel: &T) {
        self.session.restart();
        self.countdown.disarm();
        self.last_error = None;

        tunnel.send_message(&UpdateMessage::Reset.into());
        tunnel.send_state(&self.state_message());
    }

    /// Applies a scheduled alarm
    ///
    /// Stale alarms are ignored.
    pub fn receive_alarm<T: Tunnel, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        message: AlarmMessage,
        tunnel: &T,
        schedule_message: S,
    ) {
        match message {
            AlarmMessage::Countdown(tick) => {
                match self
                    .countdown
                    .receive_tick(&mut self.session, tick, schedule_message)
                {
                    TickOutcome::Stale => {}
                    TickOutcome::Decremented(remaining_seconds) => {
                        tunnel.send_message(
                            &countdown::UpdateMessage::TimeLeft {
                                remaining_seconds,
                                urgency: Urgency::from_remaining(remaining_seconds),
                            }
                            .into(),
                        );
                    }
                    TickOutcome::Expired { index, transition } => {
                        tunnel.send_message(&countdown::UpdateMessage::TimedOut { index }.into());
                        self.announce_transition(transition, tunnel);
                    }
                }
            }
        }
    }

    /// Full description of the current state, for a view that (re)connects
    pub fn state_message(&self) -> crate::SyncMessage {
        let message = match self.session.phase() {
            Phase::Setup => SyncMessage::Setup {
                error: self.last_error.clone(),
            },
            Phase::Playing => match self.session.current_question() {
                Some(question) => SyncMessage::Playing {
                    session: self.session.id(),
                    question: QuestionView::new(&self.session, question),
                    selected_answer: self.session.selected_answer(),
                },
                None => SyncMessage::Setup { error: None },
            },
            Phase::Completed => match self.session.result() {
                Some(result) => SyncMessage::Completed(result.clone()),
                None => SyncMessage::Setup { error: None },
            },
        };
        message.into()
    }

    fn require_setup(&self) -> Result<(), Error> {
        match self.session.phase() {
            Phase::Setup => Ok(()),
            phase => Err(session::Error::InvalidTransition {
                action: Action::Begin,
                phase,
            }
            .into()),
        }
    }

    fn fail<T: Tunnel>(&mut self, error: &Error, tunnel: &T) {
        warn!(%error, "quiz could not be started");
        let message = error.to_string();
        tunnel.send_message(&UpdateMessage::StartFailed(message.clone()).into());
        self.last_error = Some(message);
    }

    fn announce_transition<T: Tunnel>(&self, transition: Transition, tunnel: &T) {
        match transition {
            Transition::NextQuestion(_) => self.announce_question(tunnel),
            Transition::Completed => {
                if let Some(result) = self.session.result() {
                    tunnel.send_message(&UpdateMessage::Completed(result.clone()).into());
                }
            }
        }
    }

    fn announce_question<T: Tunnel>(&self, tunnel: &T) {
        if let Some(question) = self.session.current_question() {
            debug!(
                session = %self.session.id(),
                index = self.session.current_index(),
                "question announced"
            );
            tunnel.send_message(
                &UpdateMessage::Question(QuestionView::new(&self.session, question)).into(),
            );
        }
    }
}
