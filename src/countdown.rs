//! Per-question countdown
//!
//! The countdown owns no thread or timer of its own. When armed it asks the
//! host, through a `schedule_message` callback, to deliver a
//! [`AlarmMessage::Tick`] one second later; the host hands the tick back
//! through the same entry point as user input, so ticks and clicks are
//! applied one after the other.
//!
//! Every tick is stamped with the session, the question and an arming
//! generation. Disarming bumps the generation, which turns every tick still in
//! flight into a stale one that is dropped on arrival. This is what makes a
//! tick scheduled before a selection, a restart or a question change harmless.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::{
    constants::countdown::TICK_INTERVAL,
    session::{Session, SessionId, Transition, Urgency},
};

/// Alarm messages driving the countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// One second has passed for an armed question
    Tick {
        /// Session the tick was scheduled for
        session: SessionId,
        /// Question index the tick was scheduled for
        question: usize,
        /// Arming generation the tick belongs to
        generation: u64,
    },
}

/// Update messages about the running clock
#[derive(Debug, Clone, Copy, Serialize)]
pub enum UpdateMessage {
    /// The visible remaining time changed
    TimeLeft {
        /// Seconds left for the current question
        remaining_seconds: u64,
        /// Colour band of the remaining time
        urgency: Urgency,
    },
    /// The current question ran out of time and was recorded as unanswered
    TimedOut {
        /// Index of the question that timed out
        index: usize,
    },
}

/// What a delivered tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick belonged to a disarmed countdown and was ignored
    Stale,
    /// The clock moved down to this many seconds
    Decremented(u64),
    /// The clock ran out and the question was finalized
    Expired {
        /// Index of the question that timed out
        index: usize,
        /// Where the session went next
        transition: Transition,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Arming {
    session: SessionId,
    question: usize,
}

/// Once-per-second countdown for the question awaiting an answer
#[derive(Debug, Default, Clone)]
pub struct Countdown {
    generation: u64,
    armed: Option<Arming>,
}

impl Countdown {
    /// Creates a disarmed countdown
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a tick is currently expected
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// The current arming generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Brings the countdown in line with the session
    ///
    /// The countdown is armed exactly while the session is playing and no
    /// answer is selected. Arming for a question that is already armed does
    /// nothing; arming for a new question or session starts a fresh series of
    /// ticks; anything else disarms.
    pub fn sync<S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        session: &Session,
        schedule_message: S,
    ) {
        if !session.is_awaiting_answer() {
            self.disarm();
            return;
        }

        let wanted = Arming {
            session: session.id(),
            question: session.current_index(),
        };
        if self.armed == Some(wanted) {
            return;
        }

        self.disarm();
        self.armed = Some(wanted);
        debug!(
            session = %wanted.session,
            question = wanted.question,
            generation = self.generation,
            "countdown armed"
        );
        self.schedule_tick(schedule_message);
    }

    /// Stops ticking; ticks already scheduled become stale
    pub fn disarm(&mut self) {
        if let Some(armed) = self.armed.take() {
            trace!(session = %armed.session, question = armed.question, "countdown disarmed");
        }
        self.generation += 1;
    }

    /// Whether a tick still belongs to the live arming
    pub fn is_live(&self, alarm: &AlarmMessage) -> bool {
        match *alarm {
            AlarmMessage::Tick {
                session,
                question,
                generation,
            } => {
                generation == self.generation
                    && self.armed
                        == Some(Arming {
                            session,
                            question,
                        })
            }
        }
    }

    /// Applies a delivered tick to the session
    ///
    /// A live tick either decrements the clock and schedules the next tick,
    /// or, when at most one second was left, times the question out exactly
    /// once and re-arms for whatever the session shows next.
    pub fn receive_tick<S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        session: &mut Session,
        alarm: AlarmMessage,
        mut schedule_message: S,
    ) -> TickOutcome {
        if !self.is_live(&alarm) || !session.is_awaiting_answer() {
            trace!(?alarm, "stale countdown tick dropped");
            return TickOutcome::Stale;
        }

        if session.remaining_seconds() <= 1 {
            let index = session.current_index();
            self.disarm();
            match session.timeout() {
                Ok(transition) => {
                    session.reset_remaining();
                    self.sync(session, &mut schedule_message);
                    TickOutcome::Expired { index, transition }
                }
                Err(error) => {
                    warn!(%error, "countdown expiry rejected by the session");
                    TickOutcome::Stale
                }
            }
        } else {
            let remaining = session.decrement_remaining();
            self.schedule_tick(schedule_message);
            TickOutcome::Decremented(remaining)
        }
    }

    fn schedule_tick<S: FnMut(crate::AlarmMessage, Duration)>(&self, mut schedule_message: S) {
        if let Some(armed) = self.armed {
            schedule_message(
                AlarmMessage::Tick {
                    session: armed.session,
                    question: armed.question,
                    generation: self.generation,
                }
                .into(),
                TICK_INTERVAL,
            );
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::session::{Phase, tests::three_questions};

    fn playing(total_seconds: u64) -> Session {
        let mut session = Session::new();
        session.begin("", three_questions(), total_seconds).unwrap();
        session
    }

    fn tick(alarm: &crate::AlarmMessage) -> AlarmMessage {
        match alarm {
            crate::AlarmMessage::Countdown(tick) => *tick,
        }
    }

    #[test]
    fn test_arms_only_while_awaiting_answer() {
        let mut countdown = Countdown::new();
        let mut scheduled = vec![];

        countdown.sync(&Session::new(), |alarm, duration| {
            scheduled.push((alarm, duration));
        });
        assert!(!countdown.is_armed());
        assert!(scheduled.is_empty());

        let session = playing(30);
        countdown.sync(&session, |alarm, duration| {
            scheduled.push((alarm, duration));
        });
        assert!(countdown.is_armed());
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].1, Duration::from_secs(1));
    }

    #[test]
    fn test_sync_is_idempotent() {
        let mut countdown = Countdown::new();
        let session = playing(30);
        let mut count = 0;
        countdown.sync(&session, |_, _| count += 1);
        countdown.sync(&session, |_, _| count += 1);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_selection_disarms() {
        let mut countdown = Countdown::new();
        let mut session = playing(30);
        let mut scheduled = vec![];
        countdown.sync(&session, |alarm, _| scheduled.push(alarm));

        session.select_answer(1).unwrap();
        countdown.sync(&session, |alarm, _| scheduled.push(alarm));
        assert!(!countdown.is_armed());

        // a tick that was already in flight is ignored
        let in_flight = tick(&scheduled[0]);
        assert!(!countdown.is_live(&in_flight));
        assert_eq!(
            countdown.receive_tick(&mut session, in_flight, |_, _| {}),
            TickOutcome::Stale
        );
        assert_eq!(session.selected_answer(), Some(1));
        assert_eq!(session.remaining_seconds(), 10);
        assert!(session.answers().is_empty());
    }

    #[test]
    fn test_tick_decrements_and_reschedules() {
        let mut countdown = Countdown::new();
        let mut session = playing(30);
        let mut scheduled = vec![];
        countdown.sync(&session, |alarm, _| scheduled.push(alarm));

        let first = tick(&scheduled[0]);
        assert_eq!(
            countdown.receive_tick(&mut session, first, |alarm, _| scheduled.push(alarm)),
            TickOutcome::Decremented(9)
        );
        assert_eq!(session.remaining_seconds(), 9);
        assert_eq!(scheduled.len(), 2);
        assert_eq!(tick(&scheduled[1]), first);
    }

    #[test]
    fn test_expiry_times_out_exactly_once() {
        let mut countdown = Countdown::new();
        let mut session = playing(6);
        assert_eq!(session.seconds_per_question(), 2);

        let mut scheduled = vec![];
        countdown.sync(&session, |alarm, _| scheduled.push(alarm));

        let first = tick(&scheduled[0]);
        assert_eq!(
            countdown.receive_tick(&mut session, first, |alarm, _| scheduled.push(alarm)),
            TickOutcome::Decremented(1)
        );

        let second = tick(&scheduled[1]);
        assert_eq!(
            countdown.receive_tick(&mut session, second, |alarm, _| scheduled.push(alarm)),
            TickOutcome::Expired {
                index: 0,
                transition: Transition::NextQuestion(1)
            }
        );
        assert_eq!(session.answers(), &[None]);
        assert_eq!(session.remaining_seconds(), 2);

        // a duplicate delivery of the expiring tick does nothing
        assert_eq!(
            countdown.receive_tick(&mut session, second, |alarm, _| scheduled.push(alarm)),
            TickOutcome::Stale
        );
        assert_eq!(session.answers(), &[None]);

        // the next question got a fresh arming
        let rearmed = tick(scheduled.last().unwrap());
        assert!(countdown.is_live(&rearmed));
        assert!(matches!(rearmed, AlarmMessage::Tick { question: 1, .. }));
    }

    #[test]
    fn test_expiry_on_last_question_completes_and_disarms() {
        let mut countdown = Countdown::new();
        let mut session = playing(3);
        assert_eq!(session.seconds_per_question(), 1);

        let mut scheduled = vec![];
        countdown.sync(&session, |alarm, _| scheduled.push(alarm));

        for index in 0..3 {
            let next = tick(scheduled.last().unwrap());
            let outcome = countdown.receive_tick(&mut session, next, |alarm, _| scheduled.push(alarm));
            assert!(matches!(outcome, TickOutcome::Expired { index: i, .. } if i == index));
        }

        assert_eq!(session.phase(), Phase::Completed);
        assert_eq!(session.answers(), &[None, None, None]);
        assert!(!countdown.is_armed());
        assert_eq!(scheduled.len(), 3);
    }

    #[test]
    fn test_advance_invalidates_old_ticks() {
        let mut countdown = Countdown::new();
        let mut session = playing(30);
        let mut scheduled = vec![];
        countdown.sync(&session, |alarm, _| scheduled.push(alarm));
        let old = tick(&scheduled[0]);

        session.advance().unwrap();
        countdown.sync(&session, |alarm, _| scheduled.push(alarm));

        assert!(!countdown.is_live(&old));
        assert_eq!(
            countdown.receive_tick(&mut session, old, |_, _| {}),
            TickOutcome::Stale
        );
        assert_eq!(session.remaining_seconds(), 10);
    }

    #[test]
    fn test_restart_invalidates_old_ticks() {
        let mut countdown = Countdown::new();
        let mut session = playing(30);
        let mut scheduled = vec![];
        countdown.sync(&session, |alarm, _| scheduled.push(alarm));
        let old = tick(&scheduled[0]);

        session.restart();
        countdown.sync(&session, |alarm, _| scheduled.push(alarm));
        session.begin("", three_questions(), 30).unwrap();
        countdown.sync(&session, |alarm, _| scheduled.push(alarm));

        assert!(!countdown.is_live(&old));
        assert_eq!(
            countdown.receive_tick(&mut session, old, |_, _| {}),
            TickOutcome::Stale
        );
        assert!(countdown.is_live(&tick(scheduled.last().unwrap())));
    }
}
