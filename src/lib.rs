//! # Timed Quiz Library
//!
//! This library provides the core logic of a timed single-player multiple
//! choice quiz. It handles the session state machine, the per-question
//! countdown, scoring and review, and the boundary to whatever supplies the
//! questions, whether a built-in bank or a generative model.
//!
//! A [`game::Game`] ties these together and reports every change to a view
//! through a [`tunnel::Tunnel`]. With the `runtime` feature, [`driver::spawn`]
//! hosts a game on a tokio task and delivers its countdown alarms.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]
use serde::{Deserialize, Serialize};

pub mod constants;

pub mod countdown;
#[cfg(feature = "runtime")]
pub mod driver;
pub mod game;
pub mod question;
pub mod scoring;
pub mod session;
pub mod supply;
pub mod tunnel;

/// Messages describing the whole state, for a view that needs to redraw
#[derive(Debug, Serialize, Clone, derive_more::From)]
pub enum SyncMessage {
    /// Quiz state
    Game(game::SyncMessage),
}

impl SyncMessage {
    /// Converts the sync message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Messages describing a single change of the game state
///
/// Update messages notify the view about changes such as a new question, a
/// selection, or one second less on the clock.
#[derive(Debug, Serialize, Clone, derive_more::From)]
pub enum UpdateMessage {
    /// Quiz updates
    Game(game::UpdateMessage),
    /// Clock updates
    Countdown(countdown::UpdateMessage),
}

impl UpdateMessage {
    /// Converts the update message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Alarm messages for timed events
///
/// The game asks its host to deliver these after a delay; the host hands
/// them back through [`game::Game::receive_alarm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::From, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// Countdown ticks
    Countdown(countdown::AlarmMessage),
}
