//! View communication
//!
//! This module defines the trait for tunneling messages from the quiz engine
//! to the view observing it. The tunnel abstraction allows for different
//! front ends (a terminal, a web socket, a test recorder) while the engine
//! stays the same.

use super::{SyncMessage, UpdateMessage};

/// Trait for sending messages through a communication tunnel
///
/// Implementations might render directly, forward over WebSockets or
/// Server-Sent Events, or record messages for tests.
pub trait Tunnel {
    /// Sends an update message to the view
    ///
    /// Update messages describe a single change, such as a new question or
    /// one second less on the clock.
    fn send_message(&self, message: &UpdateMessage);

    /// Sends a state synchronization message to the view
    ///
    /// Sync messages carry everything needed to redraw from scratch, and are
    /// used when a view connects or after a restart.
    fn send_state(&self, state: &SyncMessage);

    /// Closes the communication tunnel
    ///
    /// Called once the game that owned the tunnel is shut down.
    fn close(self);
}
