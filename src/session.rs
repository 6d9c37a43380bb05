//! Communication session management
//!
//! The realtime document store is external to this crate. Each connected
//! participant is reached through a [`Tunnel`], which receives derived
//! views and one-off events whenever the game record changes.

use super::{SyncMessage, UpdateMessage};

/// Trait for sending messages through a communication tunnel
pub trait Tunnel {
    /// Sends a one-off event to the client
    ///
    /// # Arguments
    ///
    /// * `message` - The update message to send
    fn send_message(&self, message: &UpdateMessage);

    /// Sends the client its complete current view
    ///
    /// Views replace whatever the client showed before, the same way a
    /// fresh document snapshot would.
    ///
    /// # Arguments
    ///
    /// * `state` - The synchronization message to send
    fn send_state(&self, state: &SyncMessage);

    /// Closes the communication tunnel
    fn close(self);
}
