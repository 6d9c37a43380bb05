//! # Name Games
//!
//! This library provides the game logic for two party games played from
//! phones around a room: **Celebrity**, where teams race to guess famous
//! names from clues, and **Family**, where players unmask each other's
//! secret names and absorb the unmasked into their family.
//!
//! A [`game::Game`] is the shared record of one game. Participants drive it
//! with [`game::IncomingMessage`]s, timed transitions arrive as
//! [`AlarmMessage`]s, and every change is pushed back to each participant
//! as the view derived for them ([`SyncMessage`]) through a
//! [`session::Tunnel`].

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
use derive_where::derive_where;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub mod celebrity;
pub mod chat;
pub mod constants;
pub mod family;
pub mod game;
pub mod game_id;
pub mod leaderboard;
pub mod names;
pub mod registry;
pub mod session;
pub mod teams;
pub mod watcher;

/// Views sent to participants, each replacing what they showed before
#[derive(Debug, Serialize, Clone, derive_more::From)]
pub enum SyncMessage {
    /// Views shared by both games
    Game(game::SyncMessage),
    /// Celebrity views
    Celebrity(celebrity::SyncMessage),
    /// Family views
    Family(family::SyncMessage),
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

/// One-off events sent to participants
#[derive(Debug, Serialize, Clone, derive_more::From)]
pub enum UpdateMessage {
    /// Events shared by both games
    Game(game::UpdateMessage),
    /// Family events
    Family(family::UpdateMessage),
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

/// Timed transitions scheduled by a game
///
/// The embedding server delivers each alarm back to
/// [`game::Game::receive_alarm`] once its delay has passed.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::From, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// Celebrity turn timer
    Celebrity(celebrity::AlarmMessage),
    /// Family secret name slideshow
    Family(family::AlarmMessage),
}

/// A truncated vector that maintains the exact count while limiting items
///
/// Used for long lists (players, chat) where the client only needs the
/// first few entries but should still know how many exist.
#[derive(Debug, Clone, Serialize)]
#[derive_where(Default)]
pub struct TruncatedVec<T> {
    /// The exact total count of items
    exact_count: usize,
    /// The truncated list of items (up to the limit)
    items: Vec<T>,
}

impl<T: Clone> TruncatedVec<T> {
    /// Creates a new truncated vector from an iterator
    ///
    /// # Arguments
    ///
    /// * `list` - An iterator over items to include
    /// * `limit` - Maximum number of items to include in the truncated vector
    /// * `exact_count` - The exact total count of items (may be larger than limit)
    pub fn new<I: Iterator<Item = T>>(list: I, limit: usize, exact_count: usize) -> Self {
        let items = list.take(limit).collect_vec();
        Self { exact_count, items }
    }

    /// Maps a function over the items in the truncated vector
    pub fn map<F, U>(self, f: F) -> TruncatedVec<U>
    where
        F: Fn(T) -> U,
    {
        TruncatedVec {
            exact_count: self.exact_count,
            items: self.items.into_iter().map(f).collect_vec(),
        }
    }

    /// Returns the exact count of items
    pub fn exact_count(&self) -> usize {
        self.exact_count
    }

    /// Returns the truncated items
    pub fn items(&self) -> &[T] {
        &self.items
    }
}
