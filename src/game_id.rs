//! Game ID generation and parsing
//!
//! Game IDs are human readable (`adjective-animal-number`) so they can be
//! read out loud across a room. They are case-insensitive: whatever a
//! player types is lower-cased before lookup.

use std::{fmt::Display, str::FromStr};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

use crate::constants::game::GAME_ID_NUMBER_LIMIT;

/// A unique, human readable identifier for a game
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub struct GameId(String);

/// Errors produced while parsing a game id typed by a player
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Nothing was entered
    #[error("game id cannot be empty")]
    Empty,
    /// The id contains characters a generated id never has
    #[error("game id contains invalid characters")]
    InvalidCharacter,
}

impl GameId {
    /// Creates a new random game ID such as `brave-otter-42`
    pub fn new() -> Self {
        let words = loop {
            if let Some(words) = petname::petname(2, "-") {
                break words;
            }
        };
        Self(format!(
            "{words}-{}",
            fastrand::u8(0..GAME_ID_NUMBER_LIMIT)
        ))
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for GameId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for GameId {
    type Err = Error;

    /// Parses a game id, lower-casing and trimming it first
    ///
    /// # Errors
    ///
    /// Returns [`Error::Empty`] for blank input and
    /// [`Error::InvalidCharacter`] if anything other than ASCII letters,
    /// digits or dashes remains.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim().to_lowercase();
        if id.is_empty() {
            return Err(Error::Empty);
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(Error::InvalidCharacter);
        }
        Ok(Self(id))
    }
}
