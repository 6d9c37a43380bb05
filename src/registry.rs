//! Lookup of running games by id

use std::collections::HashMap;

use garde::Validate;
use serde::Serialize;
use thiserror::Error;

use crate::{
    game::{Game, Options},
    game_id::GameId,
    watcher::Id,
};

/// Errors from creating or finding a game
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No game has this id
    #[error("are you lost? no game with this id")]
    NotFound,
    /// The requested settings are not allowed
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

/// Every running game, keyed by id
#[derive(Debug, Default)]
pub struct Registry {
    games: HashMap<GameId, Game>,
}

impl Registry {
    /// Creates a game hosted by `host_id` under a fresh id
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidOptions` if the settings fail validation.
    pub fn create(&mut self, options: Options, host_id: Id) -> Result<GameId, Error> {
        options
            .validate()
            .map_err(|report| Error::InvalidOptions(report.to_string()))?;

        let id = loop {
            let id = GameId::new();
            if !self.games.contains_key(&id) {
                break id;
            }
        };
        self.games
            .insert(id.clone(), Game::new(id.clone(), options, host_id));
        Ok(id)
    }

    /// Finds a game from an id as typed by a player
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for unknown or malformed ids.
    pub fn get(&self, id: &str) -> Result<&Game, Error> {
        let id = id.parse::<GameId>().map_err(|_| Error::NotFound)?;
        self.games.get(&id).ok_or(Error::NotFound)
    }

    /// Finds a game for changing it
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for unknown or malformed ids.
    pub fn get_mut(&mut self, id: &str) -> Result<&mut Game, Error> {
        let id = id.parse::<GameId>().map_err(|_| Error::NotFound)?;
        self.games.get_mut(&id).ok_or(Error::NotFound)
    }

    /// Forgets a game, handing it back so its sessions can be closed
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for unknown or malformed ids.
    pub fn remove(&mut self, id: &str) -> Result<Game, Error> {
        let id = id.parse::<GameId>().map_err(|_| Error::NotFound)?;
        let game = self.games.remove(&id).ok_or(Error::NotFound)?;
        tracing::info!("Game {id} removed");
        Ok(game)
    }

    /// Number of running games
    pub fn len(&self) -> usize {
        self.games.len()
    }

    /// Whether no game is running
    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}
