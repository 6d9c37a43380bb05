//! Player name management and validation
//!
//! This module validates every piece of free text a player types (real
//! names, secret names, celebrity names, guesses) and keeps the unique
//! id ⇄ name mappings a game needs. It also generates team names.

use std::collections::HashMap;

use heck::ToTitleCase;
use rustrict::CensorStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::watcher::Id;

/// Pet-style generated names (adjective + animal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Petname(pub u8);

impl Default for Petname {
    fn default() -> Self {
        Self(2)
    }
}

impl Petname {
    /// Generates a random title-cased name
    pub fn get_name(&self) -> String {
        loop {
            if let Some(name) = petname::petname(self.0, " ") {
                return name.to_title_case();
            }
        }
    }

    /// Generates a random name with its last word pluralised, used for teams
    pub fn get_plural_name(&self) -> String {
        pluralizer::pluralize(&self.get_name(), 2, false)
    }
}

/// Errors that can occur during name validation and assignment
#[derive(Error, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The requested name is already in use by another player
    #[error("name already in-use")]
    Used,
    /// The name is empty or contains only whitespace
    #[error("name cannot be empty")]
    Empty,
    /// The name contains inappropriate content
    #[error("name is inappropriate")]
    Sinful,
    /// The name exceeds the maximum allowed length
    #[error("name is too long")]
    TooLong,
}

/// Trims free text and checks it against a length limit
///
/// # Errors
///
/// * `Error::TooLong` - Text exceeds `max_length` characters after trimming
/// * `Error::Empty` - Text is empty after trimming
pub fn clean_text(text: &str, max_length: usize) -> Result<String, Error> {
    let text = rustrict::trim_whitespace(text);
    if text.is_empty() {
        return Err(Error::Empty);
    }
    if text.chars().count() > max_length {
        return Err(Error::TooLong);
    }
    Ok(text.to_owned())
}

/// Serialization helper for Names struct
#[derive(Deserialize)]
struct NamesSerde {
    mapping: HashMap<Id, String>,
    max_length: usize,
}

/// Unique names keyed by participant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "NamesSerde")]
pub struct Names {
    /// Primary mapping from participant ID to name
    mapping: HashMap<Id, String>,
    /// Longest accepted name in characters
    max_length: usize,

    /// Reverse mapping from name to participant ID
    #[serde(skip_serializing)]
    reverse_mapping: HashMap<String, Id>,
}

impl Default for Names {
    fn default() -> Self {
        Self::with_max_length(crate::constants::game::MAX_NAME_LENGTH)
    }
}

impl From<NamesSerde> for Names {
    fn from(serde: NamesSerde) -> Self {
        let NamesSerde {
            mapping,
            max_length,
        } = serde;
        let reverse_mapping = mapping
            .iter()
            .map(|(id, name)| (name.to_owned(), *id))
            .collect();
        Self {
            mapping,
            max_length,
            reverse_mapping,
        }
    }
}

impl Names {
    /// Creates an empty set of names accepting up to `max_length` characters
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            mapping: HashMap::new(),
            max_length,
            reverse_mapping: HashMap::new(),
        }
    }

    /// Retrieves the name associated with a participant
    pub fn get_name(&self, id: &Id) -> Option<String> {
        self.mapping.get(id).map(std::borrow::ToOwned::to_owned)
    }

    /// Assigns a name to a participant after validation
    ///
    /// A participant that already has a name gives it up for the new one;
    /// re-submitting the same name is accepted.
    ///
    /// # Returns
    ///
    /// The cleaned and assigned name.
    ///
    /// # Errors
    ///
    /// * `Error::TooLong` - Name exceeds the configured length
    /// * `Error::Empty` - Name is empty after trimming whitespace
    /// * `Error::Sinful` - Name contains inappropriate content
    /// * `Error::Used` - Name is already taken by another participant
    pub fn set_name(&mut self, id: Id, name: &str) -> Result<String, Error> {
        let name = self.check_name(id, name)?;
        if self.reverse_mapping.get(&name) == Some(&id) {
            return Ok(name);
        }
        self.remove(&id);
        self.mapping.insert(id, name.clone());
        self.reverse_mapping.insert(name.clone(), id);
        Ok(name)
    }

    /// Validates a name for a participant without assigning it
    ///
    /// # Errors
    ///
    /// Same as [`Names::set_name`].
    pub fn check_name(&self, id: Id, name: &str) -> Result<String, Error> {
        let name = clean_text(name, self.max_length)?;
        if name.as_str().is_inappropriate() {
            return Err(Error::Sinful);
        }
        match self.reverse_mapping.get(&name) {
            Some(owner) if *owner != id => Err(Error::Used),
            _ => Ok(name),
        }
    }

    /// Frees the name held by a participant
    pub fn remove(&mut self, id: &Id) -> Option<String> {
        let name = self.mapping.remove(id)?;
        self.reverse_mapping.remove(&name);
        Some(name)
    }

    /// Frees every name
    pub fn clear(&mut self) {
        self.mapping.clear();
        self.reverse_mapping.clear();
    }

    /// Retrieves the participant holding a name
    pub fn get_id(&self, name: &str) -> Option<Id> {
        self.reverse_mapping.get(name).copied()
    }
}
