//! Participant roster management
//!
//! This module tracks everyone connected to a game: registered players and
//! spectators. It owns the single host slot, so "exactly one player is
//! host" holds by construction rather than by per-player flags, and it
//! provides the helpers used to push views and events to participants.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    fmt::Display,
    str::FromStr,
};

use enum_map::{Enum, EnumMap};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;
use web_time::SystemTime;

use super::{SyncMessage, UpdateMessage, session::Tunnel};

/// A unique identifier for a participant
///
/// The client generates this once and keeps presenting it, so the same
/// browser maps to the same player across reloads.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random participant ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    /// Parses an ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// The role of a participant in a game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Watching the game without a player record
    Spectator,
    /// A player in the game
    Player(PlayerValue),
}

/// The kind of participant without associated data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum ValueKind {
    /// A spectator
    Spectator,
    /// A player
    Player,
}

impl Value {
    /// Returns the kind of this value without the associated data
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Spectator => ValueKind::Spectator,
            Value::Player(_) => ValueKind::Player,
        }
    }
}

/// Game-independent data kept for every player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerValue {
    /// The player's real name, `None` while they are still joining
    pub name: Option<String>,
    /// Last time this record was written
    pub updated_at: SystemTime,
}

impl Default for PlayerValue {
    fn default() -> Self {
        Self {
            name: None,
            updated_at: SystemTime::now(),
        }
    }
}

impl PlayerValue {
    /// The name shown in player lists
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Player joining...")
    }
}

/// Serialization helper for Watchers struct
#[derive(Deserialize)]
struct WatchersSerde {
    mapping: HashMap<Id, Value>,
    host: Option<Id>,
}

/// Manages all participants of a game
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(from = "WatchersSerde")]
pub struct Watchers {
    /// Primary mapping from participant ID to their role
    mapping: HashMap<Id, Value>,
    /// The one host of the game, always a player while any player exists
    host: Option<Id>,

    /// Reverse mapping organized by participant kind
    #[serde(skip_serializing)]
    reverse_mapping: EnumMap<ValueKind, HashSet<Id>>,
}

impl From<WatchersSerde> for Watchers {
    fn from(serde: WatchersSerde) -> Self {
        let WatchersSerde { mapping, host } = serde;
        let mut reverse_mapping: EnumMap<ValueKind, HashSet<Id>> = EnumMap::default();
        for (id, value) in &mapping {
            reverse_mapping[value.kind()].insert(*id);
        }
        Self {
            mapping,
            host,
            reverse_mapping,
        }
    }
}

/// Errors that can occur when managing the roster
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The game has reached the maximum number of allowed participants
    #[error("maximum number of players reached")]
    MaximumPlayers,
    /// The participant is not a player of this game
    #[error("not a player in this game")]
    NotPlayer,
    /// The host cannot be removed by the host
    #[error("the host cannot be removed")]
    CannotRemoveHost,
}

/// Orders players for display
///
/// With `host_first` the host leads. Named players follow in name order,
/// players still joining go last, and ids break any remaining tie.
fn compare_players(
    (a_id, a): (&Id, &PlayerValue),
    (b_id, b): (&Id, &PlayerValue),
    host: Option<Id>,
) -> Ordering {
    if a_id == b_id {
        return Ordering::Equal;
    }
    if let Some(host) = host {
        if *a_id == host {
            return Ordering::Less;
        }
        if *b_id == host {
            return Ordering::Greater;
        }
    }
    match (&a.name, &b.name) {
        (None, None) => a_id.cmp(b_id),
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a_name), Some(b_name)) => a_name.cmp(b_name).then_with(|| a_id.cmp(b_id)),
    }
}

impl Watchers {
    /// Creates a roster with the host already registered as a player
    pub fn with_host_id(host_id: Id) -> Self {
        let mut watchers = Self::default();
        watchers
            .mapping
            .insert(host_id, Value::Player(PlayerValue::default()));
        watchers.reverse_mapping[ValueKind::Player].insert(host_id);
        watchers.host = Some(host_id);
        watchers
    }

    /// Gets all participants with active tunnels
    pub fn vec<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, tunnel_finder: F) -> Vec<(Id, T, Value)> {
        self.reverse_mapping
            .values()
            .flat_map(|v| v.iter())
            .filter_map(|x| match (tunnel_finder(*x), self.mapping.get(x)) {
                (Some(t), Some(v)) => Some((*x, t, v.to_owned())),
                _ => None,
            })
            .collect_vec()
    }

    /// Gets the count of participants of a specific kind
    pub fn specific_count(&self, filter: ValueKind) -> usize {
        self.reverse_mapping[filter].len()
    }

    /// Adds a participant
    ///
    /// # Errors
    ///
    /// Returns `Error::MaximumPlayers` if the roster is full.
    pub fn add_watcher(&mut self, watcher_id: Id, watcher_value: Value) -> Result<(), Error> {
        if !self.mapping.contains_key(&watcher_id)
            && self.mapping.len() >= crate::constants::game::MAX_PLAYER_COUNT
        {
            return Err(Error::MaximumPlayers);
        }

        let kind = watcher_value.kind();
        if let Some(old) = self.mapping.insert(watcher_id, watcher_value) {
            self.reverse_mapping[old.kind()].remove(&watcher_id);
        }
        self.reverse_mapping[kind].insert(watcher_id);

        match kind {
            ValueKind::Player if self.host.is_none() => self.host = Some(watcher_id),
            ValueKind::Spectator if self.host == Some(watcher_id) => {
                self.hand_off_host(watcher_id);
            }
            _ => {}
        }

        Ok(())
    }

    /// Updates the role of an existing participant
    ///
    /// Demoting the host to spectator hands the host slot to another player;
    /// a promoted spectator takes an empty host slot.
    pub fn update_watcher_value(&mut self, watcher_id: Id, watcher_value: Value) {
        let old_kind = match self.mapping.get(&watcher_id) {
            Some(v) => v.kind(),
            _ => return,
        };
        let new_kind = watcher_value.kind();
        if old_kind != new_kind {
            self.reverse_mapping[old_kind].remove(&watcher_id);
            self.reverse_mapping[new_kind].insert(watcher_id);
        }
        self.mapping.insert(watcher_id, watcher_value);

        match new_kind {
            ValueKind::Player if self.host.is_none() => self.host = Some(watcher_id),
            ValueKind::Spectator if self.host == Some(watcher_id) => {
                self.hand_off_host(watcher_id);
            }
            _ => {}
        }
    }

    /// Removes a participant entirely, handing off host if needed
    ///
    /// # Returns
    ///
    /// The removed role, or `None` if the participant was unknown
    pub fn remove_watcher(&mut self, watcher_id: Id) -> Option<Value> {
        let value = self.mapping.remove(&watcher_id)?;
        self.reverse_mapping[value.kind()].remove(&watcher_id);
        if self.host == Some(watcher_id) {
            self.hand_off_host(watcher_id);
        }
        Some(value)
    }

    fn hand_off_host(&mut self, old_host: Id) {
        self.host = self
            .sorted_players(false)
            .into_iter()
            .map(|(id, _)| id)
            .find(|id| *id != old_host);
        match self.host {
            Some(new_host) => tracing::info!("Player {new_host} is now the host"),
            None => tracing::info!("Last player left, game has no host"),
        }
    }

    /// The current host
    pub fn host(&self) -> Option<Id> {
        self.host
    }

    /// Whether the participant is the host
    pub fn is_host(&self, watcher_id: Id) -> bool {
        self.host == Some(watcher_id)
    }

    /// Makes a player the host, replacing the previous one
    ///
    /// # Errors
    ///
    /// Returns `Error::NotPlayer` if the participant is not a player.
    pub fn set_host(&mut self, watcher_id: Id) -> Result<(), Error> {
        if !self.is_player(watcher_id) {
            return Err(Error::NotPlayer);
        }
        self.host = Some(watcher_id);
        Ok(())
    }

    /// Gets the role of a participant
    pub fn get_watcher_value(&self, watcher_id: Id) -> Option<Value> {
        self.mapping.get(&watcher_id).map(ToOwned::to_owned)
    }

    /// Checks if a participant exists
    pub fn has_watcher(&self, watcher_id: Id) -> bool {
        self.mapping.contains_key(&watcher_id)
    }

    /// Checks if a participant is a player
    pub fn is_player(&self, watcher_id: Id) -> bool {
        self.reverse_mapping[ValueKind::Player].contains(&watcher_id)
    }

    /// Gets the player record of a participant
    pub fn get_player(&self, watcher_id: Id) -> Option<&PlayerValue> {
        match self.mapping.get(&watcher_id) {
            Some(Value::Player(player)) => Some(player),
            _ => None,
        }
    }

    /// Sets (or clears) a player's name and bumps their timestamp
    ///
    /// # Errors
    ///
    /// Returns `Error::NotPlayer` if the participant is not a player.
    pub fn set_name(&mut self, watcher_id: Id, name: Option<String>) -> Result<(), Error> {
        match self.mapping.get_mut(&watcher_id) {
            Some(Value::Player(player)) => {
                player.name = name;
                player.updated_at = SystemTime::now();
                Ok(())
            }
            _ => Err(Error::NotPlayer),
        }
    }

    /// Gets the name of a player
    pub fn get_name(&self, watcher_id: Id) -> Option<String> {
        self.get_player(watcher_id).and_then(|p| p.name.clone())
    }

    /// Ids of all players, in no particular order
    pub fn player_ids(&self) -> Vec<Id> {
        self.reverse_mapping[ValueKind::Player]
            .iter()
            .copied()
            .collect_vec()
    }

    /// All players in display order
    pub fn sorted_players(&self, host_first: bool) -> Vec<(Id, PlayerValue)> {
        let host = if host_first { self.host } else { None };
        self.mapping
            .iter()
            .filter_map(|(id, value)| match value {
                Value::Player(player) => Some((id, player)),
                Value::Spectator => None,
            })
            .sorted_by(|a, b| compare_players(*a, *b, host))
            .map(|(id, player)| (*id, player.clone()))
            .collect_vec()
    }

    /// Closes a participant's tunnel
    pub fn remove_watcher_session<T: Tunnel, F: Fn(Id) -> Option<T>>(
        watcher_id: Id,
        tunnel_finder: F,
    ) {
        if let Some(x) = tunnel_finder(watcher_id) {
            x.close();
        }
    }

    /// Sends an update message to a specific participant
    pub fn send_message<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &UpdateMessage,
        watcher_id: Id,
        tunnel_finder: F,
    ) {
        let Some(session) = tunnel_finder(watcher_id) else {
            return;
        };

        session.send_message(message);
    }

    /// Sends a view to a specific participant
    pub fn send_state<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &SyncMessage,
        watcher_id: Id,
        tunnel_finder: F,
    ) {
        let Some(session) = tunnel_finder(watcher_id) else {
            return;
        };

        session.send_state(message);
    }

    /// Sends personalized update messages to every connected participant
    ///
    /// The sender can return `None` to skip a participant.
    pub fn announce_with<S, T: Tunnel, F: Fn(Id) -> Option<T>>(&self, sender: S, tunnel_finder: F)
    where
        S: Fn(Id, ValueKind) -> Option<UpdateMessage>,
    {
        for (watcher, session, v) in self.vec(tunnel_finder) {
            let Some(message) = sender(watcher, v.kind()) else {
                continue;
            };

            session.send_message(&message);
        }
    }

    /// Sends each connected participant a freshly derived view
    ///
    /// A view may span several messages (header, roster, screen); they are
    /// sent in order.
    pub fn sync_with<S, T: Tunnel, F: Fn(Id) -> Option<T>>(&self, view: S, tunnel_finder: F)
    where
        S: Fn(Id) -> Vec<SyncMessage>,
    {
        for (watcher, session, _) in self.vec(tunnel_finder) {
            for message in view(watcher) {
                session.send_state(&message);
            }
        }
    }
}
