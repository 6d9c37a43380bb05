//! Shared game lifecycle
//!
//! This module contains the record of one game and everything both games
//! have in common: who is connected, who is host, joining and leaving,
//! routing messages to the game being played, and pushing every
//! participant the view derived for them after each change.

use std::fmt::Debug;

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;
use web_time::{Duration, SystemTime};

use super::{
    AlarmMessage, TruncatedVec,
    celebrity::{self, Celebrity},
    constants,
    family::{self, Family},
    game_id::GameId,
    names::{self, Names},
    session::Tunnel,
    watcher::{self, Id, PlayerValue, Value, ValueKind, Watchers},
};

/// Which game is being played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameType {
    /// Teams guess famous names against the clock
    Celebrity,
    /// Players unmask secret names and gather families
    Family,
}

/// Settings chosen when a game is created
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Validate)]
pub enum Options {
    /// A Celebrity game
    Celebrity(#[garde(dive)] celebrity::Options),
    /// A Family game
    Family,
}

impl Default for Options {
    fn default() -> Self {
        Self::Celebrity(celebrity::Options::default())
    }
}

/// The game being played and its state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Kind {
    /// A Celebrity game
    Celebrity(Celebrity),
    /// A Family game
    Family(Family),
}

impl Kind {
    fn new(options: Options) -> Self {
        match options {
            Options::Celebrity(options) => Self::Celebrity(Celebrity::new(options)),
            Options::Family => Self::Family(Family::default()),
        }
    }

    /// Which game this is
    pub fn game_type(&self) -> GameType {
        match self {
            Self::Celebrity(_) => GameType::Celebrity,
            Self::Family(_) => GameType::Family,
        }
    }

    fn in_lobby(&self) -> bool {
        match self {
            Self::Celebrity(game) => game.in_lobby(),
            Self::Family(game) => game.in_lobby(),
        }
    }

    fn is_registered(&self, player_id: Id) -> bool {
        match self {
            Self::Celebrity(game) => game.is_registered(player_id),
            Self::Family(game) => game.secret_name(player_id).is_some(),
        }
    }

    fn remove_player(&mut self, player_id: Id) {
        match self {
            Self::Celebrity(game) => game.remove_player(player_id),
            Self::Family(game) => game.remove_player(player_id),
        }
    }
}

/// Errors reported back to the participant whose action was rejected
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Submitted text was rejected
    #[error(transparent)]
    Name(#[from] names::Error),
    /// The roster rejected the change
    #[error(transparent)]
    Roster(#[from] watcher::Error),
    /// The action belongs to another phase of the game
    #[error("not possible at this point of the game")]
    WrongPhase,
    /// Someone else is expected to act
    #[error("it is not your turn")]
    NotYourTurn,
    /// The player named is not available
    #[error("no such player")]
    UnknownPlayer,
    /// Removing a team would leave too few
    #[error("there must be at least {} teams", constants::celebrity::MIN_TEAM_COUNT)]
    TooFewTeams,
    /// Nobody has joined yet
    #[error("no players have joined")]
    NotEnoughPlayers,
    /// The answer does not fit the guess
    #[error("that answer does not fit the guess")]
    InvalidAnswer,
    /// The action belongs to the other game
    #[error("this game is not being played here")]
    WrongGame,
}

/// Messages received from participants, categorized by the sender's role
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingMessage {
    /// Messages from players
    Player(IncomingPlayerMessage),
    /// Messages from the host
    Host(IncomingHostMessage),
    /// Messages from spectators
    Spectator(IncomingSpectatorMessage),
}

impl IncomingMessage {
    /// Whether the sender's role allows this message
    fn follows(&self, sender_kind: ValueKind, is_host: bool) -> bool {
        matches!(
            (self, sender_kind),
            (IncomingMessage::Player(_), ValueKind::Player)
                | (IncomingMessage::Spectator(_), ValueKind::Spectator)
        ) || (is_host && matches!(self, IncomingMessage::Host(_)))
    }

    /// Whether only the sender's chat view changes
    fn is_chat(&self) -> bool {
        matches!(
            self,
            IncomingMessage::Player(IncomingPlayerMessage::Family(
                family::IncomingPlayerMessage::Chat(_)
            ))
        )
    }
}

/// Messages any player may send
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingPlayerMessage {
    /// Leave the game for good
    Leave,
    /// Take over as host
    AssumeHost,
    /// Stop playing and keep watching
    JustWatching,
    /// A Celebrity action
    Celebrity(celebrity::IncomingPlayerMessage),
    /// A Family action
    Family(family::IncomingPlayerMessage),
}

/// Messages only the host may send
#[derive(Debug, Deserialize, Clone, Copy)]
pub enum IncomingHostMessage {
    /// Turn another player into a spectator
    Boot(Id),
    /// A Celebrity host action
    Celebrity(celebrity::IncomingHostMessage),
    /// A Family host action
    Family(family::IncomingHostMessage),
}

/// Messages spectators may send
#[derive(Debug, Deserialize, Clone, Copy)]
pub enum IncomingSpectatorMessage {
    /// Join as a player while the lobby is open
    Play,
}

/// A player as listed in rosters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerEntry {
    /// Player id, used as the target of actions such as booting
    pub id: Id,
    /// Real name, or a placeholder while joining
    pub name: String,
    /// Whether this player is the host
    pub host: bool,
    /// Whether this player finished joining the current game
    pub registered: bool,
}

impl PlayerEntry {
    /// Lists a player of the roster
    pub fn new(id: Id, watchers: &Watchers, registered: bool) -> Self {
        Self {
            id,
            name: watchers
                .get_player(id)
                .map(|player| player.display_name().to_owned())
                .unwrap_or_default(),
            host: watchers.is_host(id),
            registered,
        }
    }
}

/// Events sent to a single participant
#[derive(Debug, Serialize, Clone)]
pub enum UpdateMessage {
    /// Acknowledges the id a participant connected with
    IdAssign(Id),
    /// The participant's last action was rejected
    Error(Error),
    /// The participant was removed from the players by the host
    Removed,
}

/// Views shared by both games
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub enum SyncMessage {
    /// Who the viewer is in this game
    Header {
        /// Id to share with other players
        game_id: GameId,
        /// Which game is played
        game_type: GameType,
        /// Viewer's real name
        name: Option<String>,
        /// Viewer's secret name, in Family
        secret_name: Option<String>,
        /// Whether the viewer is the host
        host: bool,
        /// Whether the viewer is a player rather than a spectator
        player: bool,
    },
    /// Everyone playing, host first
    Players(TruncatedVec<PlayerEntry>),
}

/// The record of one game
#[derive(Clone, Serialize, Deserialize)]
pub struct Game {
    id: GameId,
    kind: Kind,
    /// Everyone connected to the game
    pub watchers: Watchers,
    /// Real names of players
    names: Names,
    created_at: SystemTime,
    updated_at: SystemTime,
}

impl Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("id", &self.id)
            .field("game_type", &self.kind.game_type())
            .finish_non_exhaustive()
    }
}

impl Game {
    /// Creates a game in its lobby with the host registered as a player
    pub fn new(id: GameId, options: Options, host_id: Id) -> Self {
        let now = SystemTime::now();
        tracing::info!("Game {id} created by {host_id}");
        Self {
            id,
            kind: Kind::new(options),
            watchers: Watchers::with_host_id(host_id),
            names: Names::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The id players share to join
    pub fn id(&self) -> &GameId {
        &self.id
    }

    /// The game being played
    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Which game is being played
    pub fn game_type(&self) -> GameType {
        self.kind.game_type()
    }

    /// When the game was created
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// When the game last changed
    pub fn updated_at(&self) -> SystemTime {
        self.updated_at
    }

    fn touch(&mut self) {
        self.updated_at = SystemTime::now();
    }

    fn header(&self, watcher_id: Id) -> SyncMessage {
        SyncMessage::Header {
            game_id: self.id.clone(),
            game_type: self.kind.game_type(),
            name: self.watchers.get_name(watcher_id),
            secret_name: match &self.kind {
                Kind::Family(game) => game.secret_name(watcher_id),
                Kind::Celebrity(_) => None,
            },
            host: self.watchers.is_host(watcher_id),
            player: self.watchers.is_player(watcher_id),
        }
    }

    fn players_message(&self) -> SyncMessage {
        let players = self.watchers.sorted_players(true);
        let count = players.len();
        SyncMessage::Players(TruncatedVec::new(
            players
                .into_iter()
                .map(|(id, _)| PlayerEntry::new(id, &self.watchers, self.kind.is_registered(id))),
            constants::game::PLAYER_LIST_LIMIT,
            count,
        ))
    }

    /// Everything a participant should show right now, in order
    pub fn state_messages(&self, watcher_id: Id) -> Vec<crate::SyncMessage> {
        let mut messages = vec![self.header(watcher_id).into()];
        match &self.kind {
            Kind::Celebrity(game) => {
                messages.push(
                    game.roster_message(&self.watchers)
                        .map_or_else(|| self.players_message().into(), Into::into),
                );
                messages.push(game.state_message(watcher_id, &self.watchers).into());
            }
            Kind::Family(game) => {
                messages.push(game.roster_message(&self.watchers).into());
                messages.push(game.state_message(watcher_id, &self.watchers).into());
                if let Some(chat) = game.chat_message(watcher_id, &self.watchers) {
                    messages.push(chat.into());
                }
            }
        }
        messages
    }

    /// Pushes every connected participant their view
    fn sync<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, tunnel_finder: F) {
        self.watchers
            .sync_with(|id| self.state_messages(id), tunnel_finder);
    }

    /// Connects a participant
    ///
    /// Known participants get their view again. While the lobby is open an
    /// unknown participant joins as a player still to enter a name; later
    /// they can only watch.
    ///
    /// # Errors
    ///
    /// Returns `watcher::Error::MaximumPlayers` if the game is full.
    pub fn add_participant<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher_id: Id,
        tunnel_finder: F,
    ) -> Result<(), watcher::Error> {
        if self.watchers.has_watcher(watcher_id) {
            self.update_session(watcher_id, tunnel_finder);
            return Ok(());
        }

        let value = if self.kind.in_lobby() {
            Value::Player(PlayerValue::default())
        } else {
            Value::Spectator
        };
        let kind = value.kind();
        self.watchers.add_watcher(watcher_id, value)?;
        self.touch();
        tracing::info!(
            "Participant {watcher_id} joined game {} as {kind:?}, {} players now",
            self.id,
            self.watchers.specific_count(ValueKind::Player)
        );

        self.watchers.send_message(
            &UpdateMessage::IdAssign(watcher_id).into(),
            watcher_id,
            &tunnel_finder,
        );
        self.sync(tunnel_finder);
        Ok(())
    }

    /// Resends a reconnected participant their view
    pub fn update_session<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        watcher_id: Id,
        tunnel_finder: F,
    ) {
        for message in self.state_messages(watcher_id) {
            self.watchers
                .send_state(&message, watcher_id, &tunnel_finder);
        }
    }

    /// Turns a player into a spectator, freeing their name
    fn demote(&mut self, player_id: Id) {
        self.names.remove(&player_id);
        self.kind.remove_player(player_id);
        self.watchers
            .update_watcher_value(player_id, Value::Spectator);
    }

    /// Handles a message from a participant
    ///
    /// Messages the sender's role does not allow are ignored. Rejected
    /// actions are reported to the sender alone; anything else updates the
    /// record and every participant's view.
    pub fn receive_message<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
    >(
        &mut self,
        watcher_id: Id,
        message: IncomingMessage,
        schedule_message: S,
        tunnel_finder: F,
    ) {
        let Some(watcher_value) = self.watchers.get_watcher_value(watcher_id) else {
            return;
        };

        if !message.follows(watcher_value.kind(), self.watchers.is_host(watcher_id)) {
            tracing::debug!("Ignored {message:?} from {watcher_id}");
            return;
        }

        let resync = !message.is_chat();
        let result = match message {
            IncomingMessage::Player(message) => {
                self.receive_player_message(watcher_id, message, schedule_message, &tunnel_finder)
            }
            IncomingMessage::Host(message) => {
                self.receive_host_message(watcher_id, message, schedule_message, &tunnel_finder)
            }
            IncomingMessage::Spectator(IncomingSpectatorMessage::Play) => {
                if self.kind.in_lobby() {
                    self.watchers
                        .update_watcher_value(watcher_id, Value::Player(PlayerValue::default()));
                    Ok(())
                } else {
                    Err(Error::WrongPhase)
                }
            }
        };

        match result {
            Ok(()) => {
                self.touch();
                if resync {
                    self.sync(tunnel_finder);
                }
            }
            Err(error) => {
                tracing::warn!("Rejected action from {watcher_id} in game {}: {error}", self.id);
                self.watchers.send_message(
                    &UpdateMessage::Error(error).into(),
                    watcher_id,
                    tunnel_finder,
                );
            }
        }
    }

    fn receive_player_message<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
    >(
        &mut self,
        player_id: Id,
        message: IncomingPlayerMessage,
        schedule_message: S,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        match message {
            IncomingPlayerMessage::Leave => {
                self.names.remove(&player_id);
                self.kind.remove_player(player_id);
                self.watchers.remove_watcher(player_id);
                Watchers::remove_watcher_session(player_id, tunnel_finder);
                tracing::info!("Player {player_id} left game {}", self.id);
            }
            IncomingPlayerMessage::AssumeHost => {
                self.watchers.set_host(player_id)?;
                tracing::info!("Player {player_id} assumed host of game {}", self.id);
            }
            IncomingPlayerMessage::JustWatching => {
                self.demote(player_id);
                tracing::info!("Player {player_id} is just watching game {}", self.id);
            }
            IncomingPlayerMessage::Celebrity(message) => match &mut self.kind {
                Kind::Celebrity(game) => game.receive_player_message(
                    &mut self.watchers,
                    &mut self.names,
                    player_id,
                    message,
                    schedule_message,
                )?,
                Kind::Family(_) => return Err(Error::WrongGame),
            },
            IncomingPlayerMessage::Family(message) => match &mut self.kind {
                Kind::Family(game) => game.receive_player_message(
                    &mut self.watchers,
                    &mut self.names,
                    player_id,
                    message,
                    tunnel_finder,
                )?,
                Kind::Celebrity(_) => return Err(Error::WrongGame),
            },
        }
        Ok(())
    }

    fn receive_host_message<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
    >(
        &mut self,
        host_id: Id,
        message: IncomingHostMessage,
        schedule_message: S,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        match message {
            IncomingHostMessage::Boot(player_id) => {
                if player_id == host_id {
                    return Err(watcher::Error::CannotRemoveHost.into());
                }
                if !self.watchers.is_player(player_id) {
                    return Err(Error::UnknownPlayer);
                }
                self.demote(player_id);
                self.watchers.send_message(
                    &UpdateMessage::Removed.into(),
                    player_id,
                    tunnel_finder,
                );
                tracing::info!("Host booted {player_id} from game {}", self.id);
            }
            IncomingHostMessage::Celebrity(message) => match &mut self.kind {
                Kind::Celebrity(game) => game.receive_host_message(&self.watchers, message)?,
                Kind::Family(_) => return Err(Error::WrongGame),
            },
            IncomingHostMessage::Family(message) => match &mut self.kind {
                Kind::Family(game) => {
                    game.receive_host_message(&self.watchers, message, schedule_message)?;
                }
                Kind::Celebrity(_) => return Err(Error::WrongGame),
            },
        }
        Ok(())
    }

    /// Handles a timed transition scheduled earlier
    ///
    /// Alarms that no longer apply, such as the clock of a turn that
    /// already ended, change nothing.
    pub fn receive_alarm<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
    >(
        &mut self,
        message: AlarmMessage,
        schedule_message: S,
        tunnel_finder: F,
    ) {
        let changed = match (&mut self.kind, &message) {
            (Kind::Celebrity(game), AlarmMessage::Celebrity(message)) => {
                game.receive_alarm(message)
            }
            (Kind::Family(game), AlarmMessage::Family(message)) => {
                game.receive_alarm(message, schedule_message)
            }
            _ => false,
        };

        if changed {
            self.touch();
            self.sync(tunnel_finder);
        }
    }

    /// Disconnects everyone
    pub fn close<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, tunnel_finder: F) {
        let watchers = self
            .watchers
            .vec(&tunnel_finder)
            .into_iter()
            .map(|(id, _, _)| id)
            .collect_vec();

        for watcher in watchers {
            Watchers::remove_watcher_session(watcher, &tunnel_finder);
        }
        tracing::info!("Game {} closed", self.id);
    }
}
