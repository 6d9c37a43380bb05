//! Celebrity
//!
//! Every player secretly submits a handful of famous names which are pooled
//! into one hat. Teams take turns: the player up draws names from the hat
//! and gives clues while their team guesses against the clock. Correct
//! guesses score for the team, and the game ends when the hat is empty.

use std::collections::HashMap;

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use web_time::{Duration, SystemTime};

use crate::{
    constants::celebrity as limits,
    game::{Error, PlayerEntry},
    leaderboard::Leaderboard,
    names::{self, Names, Petname},
    teams::{Team, TeamManager},
    watcher::{Id, Watchers},
};

fn validate_names_per_player(value: &usize) -> garde::Result {
    if limits::NAMES_PER_PLAYER_CHOICES.contains(value) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "must be one of {:?}",
            limits::NAMES_PER_PLAYER_CHOICES
        )))
    }
}

fn validate_time_per_player(value: &Duration) -> garde::Result {
    if limits::TIME_PER_PLAYER_CHOICES.contains(&value.as_secs()) && value.subsec_nanos() == 0 {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "must be one of {:?} seconds",
            limits::TIME_PER_PLAYER_CHOICES
        )))
    }
}

/// Settings chosen when a Celebrity game is created
#[serde_with::serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Options {
    /// How many names each player puts in the hat
    #[garde(custom(|v, _| validate_names_per_player(v)))]
    names_per_player: usize,
    /// Length of a turn
    #[garde(custom(|v, _| validate_time_per_player(v)))]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    time_per_player: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            names_per_player: limits::DEFAULT_NAMES_PER_PLAYER,
            time_per_player: Duration::from_secs(limits::DEFAULT_TIME_PER_PLAYER),
        }
    }
}

impl Options {
    /// Creates options; call `validate` before use
    pub fn new(names_per_player: usize, time_per_player: Duration) -> Self {
        Self {
            names_per_player,
            time_per_player,
        }
    }

    /// How many names each player puts in the hat
    pub fn names_per_player(&self) -> usize {
        self.names_per_player
    }

    /// Length of a turn
    pub fn time_per_player(&self) -> Duration {
        self.time_per_player
    }
}

/// Phase of a Celebrity game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    /// Players are joining and writing names
    Lobby,
    /// The host is arranging teams
    Teams,
    /// Teams are taking turns
    Ready,
    /// The hat is empty
    Done,
}

/// What a player submitted when joining
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PlayerDetails {
    celebrity_names: Vec<String>,
    sort_key: u64,
    joined: Option<SystemTime>,
}

/// The turn in progress
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Turn {
    number: u64,
    player: Id,
    remaining: Vec<String>,
    correct: Vec<String>,
    passed: usize,
    started_at: SystemTime,
    finished: bool,
}

/// Live numbers of a turn, shown to everyone
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnStats {
    /// Time left on the clock
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub time_left: Duration,
    /// Names guessed so far, in order
    pub correct: Vec<String>,
    /// How many times the clue giver passed
    pub passed: usize,
    /// Names still in the hat
    pub remaining: usize,
}

/// A team as shown in the roster or on the final scoreboard
#[derive(Debug, Clone, Serialize)]
pub struct TeamEntry {
    /// Team name
    pub name: String,
    /// Points so far
    pub score: u64,
    /// Members still in the game, in clue-giving order
    pub players: Vec<PlayerEntry>,
    /// Whether this team is playing right now
    pub playing: bool,
}

/// Messages players send during a Celebrity game
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingPlayerMessage {
    /// Register with a real name and the names to put in the hat
    Join {
        /// Real name
        name: String,
        /// Names for the hat; blanks are dropped
        celebrity_names: Vec<String>,
    },
    /// Return to the join form to edit the submission
    UpdateNames,
    /// Start the clock on your turn
    StartTurn,
    /// The team guessed the current name
    GotIt,
    /// Put the current name back at the end
    Pass,
    /// Hand over to the next team once time ran out
    FinishTurn,
    /// Give up your turn without playing
    SkipTurn,
}

/// Messages only the host may send during a Celebrity game
#[derive(Debug, Deserialize, Clone, Copy)]
pub enum IncomingHostMessage {
    /// Close the lobby and form two teams
    StartGame,
    /// Redraw the teams with the same count
    ShuffleTeams,
    /// Redraw the teams with one more team
    AddTeam,
    /// Redraw the teams with one fewer team
    RemoveTeam,
    /// Accept the teams and start taking turns
    ApproveTeams,
    /// Pass the turn over whoever is up
    SkipPlayer,
    /// Go back to the lobby with the same players
    StartOver,
}

/// Timed transitions of a Celebrity game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// The clock ran out on a turn
    TurnTimeUp {
        /// Number of the turn the alarm was set for
        turn: u64,
    },
}

/// Screens of a Celebrity game
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub enum SyncMessage {
    /// The join form
    Join {
        /// Number of name fields to show
        names_per_player: usize,
        /// Real name, if one was given before
        name: Option<String>,
        /// Names submitted before
        celebrity_names: Vec<String>,
    },
    /// Waiting for the host to start
    WaitingForPlayers {
        /// The viewer's own submission, for players
        celebrity_names: Option<Vec<String>>,
        /// Whether the viewer may start the game
        can_start: bool,
    },
    /// The host is arranging teams
    ChooseTeams {
        /// Whether the viewer may shuffle, add, remove and approve
        can_edit: bool,
        /// Whether another team may be removed
        can_remove_team: bool,
    },
    /// The viewer is up and has not started yet
    YourTurn {
        /// Length of the turn
        #[serde_as(as = "serde_with::DurationSeconds<u64>")]
        time_per_player: Duration,
    },
    /// The viewer is giving clues
    Playing {
        /// The name to describe
        word: String,
        /// Live numbers
        stats: TurnStats,
    },
    /// The viewer's time is up
    TurnFinished {
        /// Final numbers of the turn
        stats: TurnStats,
    },
    /// Someone else is up
    Watching {
        /// Team playing
        team_name: String,
        /// Whether the viewer should be guessing
        my_team: bool,
        /// Clue giver
        player_name: String,
        /// Live numbers once the clock started
        stats: Option<TurnStats>,
        /// Whether the viewer may skip the clue giver
        can_skip: bool,
    },
    /// Nobody on any team is here to play
    NobodyUp {
        /// Whether the viewer may start over
        can_restart: bool,
    },
    /// The hat is empty
    GameOver {
        /// Team with the highest score
        winner: Option<String>,
        /// Every team, highest score first
        scores: Vec<(String, u64)>,
        /// Every name that was in the hat, sorted
        all_names: Vec<String>,
        /// Whether the viewer may start over
        can_restart: bool,
    },
    /// Teams with their members and scores
    Teams(Vec<TeamEntry>),
}

/// Serialization helper for Celebrity struct
#[derive(Deserialize)]
struct CelebritySerde {
    options: Options,
    state: State,
    players: HashMap<Id, PlayerDetails>,
    words: Vec<String>,
    team_manager: TeamManager,
    leaderboard: Leaderboard,
    turn: Option<Turn>,
    turns_started: u64,
}

/// A Celebrity game
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "CelebritySerde")]
pub struct Celebrity {
    options: Options,
    state: State,
    /// Submissions by player
    players: HashMap<Id, PlayerDetails>,
    /// Names still in the hat between turns
    words: Vec<String>,
    team_manager: TeamManager,
    leaderboard: Leaderboard,
    turn: Option<Turn>,
    turns_started: u64,
}

impl From<CelebritySerde> for Celebrity {
    fn from(serde: CelebritySerde) -> Self {
        let CelebritySerde {
            options,
            state,
            players,
            words,
            team_manager,
            leaderboard,
            turn,
            turns_started,
        } = serde;
        let celebrity = Self {
            options,
            state,
            players,
            words,
            team_manager,
            leaderboard,
            turn,
            turns_started,
        };
        if celebrity.state == State::Done {
            celebrity.freeze_standings();
        }
        celebrity
    }
}

impl Celebrity {
    /// Creates a game in the lobby
    pub fn new(options: Options) -> Self {
        Self {
            options,
            state: State::Lobby,
            players: HashMap::new(),
            words: Vec::new(),
            team_manager: TeamManager::new(Petname::default()),
            leaderboard: Leaderboard::default(),
            turn: None,
            turns_started: 0,
        }
    }

    /// Current phase
    pub fn state(&self) -> State {
        self.state
    }

    /// Settings of this game
    pub fn options(&self) -> Options {
        self.options
    }

    /// Whether new participants join as players
    pub fn in_lobby(&self) -> bool {
        self.state == State::Lobby
    }

    /// Names still in the hat
    pub fn words_left(&self) -> usize {
        self.turn
            .as_ref()
            .map_or(self.words.len(), |turn| turn.remaining.len())
    }

    /// Teams in turn order
    pub fn teams(&self) -> &[Team] {
        self.team_manager.teams()
    }

    /// Points of a team
    pub fn score(&self, team_id: Id) -> u64 {
        self.leaderboard.score(team_id)
    }

    /// Whether a player has submitted their names
    pub fn is_registered(&self, player_id: Id) -> bool {
        self.players
            .get(&player_id)
            .is_some_and(|details| details.joined.is_some())
    }

    /// The team playing and the player giving clues
    pub fn current<'a>(&'a self, watchers: &Watchers) -> Option<(&'a Team, Id)> {
        self.team_manager.current(|id| watchers.is_player(id))
    }

    fn registered_players(&self, watchers: &Watchers) -> Vec<(Id, Option<u64>)> {
        self.players
            .iter()
            .filter(|(id, details)| details.joined.is_some() && watchers.is_player(**id))
            .map(|(id, details)| (*id, Some(details.sort_key)))
            .sorted()
            .collect_vec()
    }

    fn require(&self, state: State) -> Result<(), Error> {
        if self.state == state {
            Ok(())
        } else {
            Err(Error::WrongPhase)
        }
    }

    fn freeze_standings(&self) -> &[(Id, u64)] {
        self.leaderboard
            .final_standings(self.team_manager.teams().iter().map(|team| team.id))
    }

    /// Handles a message from a player
    ///
    /// # Errors
    ///
    /// Fails when the message does not fit the phase or the sender is not
    /// the one expected to act, or when submitted text is rejected.
    pub fn receive_player_message<S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        watchers: &mut Watchers,
        names: &mut Names,
        player_id: Id,
        message: IncomingPlayerMessage,
        mut schedule_message: S,
    ) -> Result<(), Error> {
        match message {
            IncomingPlayerMessage::Join {
                name,
                celebrity_names,
            } => {
                self.require(State::Lobby)?;
                let celebrity_names = celebrity_names
                    .iter()
                    .filter(|text| !rustrict::trim_whitespace(text).is_empty())
                    .take(self.options.names_per_player)
                    .map(|text| names::clean_text(text, limits::MAX_CELEBRITY_NAME_LENGTH))
                    .collect::<Result<Vec<_>, _>>()?;
                let name = names.set_name(player_id, &name)?;
                watchers.set_name(player_id, Some(name))?;

                let details = self.players.entry(player_id).or_default();
                details.celebrity_names = celebrity_names;
                details.sort_key = fastrand::u64(..);
                details.joined = Some(SystemTime::now());
            }
            IncomingPlayerMessage::UpdateNames => {
                self.require(State::Lobby)?;
                let details = self.players.get_mut(&player_id).ok_or(Error::WrongPhase)?;
                details.joined = None;
            }
            IncomingPlayerMessage::StartTurn => {
                self.require(State::Ready)?;
                self.require_up(player_id, watchers)?;
                if self.turn.is_some() {
                    return Err(Error::WrongPhase);
                }
                let mut remaining = self.words.clone();
                fastrand::shuffle(&mut remaining);
                self.turns_started += 1;
                self.turn = Some(Turn {
                    number: self.turns_started,
                    player: player_id,
                    remaining,
                    correct: Vec::new(),
                    passed: 0,
                    started_at: SystemTime::now(),
                    finished: false,
                });
                schedule_message(
                    AlarmMessage::TurnTimeUp {
                        turn: self.turns_started,
                    }
                    .into(),
                    self.options.time_per_player,
                );
                tracing::debug!("Player {player_id} started turn {}", self.turns_started);
            }
            IncomingPlayerMessage::GotIt => {
                let turn = self.live_turn_mut(player_id)?;
                if turn.remaining.is_empty() {
                    return Err(Error::WrongPhase);
                }
                let word = turn.remaining.remove(0);
                turn.correct.push(word);
                if turn.remaining.is_empty() {
                    self.finish_turn(watchers);
                }
            }
            IncomingPlayerMessage::Pass => {
                let turn = self.live_turn_mut(player_id)?;
                if turn.remaining.is_empty() {
                    return Err(Error::WrongPhase);
                }
                turn.remaining.rotate_left(1);
                turn.passed += 1;
            }
            IncomingPlayerMessage::FinishTurn => {
                match &self.turn {
                    Some(turn) if turn.player == player_id && turn.finished => {}
                    Some(turn) if turn.player == player_id => return Err(Error::WrongPhase),
                    _ => return Err(Error::NotYourTurn),
                }
                self.finish_turn(watchers);
            }
            IncomingPlayerMessage::SkipTurn => {
                self.require(State::Ready)?;
                self.require_up(player_id, watchers)?;
                if self.turn.is_some() {
                    return Err(Error::WrongPhase);
                }
                self.team_manager
                    .advance(player_id, |id| watchers.is_player(id));
                tracing::debug!("Player {player_id} skipped their turn");
            }
        }
        Ok(())
    }

    fn require_up(&self, player_id: Id, watchers: &Watchers) -> Result<(), Error> {
        match self.current(watchers) {
            Some((_, up)) if up == player_id => Ok(()),
            _ => Err(Error::NotYourTurn),
        }
    }

    fn live_turn_mut(&mut self, player_id: Id) -> Result<&mut Turn, Error> {
        match &self.turn {
            Some(turn) if turn.player != player_id => return Err(Error::NotYourTurn),
            Some(turn) if turn.finished => return Err(Error::WrongPhase),
            _ => {}
        }
        self.turn.as_mut().ok_or(Error::NotYourTurn)
    }

    /// Scores the turn in progress and hands over to the next team
    fn finish_turn(&mut self, watchers: &Watchers) {
        let Some(turn) = self.turn.take() else {
            return;
        };
        if let Some(team) = self.team_manager.team_for_player(turn.player) {
            let team_id = team.id;
            self.leaderboard
                .add_turn(team_id, turn.correct.len() as u64);
        }
        self.words = turn.remaining;
        self.team_manager
            .advance(turn.player, |id| watchers.is_player(id));

        tracing::debug!(
            "Turn {} ended with {} correct, {} names left",
            turn.number,
            turn.correct.len(),
            self.words.len()
        );

        if self.words.is_empty() {
            self.state = State::Done;
            self.freeze_standings();
            tracing::info!("Celebrity game over after {} turns", self.leaderboard.turns());
        }
    }

    /// Handles a message from the host
    ///
    /// # Errors
    ///
    /// Fails when the message does not fit the phase.
    pub fn receive_host_message(
        &mut self,
        watchers: &Watchers,
        message: IncomingHostMessage,
    ) -> Result<(), Error> {
        match message {
            IncomingHostMessage::StartGame => {
                self.require(State::Lobby)?;
                let registered = self.registered_players(watchers);
                if registered.is_empty() {
                    return Err(Error::NotEnoughPlayers);
                }
                self.words = registered
                    .iter()
                    .filter_map(|(id, _)| self.players.get(id))
                    .flat_map(|details| details.celebrity_names.iter().cloned())
                    .collect_vec();
                self.team_manager
                    .make_teams(&registered, limits::INITIAL_TEAM_COUNT);
                self.state = State::Teams;
                tracing::info!(
                    "Celebrity lobby closed with {} players and {} names",
                    registered.len(),
                    self.words.len()
                );
            }
            IncomingHostMessage::ShuffleTeams => {
                self.require(State::Teams)?;
                self.redraw_teams(watchers, self.team_manager.count());
            }
            IncomingHostMessage::AddTeam => {
                self.require(State::Teams)?;
                self.redraw_teams(watchers, self.team_manager.count() + 1);
            }
            IncomingHostMessage::RemoveTeam => {
                self.require(State::Teams)?;
                if self.team_manager.count() <= limits::MIN_TEAM_COUNT {
                    return Err(Error::TooFewTeams);
                }
                self.redraw_teams(watchers, self.team_manager.count() - 1);
            }
            IncomingHostMessage::ApproveTeams => {
                self.require(State::Teams)?;
                if self.words.is_empty() {
                    self.state = State::Done;
                    self.freeze_standings();
                } else {
                    self.state = State::Ready;
                }
            }
            IncomingHostMessage::SkipPlayer => {
                self.require(State::Ready)?;
                let (_, up) = self.current(watchers).ok_or(Error::NotEnoughPlayers)?;
                if self.turn.take().is_some() {
                    tracing::debug!("Discarded the turn of skipped player {up}");
                }
                self.team_manager.advance(up, |id| watchers.is_player(id));
            }
            IncomingHostMessage::StartOver => {
                if !matches!(self.state, State::Done | State::Ready) {
                    return Err(Error::WrongPhase);
                }
                self.restart();
            }
        }
        Ok(())
    }

    fn redraw_teams(&mut self, watchers: &Watchers, count: usize) {
        let registered = self.registered_players(watchers);
        self.team_manager.make_teams(&registered, count);
    }

    /// Back to the lobby; players keep their real names
    pub fn restart(&mut self) {
        self.state = State::Lobby;
        self.players.clear();
        self.words.clear();
        self.team_manager.clear();
        self.leaderboard.clear();
        self.turn = None;
        tracing::info!("Celebrity game restarted");
    }

    /// Handles a timed transition
    ///
    /// # Returns
    ///
    /// Whether anything changed; alarms for turns already over are ignored.
    pub fn receive_alarm(&mut self, message: &AlarmMessage) -> bool {
        let AlarmMessage::TurnTimeUp { turn: number } = message;
        match &mut self.turn {
            Some(turn) if turn.number == *number && !turn.finished => {
                turn.finished = true;
                tracing::debug!("Time is up on turn {number}");
                true
            }
            _ => false,
        }
    }

    /// Forgets a player who left
    ///
    /// Submissions are dropped in the lobby; afterwards their names stay in
    /// the hat. A turn they were playing is abandoned unscored.
    pub fn remove_player(&mut self, player_id: Id) {
        if self.state == State::Lobby {
            self.players.remove(&player_id);
        }
        if self
            .turn
            .as_ref()
            .is_some_and(|turn| turn.player == player_id)
        {
            self.turn = None;
            tracing::info!("Player {player_id} left mid-turn, turn abandoned");
        }
    }

    fn stats(&self, turn: &Turn) -> TurnStats {
        let elapsed = turn.started_at.elapsed().unwrap_or_default();
        TurnStats {
            time_left: if turn.finished {
                Duration::ZERO
            } else {
                Duration::from_secs(
                    self.options
                        .time_per_player
                        .saturating_sub(elapsed)
                        .as_secs(),
                )
            },
            correct: turn.correct.clone(),
            passed: turn.passed,
            remaining: turn.remaining.len(),
        }
    }

    /// The screen a participant sees
    pub fn state_message(&self, watcher_id: Id, watchers: &Watchers) -> SyncMessage {
        let is_host = watchers.is_host(watcher_id);
        match self.state {
            State::Lobby => {
                let details = self.players.get(&watcher_id);
                match (watchers.is_player(watcher_id), details) {
                    (true, Some(details)) if details.joined.is_some() => {
                        SyncMessage::WaitingForPlayers {
                            celebrity_names: Some(details.celebrity_names.clone()),
                            can_start: is_host,
                        }
                    }
                    (true, details) => SyncMessage::Join {
                        names_per_player: self.options.names_per_player,
                        name: watchers.get_name(watcher_id),
                        celebrity_names: details
                            .map(|details| details.celebrity_names.clone())
                            .unwrap_or_default(),
                    },
                    (false, _) => SyncMessage::WaitingForPlayers {
                        celebrity_names: None,
                        can_start: false,
                    },
                }
            }
            State::Teams => SyncMessage::ChooseTeams {
                can_edit: is_host,
                can_remove_team: is_host && self.team_manager.count() > limits::MIN_TEAM_COUNT,
            },
            State::Ready => {
                let Some((team, up)) = self.current(watchers) else {
                    return SyncMessage::NobodyUp {
                        can_restart: is_host,
                    };
                };
                let turn = self.turn.as_ref().filter(|turn| turn.player == up);
                if up == watcher_id {
                    match turn {
                        None => SyncMessage::YourTurn {
                            time_per_player: self.options.time_per_player,
                        },
                        Some(turn) if turn.finished => SyncMessage::TurnFinished {
                            stats: self.stats(turn),
                        },
                        Some(turn) => SyncMessage::Playing {
                            word: turn.remaining.first().cloned().unwrap_or_default(),
                            stats: self.stats(turn),
                        },
                    }
                } else {
                    SyncMessage::Watching {
                        team_name: team.name.clone(),
                        my_team: team.players.contains(&watcher_id),
                        player_name: watchers
                            .get_player(up)
                            .map(|player| player.display_name().to_owned())
                            .unwrap_or_default(),
                        stats: turn.map(|turn| self.stats(turn)),
                        can_skip: is_host,
                    }
                }
            }
            State::Done => {
                let scores = self
                    .freeze_standings()
                    .iter()
                    .filter_map(|(id, score)| {
                        Some((self.team_manager.get(*id)?.name.clone(), *score))
                    })
                    .collect_vec();
                SyncMessage::GameOver {
                    winner: scores.first().map(|(name, _)| name.clone()),
                    scores,
                    all_names: self
                        .players
                        .values()
                        .flat_map(|details| details.celebrity_names.iter().cloned())
                        .sorted()
                        .collect_vec(),
                    can_restart: is_host,
                }
            }
        }
    }

    /// The teams roster, once teams exist
    pub fn roster_message(&self, watchers: &Watchers) -> Option<SyncMessage> {
        if self.team_manager.count() == 0 {
            return None;
        }
        let playing = self.current(watchers).map(|(team, _)| team.id);
        Some(SyncMessage::Teams(
            self.team_manager
                .teams()
                .iter()
                .map(|team| TeamEntry {
                    name: team.name.clone(),
                    score: self.leaderboard.score(team.id),
                    players: team
                        .players
                        .iter()
                        .filter(|id| watchers.is_player(**id))
                        .map(|id| PlayerEntry::new(*id, watchers, self.is_registered(*id)))
                        .collect_vec(),
                    playing: playing == Some(team.id),
                })
                .collect_vec(),
        ))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::watcher::{PlayerValue, Value};

    struct Table {
        game: Celebrity,
        watchers: Watchers,
        names: Names,
        host: Id,
        alarms: Vec<(crate::AlarmMessage, Duration)>,
    }

    impl Table {
        fn new(options: Options) -> Self {
            let host = Id::new();
            Self {
                game: Celebrity::new(options),
                watchers: Watchers::with_host_id(host),
                names: Names::default(),
                host,
                alarms: Vec::new(),
            }
        }

        fn send(&mut self, player: Id, message: IncomingPlayerMessage) -> Result<(), Error> {
            let alarms = &mut self.alarms;
            self.game.receive_player_message(
                &mut self.watchers,
                &mut self.names,
                player,
                message,
                |alarm, duration| alarms.push((alarm, duration)),
            )
        }

        fn host_sends(&mut self, message: IncomingHostMessage) -> Result<(), Error> {
            self.game.receive_host_message(&self.watchers, message)
        }

        fn join(&mut self, player: Id, name: &str, words: &[&str]) {
            if !self.watchers.has_watcher(player) {
                self.watchers
                    .add_watcher(player, Value::Player(PlayerValue::default()))
                    .unwrap();
            }
            self.send(
                player,
                IncomingPlayerMessage::Join {
                    name: name.to_owned(),
                    celebrity_names: words.iter().map(|w| (*w).to_owned()).collect(),
                },
            )
            .unwrap();
        }

        /// Host plus one more player, each with two names, teams approved
        fn ready(&mut self) -> Id {
            let host = self.host;
            let other = Id::new();
            self.join(host, "Hana", &["Cher", "Prince"]);
            self.join(other, "Omar", &["Adele", "Bono"]);
            self.host_sends(IncomingHostMessage::StartGame).unwrap();
            self.host_sends(IncomingHostMessage::ApproveTeams).unwrap();
            other
        }

        fn up(&self) -> Id {
            self.game.current(&self.watchers).unwrap().1
        }
    }

    #[test]
    fn test_options_validation() {
        assert!(Options::default().validate().is_ok());
        assert!(Options::new(10, Duration::from_secs(90)).validate().is_ok());
        assert!(Options::new(7, Duration::from_secs(60)).validate().is_err());
        assert!(Options::new(5, Duration::from_secs(61)).validate().is_err());
    }

    #[test]
    fn test_options_serde_in_seconds() {
        let options = Options::new(20, Duration::from_secs(120));
        let json = serde_json::to_value(options).unwrap();
        assert_eq!(json["time_per_player"], 120);
        let back: Options = serde_json::from_value(json).unwrap();
        assert_eq!(back, options);
    }

    #[test]
    fn test_join_cleans_names() {
        let mut table = Table::new(Options::default());
        let host = table.host;
        table.join(
            host,
            "  Hana ",
            &[" Cher ", "", "   ", "Prince", "Madonna", "Bjork", "Sting", "Drake"],
        );

        assert_eq!(table.watchers.get_name(host), Some("Hana".to_owned()));
        assert!(table.game.is_registered(host));
        match table.game.state_message(host, &table.watchers) {
            SyncMessage::WaitingForPlayers {
                celebrity_names: Some(names),
                can_start: true,
            } => assert_eq!(names, vec!["Cher", "Prince", "Madonna", "Bjork", "Sting"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_join_rejects_long_names_and_taken_names() {
        let mut table = Table::new(Options::default());
        let host = table.host;
        let long = "x".repeat(limits::MAX_CELEBRITY_NAME_LENGTH + 1);
        assert_eq!(
            table.send(
                host,
                IncomingPlayerMessage::Join {
                    name: "Hana".to_owned(),
                    celebrity_names: vec![long],
                }
            ),
            Err(Error::Name(names::Error::TooLong))
        );
        assert_eq!(table.watchers.get_name(host), None);

        table.join(host, "Hana", &["Cher"]);
        let other = Id::new();
        table
            .watchers
            .add_watcher(other, Value::Player(PlayerValue::default()))
            .unwrap();
        assert_eq!(
            table.send(
                other,
                IncomingPlayerMessage::Join {
                    name: "hana".to_owned(),
                    celebrity_names: vec![],
                }
            ),
            Ok(())
        );
        assert_eq!(
            table.send(
                other,
                IncomingPlayerMessage::Join {
                    name: "Hana".to_owned(),
                    celebrity_names: vec![],
                }
            ),
            Err(Error::Name(names::Error::Used))
        );
    }

    #[test]
    fn test_update_names_returns_to_form() {
        let mut table = Table::new(Options::default());
        let host = table.host;
        table.join(host, "Hana", &["Cher"]);
        table
            .send(host, IncomingPlayerMessage::UpdateNames)
            .unwrap();

        match table.game.state_message(host, &table.watchers) {
            SyncMessage::Join {
                names_per_player,
                name,
                celebrity_names,
            } => {
                assert_eq!(names_per_player, 5);
                assert_eq!(name, Some("Hana".to_owned()));
                assert_eq!(celebrity_names, vec!["Cher"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_start_game_forms_teams_and_pools_words() {
        let mut table = Table::new(Options::default());
        let host = table.host;
        assert_eq!(
            table.host_sends(IncomingHostMessage::StartGame),
            Err(Error::NotEnoughPlayers)
        );

        table.join(host, "Hana", &["Cher", "Prince"]);
        let unregistered = Id::new();
        table
            .watchers
            .add_watcher(unregistered, Value::Player(PlayerValue::default()))
            .unwrap();
        for (i, name) in ["Ada", "Bo", "Cy"].iter().enumerate() {
            let word = format!("Star {i}");
            table.join(Id::new(), name, &[word.as_str()]);
        }

        table.host_sends(IncomingHostMessage::StartGame).unwrap();
        assert_eq!(table.game.state(), State::Teams);
        assert_eq!(table.game.teams().len(), 2);
        assert_eq!(table.game.words_left(), 5);
        let placed: usize = table.game.teams().iter().map(|t| t.players.len()).sum();
        assert_eq!(placed, 4);
        assert!(table.game.team_manager.team_for_player(unregistered).is_none());
    }

    #[test]
    fn test_team_count_changes() {
        let mut table = Table::new(Options::default());
        table.ready_lobby_only();

        assert_eq!(
            table.host_sends(IncomingHostMessage::RemoveTeam),
            Err(Error::TooFewTeams)
        );
        table.host_sends(IncomingHostMessage::AddTeam).unwrap();
        assert_eq!(table.game.teams().len(), 3);
        match table.game.state_message(table.host, &table.watchers) {
            SyncMessage::ChooseTeams {
                can_edit: true,
                can_remove_team: true,
            } => {}
            other => panic!("unexpected {other:?}"),
        }
        table.host_sends(IncomingHostMessage::RemoveTeam).unwrap();
        table.host_sends(IncomingHostMessage::ShuffleTeams).unwrap();
        assert_eq!(table.game.teams().len(), 2);
    }

    impl Table {
        fn ready_lobby_only(&mut self) {
            let host = self.host;
            self.join(host, "Hana", &["Cher"]);
            self.join(Id::new(), "Omar", &["Adele"]);
            self.host_sends(IncomingHostMessage::StartGame).unwrap();
        }
    }

    #[test]
    fn test_only_current_player_plays() {
        let mut table = Table::new(Options::default());
        table.ready();
        let up = table.up();
        let other = if up == table.host {
            table.watchers.player_ids().into_iter().find(|id| *id != up).unwrap()
        } else {
            table.host
        };

        assert_eq!(
            table.send(other, IncomingPlayerMessage::StartTurn),
            Err(Error::NotYourTurn)
        );
        assert_eq!(
            table.send(up, IncomingPlayerMessage::GotIt),
            Err(Error::NotYourTurn)
        );
    }

    #[test]
    fn test_full_turn() {
        let mut table = Table::new(Options::new(5, Duration::from_secs(30)));
        table.ready();
        let up = table.up();
        let team_id = table.game.current(&table.watchers).unwrap().0.id;

        match table.game.state_message(up, &table.watchers) {
            SyncMessage::YourTurn { time_per_player } => {
                assert_eq!(time_per_player, Duration::from_secs(30));
            }
            other => panic!("unexpected {other:?}"),
        }

        table.send(up, IncomingPlayerMessage::StartTurn).unwrap();
        assert_eq!(
            table.alarms,
            vec![(
                AlarmMessage::TurnTimeUp { turn: 1 }.into(),
                Duration::from_secs(30)
            )]
        );

        let SyncMessage::Playing { word: first, .. } = table.game.state_message(up, &table.watchers)
        else {
            panic!("expected Playing");
        };
        table.send(up, IncomingPlayerMessage::GotIt).unwrap();
        let SyncMessage::Playing { word: passed, .. } =
            table.game.state_message(up, &table.watchers)
        else {
            panic!("expected Playing");
        };
        table.send(up, IncomingPlayerMessage::Pass).unwrap();

        let remaining = &table.game.turn.as_ref().unwrap().remaining;
        assert_eq!(remaining.last(), Some(&passed));
        match table.game.state_message(up, &table.watchers) {
            SyncMessage::Playing { word, stats } => {
                assert_ne!(word, passed);
                assert_eq!(stats.correct, vec![first]);
                assert_eq!(stats.passed, 1);
                assert_eq!(stats.remaining, 3);
                assert!(stats.time_left <= Duration::from_secs(30));
            }
            other => panic!("unexpected {other:?}"),
        }

        let watcher = table
            .watchers
            .player_ids()
            .into_iter()
            .find(|id| *id != up)
            .unwrap();
        match table.game.state_message(watcher, &table.watchers) {
            SyncMessage::Watching {
                stats: Some(stats),
                my_team: false,
                ..
            } => assert_eq!(stats.correct.len(), 1),
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(
            table.send(up, IncomingPlayerMessage::FinishTurn),
            Err(Error::WrongPhase)
        );
        assert!(!table.game.receive_alarm(&AlarmMessage::TurnTimeUp { turn: 9 }));
        assert!(table.game.receive_alarm(&AlarmMessage::TurnTimeUp { turn: 1 }));
        assert!(!table.game.receive_alarm(&AlarmMessage::TurnTimeUp { turn: 1 }));

        match table.game.state_message(up, &table.watchers) {
            SyncMessage::TurnFinished { stats } => {
                assert_eq!(stats.time_left, Duration::ZERO);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            table.send(up, IncomingPlayerMessage::GotIt),
            Err(Error::WrongPhase)
        );

        table.send(up, IncomingPlayerMessage::FinishTurn).unwrap();
        assert_eq!(table.game.score(team_id), 1);
        assert_eq!(table.game.words_left(), 3);
        assert_ne!(table.up(), up);
    }

    #[test]
    fn test_last_word_ends_game() {
        let mut table = Table::new(Options::default());
        table.ready();

        while table.game.state() == State::Ready {
            let up = table.up();
            table.send(up, IncomingPlayerMessage::StartTurn).unwrap();
            table.send(up, IncomingPlayerMessage::GotIt).unwrap();
            if table.game.state() == State::Ready {
                let number = table.game.turns_started;
                table
                    .game
                    .receive_alarm(&AlarmMessage::TurnTimeUp { turn: number });
                table.send(up, IncomingPlayerMessage::FinishTurn).unwrap();
            }
        }

        assert_eq!(table.game.state(), State::Done);
        match table.game.state_message(table.host, &table.watchers) {
            SyncMessage::GameOver {
                winner,
                scores,
                all_names,
                can_restart,
            } => {
                assert!(can_restart);
                assert_eq!(scores.iter().map(|(_, s)| s).sum::<u64>(), 4);
                assert_eq!(winner, Some(scores[0].0.clone()));
                assert!(scores[0].1 >= scores[1].1);
                assert_eq!(all_names, vec!["Adele", "Bono", "Cher", "Prince"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_skips() {
        let mut table = Table::new(Options::default());
        table.ready();
        let first = table.up();

        table.send(first, IncomingPlayerMessage::SkipTurn).unwrap();
        let second = table.up();
        assert_ne!(first, second);

        table.send(second, IncomingPlayerMessage::StartTurn).unwrap();
        table.host_sends(IncomingHostMessage::SkipPlayer).unwrap();
        assert_eq!(table.up(), first);
        assert_eq!(table.game.words_left(), 4);
        assert_eq!(table.game.leaderboard.turns(), 0);
    }

    #[test]
    fn test_current_player_leaving_abandons_turn() {
        let mut table = Table::new(Options::default());
        table.ready();
        let up = table.up();
        table.send(up, IncomingPlayerMessage::StartTurn).unwrap();
        table.send(up, IncomingPlayerMessage::GotIt).unwrap();

        table.watchers.update_watcher_value(up, Value::Spectator);
        table.game.remove_player(up);

        assert_eq!(table.game.words_left(), 4);
        let next = table.up();
        assert_ne!(next, up);
        assert!(matches!(
            table.game.state_message(next, &table.watchers),
            SyncMessage::YourTurn { .. }
        ));
    }

    #[test]
    fn test_nobody_up() {
        let mut table = Table::new(Options::default());
        table.ready();
        for id in table.watchers.player_ids() {
            table.watchers.update_watcher_value(id, Value::Spectator);
        }
        assert!(matches!(
            table.game.state_message(table.host, &table.watchers),
            SyncMessage::NobodyUp { can_restart: false }
        ));
    }

    #[test]
    fn test_start_over_keeps_real_names() {
        let mut table = Table::new(Options::default());
        let other = table.ready();
        table.host_sends(IncomingHostMessage::StartOver).unwrap();

        assert_eq!(table.game.state(), State::Lobby);
        assert!(table.game.teams().is_empty());
        assert_eq!(table.game.words_left(), 0);
        assert!(!table.game.is_registered(other));
        match table.game.state_message(other, &table.watchers) {
            SyncMessage::Join {
                name,
                celebrity_names,
                ..
            } => {
                assert_eq!(name, Some("Omar".to_owned()));
                assert!(celebrity_names.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_roster_lists_present_members() {
        let mut table = Table::new(Options::default());
        let other = table.ready();
        assert!(Celebrity::new(Options::default())
            .roster_message(&table.watchers)
            .is_none());

        table.watchers.update_watcher_value(other, Value::Spectator);
        let Some(SyncMessage::Teams(teams)) = table.game.roster_message(&table.watchers) else {
            panic!("expected teams");
        };
        assert_eq!(teams.len(), 2);
        let listed: usize = teams.iter().map(|t| t.players.len()).sum();
        assert_eq!(listed, 1);
        assert_eq!(teams.iter().filter(|t| t.playing).count(), 1);
    }

    #[test]
    fn test_serde_roundtrip_mid_game() {
        let mut table = Table::new(Options::default());
        table.ready();
        let up = table.up();
        table.send(up, IncomingPlayerMessage::StartTurn).unwrap();

        let json = serde_json::to_string(&table.game).unwrap();
        let back: Celebrity = serde_json::from_str(&json).unwrap();
        assert_eq!(back.state(), State::Ready);
        assert_eq!(back.words_left(), 4);
        assert_eq!(back.current(&table.watchers).unwrap().1, up);
    }
}
