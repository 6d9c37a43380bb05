//! Family
//!
//! Every player picks a secret name. After the names are read out once, the
//! player whose turn it is asks someone "are you ...?". A right guess
//! brings the target and their whole family into the guesser's family and
//! the guesser asks again; a wrong guess passes the turn to the target.
//! The last player without a family wins.

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use web_time::Duration;

use crate::{
    TruncatedVec,
    chat::{self, ChatMessage, Chats},
    constants::family as limits,
    game::{Error, PlayerEntry},
    names::{self, Names},
    session::Tunnel,
    watcher::{Id, Watchers},
};

/// Phase of a Family game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    /// Players are joining and choosing secret names
    Lobby,
    /// The secret names are being read out
    Slideshow,
    /// Players are guessing
    Playing,
}

/// Family data of one player
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PlayerDetails {
    secret_name: Option<String>,
    /// Head of the family that captured this player
    family: Option<Id>,
    /// Every family head this player has belonged to; their chats
    all_families: Vec<Id>,
}

/// One frame of the secret name slideshow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum Frame {
    Countdown(u64),
    SecretName(String),
}

impl Frame {
    fn duration(&self) -> Duration {
        match self {
            Self::Countdown(_) => Duration::from_secs(limits::COUNTDOWN_FRAME_SECONDS),
            Self::SecretName(_) => Duration::from_secs(limits::SECRET_NAME_FRAME_SECONDS),
        }
    }

    fn text(&self) -> String {
        match self {
            Self::Countdown(n) => format!("Starting names in {n}..."),
            Self::SecretName(name) => name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Slideshow {
    run: u64,
    frames: Vec<Frame>,
    position: usize,
}

/// The outcome of the previous question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LastGuess {
    player: Id,
    target: Id,
    guess: String,
    result: bool,
}

/// How the target answers "are you ...?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Answer {
    /// The guess is exactly the target's secret name
    Busted,
    /// The guess is wrong
    NotMe,
    /// The guess is not exact but counts
    CloseEnough,
}

impl Answer {
    fn is_yes(self) -> bool {
        matches!(self, Self::Busted | Self::CloseEnough)
    }
}

/// Messages players send during a Family game
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingPlayerMessage {
    /// Register with a real name and a secret name
    Join {
        /// Real name
        name: String,
        /// Name to hide behind
        secret_name: String,
    },
    /// Return to the join form to pick another secret name
    UpdateSecretName,
    /// Pick whom to ask
    ChooseTarget(Id),
    /// Ask the target whether they are this name
    Guess(String),
    /// Reply to the question asked of you
    Answer(Answer),
    /// Write to your family's chat
    Chat(String),
}

/// Messages only the host may send during a Family game
#[derive(Debug, Deserialize, Clone, Copy)]
pub enum IncomingHostMessage {
    /// Close the lobby
    StartGame,
    /// Read the secret names out
    ShowSecretNames,
    /// Leave the slideshow and start guessing
    Next,
    /// Pick who asks first, or who asks after the asker left
    ChooseFirstPlayer(Id),
    /// Back to the lobby once someone has won
    PlayAgain,
}

/// Timed transitions of a Family game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// Show the next slideshow frame
    Slideshow {
        /// The slideshow run the alarm belongs to
        run: u64,
        /// Frame to show; past the end closes the slideshow
        position: usize,
    },
}

/// Events pushed to Family players
#[derive(Debug, Clone, Serialize)]
pub enum UpdateMessage {
    /// A new message in one of the recipient's chats
    Chat(ChatMessage),
}

/// The previous question as shown to everyone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuessView {
    /// Who asked
    pub player: String,
    /// Who was asked
    pub target: String,
    /// The name guessed
    pub guess: String,
    /// Whether the answer was yes
    pub result: bool,
}

/// A player without a family, and the family they gathered
#[derive(Debug, Clone, Serialize)]
pub struct FamilyEntry {
    /// The family head
    pub player: PlayerEntry,
    /// Captured members as "name (secret name)"
    pub family: Vec<String>,
}

/// Screens of a Family game
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub enum SyncMessage {
    /// The join form
    Join {
        /// Real name, if one was given before
        name: Option<String>,
    },
    /// Waiting for the host to start
    WaitingForPlayers {
        /// Whether the viewer may start the game
        can_start: bool,
    },
    /// Nothing to do until the host acts
    WaitingForHost,
    /// Host controls between slideshow runs
    SlideshowControls,
    /// A slideshow frame
    Slideshow {
        /// Text on screen
        text: String,
        /// Whether this is a countdown frame
        countdown: bool,
    },
    /// The host picks who asks
    ChooseFirstPlayer {
        /// Players without a family
        players: Vec<PlayerEntry>,
    },
    /// The viewer picks whom to ask
    ChooseTarget {
        /// Result of the previous question
        last_guess: Option<GuessView>,
        /// Players the viewer may ask
        targets: Vec<PlayerEntry>,
    },
    /// Someone is picking whom to ask
    WaitingForTarget {
        /// Result of the previous question
        last_guess: Option<GuessView>,
        /// Who is picking
        player_name: String,
    },
    /// The viewer types their guess
    MakeGuess {
        /// Whom the viewer is asking
        target_name: String,
    },
    /// Someone is typing a guess
    Asking {
        /// Who asks
        player_name: String,
        /// Who is asked
        target_name: String,
    },
    /// The viewer is asked
    Answer {
        /// Who asks
        player_name: String,
        /// The name guessed
        guess: String,
        /// Whether "busted" is offered; otherwise "not me" and "close enough" are
        can_bust: bool,
    },
    /// Someone is being asked
    Question {
        /// Who asks
        player_name: String,
        /// Who is asked
        target_name: String,
        /// The name guessed
        guess: String,
    },
    /// One player is left without a family
    Winner {
        /// Real name of the winner
        name: String,
        /// Secret name of the winner
        secret_name: String,
        /// Whether the viewer may start another round
        can_play_again: bool,
    },
    /// Family heads and their families
    Players(Vec<FamilyEntry>),
    /// The viewer's chats
    Chat {
        /// Name of the chat the viewer writes to
        name: String,
        /// Messages from every chat the viewer belongs to, newest first
        messages: TruncatedVec<ChatMessage>,
    },
}

/// A Family game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Family {
    state: State,
    players: HashMap<Id, PlayerDetails>,
    secret_names: Names,
    slideshow: Option<Slideshow>,
    slideshow_runs: u64,
    current_player: Option<Id>,
    current_guess_target: Option<Id>,
    current_guess: Option<String>,
    last_guess: Option<LastGuess>,
    chats: Chats,
}

impl Default for Family {
    fn default() -> Self {
        Self {
            state: State::Lobby,
            players: HashMap::new(),
            secret_names: Names::with_max_length(limits::MAX_SECRET_NAME_LENGTH),
            slideshow: None,
            slideshow_runs: 0,
            current_player: None,
            current_guess_target: None,
            current_guess: None,
            last_guess: None,
            chats: Chats::default(),
        }
    }
}

impl Family {
    /// Current phase
    pub fn state(&self) -> State {
        self.state
    }

    /// Whether new participants join as players
    pub fn in_lobby(&self) -> bool {
        self.state == State::Lobby
    }

    /// Secret name of a player
    pub fn secret_name(&self, player_id: Id) -> Option<String> {
        self.players.get(&player_id)?.secret_name.clone()
    }

    /// Head of the family a player was captured into
    pub fn family(&self, player_id: Id) -> Option<Id> {
        self.players.get(&player_id)?.family
    }

    /// Chats a player belongs to
    pub fn all_families(&self, player_id: Id) -> &[Id] {
        self.players
            .get(&player_id)
            .map_or(&[], |details| details.all_families.as_slice())
    }

    /// Whose turn it is to ask
    pub fn current_player(&self) -> Option<Id> {
        self.current_player
    }

    /// Whether a present, registered player is still without a family
    pub fn is_active(&self, player_id: Id, watchers: &Watchers) -> bool {
        watchers.is_player(player_id)
            && self.players.get(&player_id).is_some_and(|details| {
                details.secret_name.is_some() && details.family.is_none()
            })
    }

    /// Present, registered players without a family, in display order
    pub fn active_players(&self, watchers: &Watchers) -> Vec<Id> {
        watchers
            .sorted_players(false)
            .into_iter()
            .map(|(id, _)| id)
            .filter(|id| self.is_active(*id, watchers))
            .collect_vec()
    }

    /// The last player standing, once the lobby is closed
    pub fn winner(&self, watchers: &Watchers) -> Option<Id> {
        if self.state == State::Lobby {
            return None;
        }
        match self.active_players(watchers).as_slice() {
            [winner] => Some(*winner),
            _ => None,
        }
    }

    fn require(&self, state: State) -> Result<(), Error> {
        if self.state == state {
            Ok(())
        } else {
            Err(Error::WrongPhase)
        }
    }

    /// The asker, if they are still here
    fn present_current_player(&self, watchers: &Watchers) -> Option<Id> {
        self.current_player.filter(|id| watchers.is_player(*id))
    }

    /// Handles a message from a player
    ///
    /// Chat messages are pushed to the members of the chat right away.
    ///
    /// # Errors
    ///
    /// Fails when the message does not fit the phase or the sender is not
    /// the one expected to act, or when submitted text is rejected.
    pub fn receive_player_message<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watchers: &mut Watchers,
        names: &mut Names,
        player_id: Id,
        message: IncomingPlayerMessage,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        match message {
            IncomingPlayerMessage::Join { name, secret_name } => {
                self.require(State::Lobby)?;
                self.secret_names.check_name(player_id, &secret_name)?;
                let name = names.set_name(player_id, &name)?;
                watchers.set_name(player_id, Some(name))?;
                let secret_name = self.secret_names.set_name(player_id, &secret_name)?;
                self.players.entry(player_id).or_default().secret_name = Some(secret_name);
            }
            IncomingPlayerMessage::UpdateSecretName => {
                self.require(State::Lobby)?;
                self.secret_names.remove(&player_id);
                if let Some(details) = self.players.get_mut(&player_id) {
                    details.secret_name = None;
                }
            }
            IncomingPlayerMessage::ChooseTarget(target) => {
                self.require(State::Playing)?;
                if self.present_current_player(watchers) != Some(player_id) {
                    return Err(Error::NotYourTurn);
                }
                if self.current_guess_target.is_some() {
                    return Err(Error::WrongPhase);
                }
                if target == player_id || !self.is_active(target, watchers) {
                    return Err(Error::UnknownPlayer);
                }
                self.current_guess_target = Some(target);
            }
            IncomingPlayerMessage::Guess(guess) => {
                self.require(State::Playing)?;
                if self.present_current_player(watchers) != Some(player_id) {
                    return Err(Error::NotYourTurn);
                }
                if self.current_guess_target.is_none() || self.current_guess.is_some() {
                    return Err(Error::WrongPhase);
                }
                self.current_guess = Some(names::clean_text(
                    &guess,
                    limits::MAX_SECRET_NAME_LENGTH,
                )?);
            }
            IncomingPlayerMessage::Answer(answer) => {
                self.require(State::Playing)?;
                self.answer(player_id, answer)?;
            }
            IncomingPlayerMessage::Chat(text) => {
                let message = self.chat(watchers, player_id, &text)?;
                let chat = message.chat;
                watchers.announce_with(
                    |id, _| {
                        self.all_families(id)
                            .contains(&chat)
                            .then(|| UpdateMessage::Chat(message.clone()).into())
                    },
                    tunnel_finder,
                );
            }
        }
        Ok(())
    }

    fn answer(&mut self, player_id: Id, answer: Answer) -> Result<(), Error> {
        let (Some(guesser), Some(target), Some(guess)) = (
            self.current_player,
            self.current_guess_target,
            self.current_guess.clone(),
        ) else {
            return Err(Error::WrongPhase);
        };
        if target != player_id {
            return Err(Error::NotYourTurn);
        }

        let exact = self.secret_name(target).as_deref() == Some(guess.as_str());
        if exact != (answer == Answer::Busted) {
            return Err(Error::InvalidAnswer);
        }

        let result = answer.is_yes();
        if result {
            self.capture(guesser, target);
        } else {
            self.current_player = Some(target);
        }
        self.current_guess_target = None;
        self.current_guess = None;
        self.last_guess = Some(LastGuess {
            player: guesser,
            target,
            guess,
            result,
        });
        Ok(())
    }

    /// Moves the target and everyone in their family into the guesser's family
    fn capture(&mut self, guesser: Id, target: Id) {
        if let Some(details) = self.players.get_mut(&guesser) {
            details.all_families = vec![guesser];
        }
        for (id, details) in &mut self.players {
            if *id == target || details.family == Some(target) {
                details.family = Some(guesser);
                details.all_families.push(guesser);
            }
        }
        tracing::info!("Player {guesser} captured the family of {target}");
    }

    fn chat(&mut self, watchers: &Watchers, player_id: Id, text: &str) -> Result<ChatMessage, Error> {
        let details = self.players.get(&player_id).ok_or(Error::WrongPhase)?;
        if details.all_families.is_empty() {
            return Err(Error::WrongPhase);
        }
        let head = details.family.unwrap_or(player_id);
        let head_name = watchers
            .get_name(head)
            .unwrap_or_else(|| "Unknown".to_owned());
        let sender = watchers.get_name(player_id).ok_or(Error::UnknownPlayer)?;
        Ok(self
            .chats
            .send(head, chat::chat_name(&head_name), sender, text)?)
    }

    /// Handles a message from the host
    ///
    /// # Errors
    ///
    /// Fails when the message does not fit the phase.
    pub fn receive_host_message<S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        watchers: &Watchers,
        message: IncomingHostMessage,
        mut schedule_message: S,
    ) -> Result<(), Error> {
        match message {
            IncomingHostMessage::StartGame => {
                self.require(State::Lobby)?;
                self.state = State::Slideshow;
                tracing::info!(
                    "Family lobby closed with {} players",
                    self.active_players(watchers).len()
                );
            }
            IncomingHostMessage::ShowSecretNames => {
                self.require(State::Slideshow)?;
                if self.slideshow.is_some() {
                    return Err(Error::WrongPhase);
                }
                let mut secret_names = self
                    .active_players(watchers)
                    .into_iter()
                    .filter_map(|id| self.secret_name(id))
                    .collect_vec();
                fastrand::shuffle(&mut secret_names);

                let frames = (1..=limits::SLIDESHOW_COUNTDOWN)
                    .rev()
                    .map(Frame::Countdown)
                    .chain(secret_names.into_iter().map(Frame::SecretName))
                    .collect_vec();

                self.slideshow_runs += 1;
                let run = self.slideshow_runs;
                if let Some(first) = frames.first() {
                    schedule_message(
                        AlarmMessage::Slideshow { run, position: 1 }.into(),
                        first.duration(),
                    );
                }
                self.slideshow = Some(Slideshow {
                    run,
                    frames,
                    position: 0,
                });
            }
            IncomingHostMessage::Next => {
                self.require(State::Slideshow)?;
                if self.slideshow.is_some() {
                    return Err(Error::WrongPhase);
                }
                self.state = State::Playing;
                self.current_player = None;
            }
            IncomingHostMessage::ChooseFirstPlayer(player_id) => {
                self.require(State::Playing)?;
                if self.present_current_player(watchers).is_some() {
                    return Err(Error::WrongPhase);
                }
                if !self.is_active(player_id, watchers) {
                    return Err(Error::UnknownPlayer);
                }
                self.current_player = Some(player_id);
                self.current_guess_target = None;
                self.current_guess = None;
            }
            IncomingHostMessage::PlayAgain => {
                if self.winner(watchers).is_none() {
                    return Err(Error::WrongPhase);
                }
                self.play_again();
            }
        }
        Ok(())
    }

    /// Back to the lobby; players keep their real names but choose new secret names
    pub fn play_again(&mut self) {
        self.state = State::Lobby;
        self.secret_names.clear();
        for details in self.players.values_mut() {
            details.secret_name = None;
            details.family = None;
            details.all_families.clear();
        }
        self.slideshow = None;
        self.current_player = None;
        self.current_guess_target = None;
        self.current_guess = None;
        self.last_guess = None;
        tracing::info!("Family game restarted");
    }

    /// Handles a timed transition
    ///
    /// # Returns
    ///
    /// Whether anything changed; alarms from earlier runs are ignored.
    pub fn receive_alarm<S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        message: &AlarmMessage,
        mut schedule_message: S,
    ) -> bool {
        let AlarmMessage::Slideshow { run, position } = *message;
        let Some(slideshow) = &mut self.slideshow else {
            return false;
        };
        if slideshow.run != run || self.state != State::Slideshow {
            return false;
        }

        match slideshow.frames.get(position) {
            Some(frame) => {
                schedule_message(
                    AlarmMessage::Slideshow {
                        run,
                        position: position + 1,
                    }
                    .into(),
                    frame.duration(),
                );
                slideshow.position = position;
            }
            None => {
                self.slideshow = None;
                tracing::debug!("Slideshow {run} finished");
            }
        }
        true
    }

    /// Forgets a player who left
    ///
    /// In the lobby their secret name is freed. A question they were part
    /// of is dropped; if they were asking, the host picks who asks next.
    pub fn remove_player(&mut self, player_id: Id) {
        if self.state == State::Lobby {
            self.players.remove(&player_id);
            self.secret_names.remove(&player_id);
            return;
        }
        if self.current_player == Some(player_id) {
            self.current_player = None;
            self.current_guess_target = None;
            self.current_guess = None;
        } else if self.current_guess_target == Some(player_id) {
            self.current_guess_target = None;
            self.current_guess = None;
        }
    }

    fn display_name(watchers: &Watchers, id: Id) -> String {
        watchers
            .get_player(id)
            .map(|player| player.display_name().to_owned())
            .unwrap_or_else(|| "Unknown".to_owned())
    }

    fn last_guess_view(&self, watchers: &Watchers) -> Option<GuessView> {
        let last = self.last_guess.as_ref()?;
        Some(GuessView {
            player: watchers.get_name(last.player)?,
            target: watchers.get_name(last.target)?,
            guess: last.guess.clone(),
            result: last.result,
        })
    }

    fn entries(&self, watchers: &Watchers, ids: Vec<Id>) -> Vec<PlayerEntry> {
        ids.into_iter()
            .map(|id| PlayerEntry::new(id, watchers, self.secret_name(id).is_some()))
            .collect_vec()
    }

    /// The screen a participant sees
    pub fn state_message(&self, watcher_id: Id, watchers: &Watchers) -> SyncMessage {
        let is_host = watchers.is_host(watcher_id);

        if let Some(winner) = self.winner(watchers) {
            return SyncMessage::Winner {
                name: Self::display_name(watchers, winner),
                secret_name: self.secret_name(winner).unwrap_or_default(),
                can_play_again: is_host,
            };
        }

        match self.state {
            State::Lobby => {
                if watchers.is_player(watcher_id) && self.secret_name(watcher_id).is_none() {
                    SyncMessage::Join {
                        name: watchers.get_name(watcher_id),
                    }
                } else {
                    SyncMessage::WaitingForPlayers { can_start: is_host }
                }
            }
            State::Slideshow => match &self.slideshow {
                Some(slideshow) => {
                    let frame = slideshow.frames.get(slideshow.position);
                    SyncMessage::Slideshow {
                        text: frame.map(Frame::text).unwrap_or_default(),
                        countdown: matches!(frame, Some(Frame::Countdown(_))),
                    }
                }
                None if is_host => SyncMessage::SlideshowControls,
                None => SyncMessage::WaitingForHost,
            },
            State::Playing => self.playing_message(watcher_id, watchers, is_host),
        }
    }

    fn playing_message(&self, watcher_id: Id, watchers: &Watchers, is_host: bool) -> SyncMessage {
        let Some(current) = self.present_current_player(watchers) else {
            return if is_host {
                SyncMessage::ChooseFirstPlayer {
                    players: self.entries(watchers, self.active_players(watchers)),
                }
            } else {
                SyncMessage::WaitingForHost
            };
        };
        let player_name = Self::display_name(watchers, current);

        match (self.current_guess_target, &self.current_guess) {
            (None, _) if watcher_id == current => SyncMessage::ChooseTarget {
                last_guess: self.last_guess_view(watchers),
                targets: self.entries(
                    watchers,
                    self.active_players(watchers)
                        .into_iter()
                        .filter(|id| *id != current)
                        .collect_vec(),
                ),
            },
            (None, _) => SyncMessage::WaitingForTarget {
                last_guess: self.last_guess_view(watchers),
                player_name,
            },
            (Some(target), None) if watcher_id == current => SyncMessage::MakeGuess {
                target_name: Self::display_name(watchers, target),
            },
            (Some(target), None) => SyncMessage::Asking {
                player_name,
                target_name: Self::display_name(watchers, target),
            },
            (Some(target), Some(guess)) if watcher_id == target => SyncMessage::Answer {
                player_name,
                guess: guess.clone(),
                can_bust: self.secret_name(target).as_ref() == Some(guess),
            },
            (Some(target), Some(guess)) => SyncMessage::Question {
                player_name,
                target_name: Self::display_name(watchers, target),
                guess: guess.clone(),
            },
        }
    }

    /// Family heads with their captured members
    pub fn roster_message(&self, watchers: &Watchers) -> SyncMessage {
        SyncMessage::Players(
            watchers
                .sorted_players(true)
                .into_iter()
                .filter(|(id, _)| self.family(*id).is_none())
                .map(|(id, _)| FamilyEntry {
                    player: PlayerEntry::new(id, watchers, self.secret_name(id).is_some()),
                    family: watchers
                        .sorted_players(false)
                        .into_iter()
                        .filter(|(member, _)| self.family(*member) == Some(id))
                        .map(|(member, player)| {
                            format!(
                                "{} ({})",
                                player.display_name(),
                                self.secret_name(member).unwrap_or_default()
                            )
                        })
                        .collect_vec(),
                })
                .collect_vec(),
        )
    }

    /// The chats of a player, once they belong to one
    pub fn chat_message(&self, watcher_id: Id, watchers: &Watchers) -> Option<SyncMessage> {
        let details = self.players.get(&watcher_id)?;
        if details.all_families.is_empty() {
            return None;
        }
        let head = details.family.unwrap_or(watcher_id);
        Some(SyncMessage::Chat {
            name: chat::chat_name(&Self::display_name(watchers, head)),
            messages: self.chats.view(&details.all_families),
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{
        session::tests::RecordingTunnel,
        watcher::{PlayerValue, Value},
    };

    struct Table {
        game: Family,
        watchers: Watchers,
        names: Names,
        host: Id,
        alarms: Vec<(crate::AlarmMessage, Duration)>,
        tunnel: RecordingTunnel,
    }

    impl Table {
        fn new() -> Self {
            let host = Id::new();
            Self {
                game: Family::default(),
                watchers: Watchers::with_host_id(host),
                names: Names::default(),
                host,
                alarms: Vec::new(),
                tunnel: RecordingTunnel::default(),
            }
        }

        fn send(&mut self, player: Id, message: IncomingPlayerMessage) -> Result<(), Error> {
            let tunnel = self.tunnel.clone();
            self.game.receive_player_message(
                &mut self.watchers,
                &mut self.names,
                player,
                message,
                |_| Some(tunnel.clone()),
            )
        }

        fn host_sends(&mut self, message: IncomingHostMessage) -> Result<(), Error> {
            let alarms = &mut self.alarms;
            self.game
                .receive_host_message(&self.watchers, message, |alarm, duration| {
                    alarms.push((alarm, duration));
                })
        }

        fn alarm(&mut self, message: &crate::AlarmMessage) -> bool {
            let crate::AlarmMessage::Family(message) = message else {
                return false;
            };
            let alarms = &mut self.alarms;
            self.game.receive_alarm(message, |alarm, duration| {
                alarms.push((alarm, duration));
            })
        }

        fn join(&mut self, player: Id, name: &str, secret: &str) {
            if !self.watchers.has_watcher(player) {
                self.watchers
                    .add_watcher(player, Value::Player(PlayerValue::default()))
                    .unwrap();
            }
            self.send(
                player,
                IncomingPlayerMessage::Join {
                    name: name.to_owned(),
                    secret_name: secret.to_owned(),
                },
            )
            .unwrap();
        }

        /// Host "Hana" (Cher), "Omar" (Bono), "Pia" (Adele), guessing begins with Hana
        fn playing(&mut self) -> (Id, Id, Id) {
            let host = self.host;
            let omar = Id::new();
            let pia = Id::new();
            self.join(host, "Hana", "Cher");
            self.join(omar, "Omar", "Bono");
            self.join(pia, "Pia", "Adele");
            self.host_sends(IncomingHostMessage::StartGame).unwrap();
            self.host_sends(IncomingHostMessage::Next).unwrap();
            self.host_sends(IncomingHostMessage::ChooseFirstPlayer(host))
                .unwrap();
            (host, omar, pia)
        }

        fn ask(&mut self, asker: Id, target: Id, guess: &str) {
            self.send(asker, IncomingPlayerMessage::ChooseTarget(target))
                .unwrap();
            self.send(asker, IncomingPlayerMessage::Guess(guess.to_owned()))
                .unwrap();
        }
    }

    #[test]
    fn test_join_requires_unique_secret_names() {
        let mut table = Table::new();
        let host = table.host;
        table.join(host, "Hana", "Cher");
        assert_eq!(table.game.secret_name(host), Some("Cher".to_owned()));

        let other = Id::new();
        table
            .watchers
            .add_watcher(other, Value::Player(PlayerValue::default()))
            .unwrap();
        assert_eq!(
            table.send(
                other,
                IncomingPlayerMessage::Join {
                    name: "Omar".to_owned(),
                    secret_name: " Cher ".to_owned(),
                }
            ),
            Err(Error::Name(names::Error::Used))
        );
        assert!(matches!(
            table.game.state_message(other, &table.watchers),
            SyncMessage::Join { .. }
        ));
        assert_eq!(table.watchers.get_name(other), None);
        assert_eq!(table.names.get_id("Omar"), None);

        let third = Id::new();
        table.join(third, "Omar", "Bono");
        assert_eq!(table.watchers.get_name(third), Some("Omar".to_owned()));
    }

    #[test]
    fn test_update_secret_name_frees_it() {
        let mut table = Table::new();
        let host = table.host;
        table.join(host, "Hana", "Cher");
        table
            .send(host, IncomingPlayerMessage::UpdateSecretName)
            .unwrap();
        assert_eq!(table.game.secret_name(host), None);
        match table.game.state_message(host, &table.watchers) {
            SyncMessage::Join { name } => assert_eq!(name, Some("Hana".to_owned())),
            other => panic!("unexpected {other:?}"),
        }

        table.join(Id::new(), "Omar", "Cher");
    }

    #[test]
    fn test_slideshow_runs_through_frames() {
        let mut table = Table::new();
        let host = table.host;
        table.join(host, "Hana", "Cher");
        table.join(Id::new(), "Omar", "Bono");
        table.host_sends(IncomingHostMessage::StartGame).unwrap();
        assert!(matches!(
            table.game.state_message(host, &table.watchers),
            SyncMessage::SlideshowControls
        ));

        table
            .host_sends(IncomingHostMessage::ShowSecretNames)
            .unwrap();
        assert_eq!(
            table.host_sends(IncomingHostMessage::ShowSecretNames),
            Err(Error::WrongPhase)
        );
        assert_eq!(
            table.host_sends(IncomingHostMessage::Next),
            Err(Error::WrongPhase)
        );

        match table.game.state_message(host, &table.watchers) {
            SyncMessage::Slideshow { text, countdown } => {
                assert_eq!(text, "Starting names in 5...");
                assert!(countdown);
            }
            other => panic!("unexpected {other:?}"),
        }

        let mut shown = Vec::new();
        while let Some((alarm, duration)) = table.alarms.pop() {
            assert!(table.alarm(&alarm));
            if let SyncMessage::Slideshow { text, countdown } =
                table.game.state_message(host, &table.watchers)
            {
                if countdown {
                    assert_eq!(duration, Duration::from_secs(1));
                } else {
                    shown.push(text);
                }
            }
        }
        shown.dedup();
        shown.sort();
        assert_eq!(shown, vec!["Bono", "Cher"]);
        assert!(matches!(
            table.game.state_message(host, &table.watchers),
            SyncMessage::SlideshowControls
        ));

        table.host_sends(IncomingHostMessage::Next).unwrap();
        assert_eq!(table.game.state(), State::Playing);
    }

    #[test]
    fn test_stale_slideshow_alarm_is_ignored() {
        let mut table = Table::new();
        table.join(table.host, "Hana", "Cher");
        table.host_sends(IncomingHostMessage::StartGame).unwrap();
        let stale: crate::AlarmMessage = AlarmMessage::Slideshow {
            run: 7,
            position: 1,
        }
        .into();
        assert!(!table.alarm(&stale));
    }

    #[test]
    fn test_first_player_needs_host_and_active_player() {
        let mut table = Table::new();
        let host = table.host;
        table.join(host, "Hana", "Cher");
        table.join(Id::new(), "Omar", "Bono");
        table.host_sends(IncomingHostMessage::StartGame).unwrap();
        table.host_sends(IncomingHostMessage::Next).unwrap();

        match table.game.state_message(host, &table.watchers) {
            SyncMessage::ChooseFirstPlayer { players } => assert_eq!(players.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            table.host_sends(IncomingHostMessage::ChooseFirstPlayer(Id::new())),
            Err(Error::UnknownPlayer)
        );
    }

    #[test]
    fn test_wrong_guess_passes_turn() {
        let mut table = Table::new();
        let (host, omar, pia) = table.playing();

        assert_eq!(
            table.send(omar, IncomingPlayerMessage::ChooseTarget(pia)),
            Err(Error::NotYourTurn)
        );
        assert_eq!(
            table.send(host, IncomingPlayerMessage::ChooseTarget(host)),
            Err(Error::UnknownPlayer)
        );

        table.ask(host, omar, "Adele");
        match table.game.state_message(omar, &table.watchers) {
            SyncMessage::Answer {
                player_name,
                guess,
                can_bust,
            } => {
                assert_eq!(player_name, "Hana");
                assert_eq!(guess, "Adele");
                assert!(!can_bust);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            table.game.state_message(pia, &table.watchers),
            SyncMessage::Question { .. }
        ));
        assert_eq!(
            table.send(omar, IncomingPlayerMessage::Answer(Answer::Busted)),
            Err(Error::InvalidAnswer)
        );
        assert_eq!(
            table.send(pia, IncomingPlayerMessage::Answer(Answer::NotMe)),
            Err(Error::NotYourTurn)
        );

        table
            .send(omar, IncomingPlayerMessage::Answer(Answer::NotMe))
            .unwrap();
        assert_eq!(table.game.current_player(), Some(omar));
        match table.game.state_message(omar, &table.watchers) {
            SyncMessage::ChooseTarget {
                last_guess: Some(last),
                targets,
            } => {
                assert_eq!(
                    last,
                    GuessView {
                        player: "Hana".to_owned(),
                        target: "Omar".to_owned(),
                        guess: "Adele".to_owned(),
                        result: false,
                    }
                );
                assert_eq!(targets.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_right_guess_captures_family_and_keeps_turn() {
        let mut table = Table::new();
        let (host, omar, pia) = table.playing();

        table.ask(host, omar, "Bono");
        assert!(matches!(
            table.game.state_message(omar, &table.watchers),
            SyncMessage::Answer { can_bust: true, .. }
        ));
        assert_eq!(
            table.send(omar, IncomingPlayerMessage::Answer(Answer::CloseEnough)),
            Err(Error::InvalidAnswer)
        );
        table
            .send(omar, IncomingPlayerMessage::Answer(Answer::Busted))
            .unwrap();

        assert_eq!(table.game.current_player(), Some(host));
        assert_eq!(table.game.family(omar), Some(host));
        assert_eq!(table.game.all_families(host), &[host]);
        assert_eq!(table.game.all_families(omar), &[host]);
        assert!(table.game.winner(&table.watchers).is_none());

        match table.game.roster_message(&table.watchers) {
            SyncMessage::Players(entries) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].player.id, host);
                assert_eq!(entries[0].family, vec!["Omar (Bono)"]);
            }
            other => panic!("unexpected {other:?}"),
        }

        table.ask(host, pia, "Adel");
        table
            .send(pia, IncomingPlayerMessage::Answer(Answer::CloseEnough))
            .unwrap();
        assert_eq!(table.game.winner(&table.watchers), Some(host));
        match table.game.state_message(pia, &table.watchers) {
            SyncMessage::Winner {
                name,
                secret_name,
                can_play_again,
            } => {
                assert_eq!(name, "Hana");
                assert_eq!(secret_name, "Cher");
                assert!(!can_play_again);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_capture_moves_whole_family() {
        let mut table = Table::new();
        let (host, omar, pia) = table.playing();

        table.ask(host, omar, "Nope");
        table
            .send(omar, IncomingPlayerMessage::Answer(Answer::NotMe))
            .unwrap();
        table.ask(omar, pia, "Adele");
        table
            .send(pia, IncomingPlayerMessage::Answer(Answer::Busted))
            .unwrap();
        assert_eq!(table.game.family(pia), Some(omar));

        table.ask(omar, host, "Nope");
        table
            .send(host, IncomingPlayerMessage::Answer(Answer::NotMe))
            .unwrap();
        table.ask(host, omar, "Bono");
        table
            .send(omar, IncomingPlayerMessage::Answer(Answer::Busted))
            .unwrap();

        assert_eq!(table.game.family(omar), Some(host));
        assert_eq!(table.game.family(pia), Some(host));
        assert_eq!(table.game.all_families(pia), &[omar, host]);
        assert_eq!(table.game.all_families(omar), &[omar, host]);
        assert_eq!(table.game.winner(&table.watchers), Some(host));
    }

    #[test]
    fn test_chat_reaches_family_only() {
        let mut table = Table::new();
        let (host, omar, pia) = table.playing();
        assert_eq!(
            table.send(host, IncomingPlayerMessage::Chat("hi".to_owned())),
            Err(Error::WrongPhase)
        );

        table.ask(host, omar, "Bono");
        table
            .send(omar, IncomingPlayerMessage::Answer(Answer::Busted))
            .unwrap();
        table.tunnel.clear();

        table
            .send(omar, IncomingPlayerMessage::Chat(" hello ".to_owned()))
            .unwrap();
        let updates = table.tunnel.updates();
        assert_eq!(updates.len(), 2);

        match table.game.chat_message(host, &table.watchers) {
            Some(SyncMessage::Chat { name, messages }) => {
                assert_eq!(name, "Hana's family");
                assert_eq!(messages.exact_count(), 1);
                assert_eq!(messages.items()[0].sender, "Omar");
                assert_eq!(messages.items()[0].message, "hello");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(table.game.chat_message(pia, &table.watchers).is_none());
        assert_eq!(
            table.send(omar, IncomingPlayerMessage::Chat("  ".to_owned())),
            Err(Error::Name(names::Error::Empty))
        );
    }

    #[test]
    fn test_asker_leaving_returns_choice_to_host() {
        let mut table = Table::new();
        let (host, omar, pia) = table.playing();
        table.ask(host, omar, "Bono");

        table.watchers.update_watcher_value(host, Value::Spectator);
        table.game.remove_player(host);

        let new_host = table.watchers.host().unwrap();
        match table.game.state_message(new_host, &table.watchers) {
            SyncMessage::ChooseFirstPlayer { players } => {
                let ids = players.iter().map(|p| p.id).collect_vec();
                assert_eq!(ids, vec![omar, pia]);
            }
            other => panic!("unexpected {other:?}"),
        }
        table
            .host_sends(IncomingHostMessage::ChooseFirstPlayer(pia))
            .unwrap();
        assert!(matches!(
            table.game.state_message(pia, &table.watchers),
            SyncMessage::ChooseTarget { .. }
        ));
    }

    #[test]
    fn test_play_again_resets_round() {
        let mut table = Table::new();
        let (host, omar, pia) = table.playing();
        assert_eq!(
            table.host_sends(IncomingHostMessage::PlayAgain),
            Err(Error::WrongPhase)
        );

        table.ask(host, omar, "Bono");
        table
            .send(omar, IncomingPlayerMessage::Answer(Answer::Busted))
            .unwrap();
        table.ask(host, pia, "Adele");
        table
            .send(pia, IncomingPlayerMessage::Answer(Answer::Busted))
            .unwrap();
        table.host_sends(IncomingHostMessage::PlayAgain).unwrap();

        assert_eq!(table.game.state(), State::Lobby);
        for id in [host, omar, pia] {
            assert_eq!(table.game.secret_name(id), None);
            assert_eq!(table.game.family(id), None);
            assert!(table.game.all_families(id).is_empty());
        }
        assert_eq!(table.watchers.get_name(omar), Some("Omar".to_owned()));
        table.join(omar, "Omar", "Cher");
    }

    #[test]
    fn test_serde_roundtrip_keeps_secret_names_unique() {
        let mut table = Table::new();
        table.join(table.host, "Hana", "Cher");

        let json = serde_json::to_string(&table.game).unwrap();
        let mut back: Family = serde_json::from_str(&json).unwrap();
        assert_eq!(back.secret_name(table.host), Some("Cher".to_owned()));
        assert_eq!(
            back.secret_names.set_name(Id::new(), "Cher"),
            Err(names::Error::Used)
        );
    }
}
