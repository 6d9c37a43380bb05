//! Team formation and turn rotation
//!
//! This module handles the teams of a Celebrity game: random formation,
//! reshuffling with a different team count, looking up a player's team,
//! and the rotation that decides who gives clues next.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::{names::Petname, watcher::Id};

/// A single team and its clue-giving order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Unique identifier, also used as the scoring key
    pub id: Id,
    /// Display name such as "Brave Otters"
    pub name: String,
    /// Members in the order they give clues; the front player is up next
    pub players: Vec<Id>,
}

/// Manages the teams of a game and whose turn it is
///
/// Departed players stay in their team's order; every lookup takes an
/// `is_present` filter so a player who rejoins keeps their place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamManager {
    /// Teams in turn order
    teams: Vec<Team>,
    /// Number of turns taken so far; the playing team is this modulo the team count
    current_team_index: usize,
    /// Style for generating team names
    name_style: Petname,
}

impl TeamManager {
    /// Creates a manager without any teams
    pub fn new(name_style: Petname) -> Self {
        Self {
            teams: Vec::new(),
            current_team_index: 0,
            name_style,
        }
    }

    /// Splits players randomly into `count` teams
    ///
    /// Players are shuffled and cut into contiguous slices whose
    /// boundaries are `len * i / count`, so sizes differ by at most one.
    /// Within a team, players are ordered by their sort key; players
    /// without one get a random key. The turn pointer is reset.
    ///
    /// # Arguments
    ///
    /// * `players` - Every player to place, with their optional sort key
    /// * `count` - Number of teams to form (at least one)
    pub fn make_teams(&mut self, players: &[(Id, Option<u64>)], count: usize) {
        let count = count.max(1);
        let mut shuffled = players.to_vec();
        fastrand::shuffle(&mut shuffled);

        let len = shuffled.len();
        let mut names: Vec<String> = Vec::with_capacity(count);

        self.teams = (0..count)
            .map(|i| {
                let members = shuffled[len * i / count..len * (i + 1) / count]
                    .iter()
                    .map(|(id, key)| (*id, key.unwrap_or_else(|| fastrand::u64(..))))
                    .sorted_by_key(|(_, key)| *key)
                    .map(|(id, _)| id)
                    .collect_vec();
                let name = self.unique_team_name(&names);
                names.push(name.clone());
                Team {
                    id: Id::new(),
                    name,
                    players: members,
                }
            })
            .collect();
        self.current_team_index = 0;

        tracing::debug!(
            "Formed {} teams from {} players",
            self.teams.len(),
            players.len()
        );
    }

    fn unique_team_name(&self, taken: &[String]) -> String {
        loop {
            let name = self.name_style.get_plural_name();
            if !taken.contains(&name) {
                return name;
            }
        }
    }

    /// All teams in turn order
    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    /// Number of teams
    pub fn count(&self) -> usize {
        self.teams.len()
    }

    /// Number of turns taken so far
    pub fn current_team_index(&self) -> usize {
        self.current_team_index
    }

    /// Looks up a team by id
    pub fn get(&self, team_id: Id) -> Option<&Team> {
        self.teams.iter().find(|team| team.id == team_id)
    }

    /// The team a player belongs to
    pub fn team_for_player(&self, player_id: Id) -> Option<&Team> {
        self.teams
            .iter()
            .find(|team| team.players.contains(&player_id))
    }

    /// The team whose turn it is and the player giving clues
    ///
    /// Starting from the team the turn pointer designates, the first team
    /// with a present member plays, and its first present member is up.
    ///
    /// # Returns
    ///
    /// `None` if there are no teams or nobody on any team is present
    pub fn current<F: Fn(Id) -> bool>(&self, is_present: F) -> Option<(&Team, Id)> {
        let count = self.teams.len();
        (0..count)
            .map(|offset| &self.teams[(self.current_team_index + offset) % count])
            .find_map(|team| {
                team.players
                    .iter()
                    .find(|id| is_present(**id))
                    .map(|id| (team, *id))
            })
    }

    /// The player currently giving clues
    pub fn current_player<F: Fn(Id) -> bool>(&self, is_present: F) -> Option<Id> {
        self.current(is_present).map(|(_, id)| id)
    }

    /// Ends the turn of `player_id`
    ///
    /// The player moves to the back of their team and the turn passes to
    /// the team after the one that just played.
    pub fn advance<F: Fn(Id) -> bool>(&mut self, player_id: Id, is_present: F) {
        let count = self.teams.len();
        if count == 0 {
            return;
        }

        let offset = (0..count)
            .find(|offset| {
                self.teams[(self.current_team_index + offset) % count]
                    .players
                    .iter()
                    .any(|id| is_present(*id))
            })
            .unwrap_or(0);
        let team_index = (self.current_team_index + offset) % count;

        let team = &mut self.teams[team_index].players;
        if let Some(position) = team.iter().position(|id| *id == player_id) {
            let player = team.remove(position);
            team.push(player);
        }

        self.current_team_index += offset + 1;
    }

    /// Removes all teams and resets the turn pointer
    pub fn clear(&mut self) {
        self.teams.clear();
        self.current_team_index = 0;
    }
}
