//! Team scoring
//!
//! This module records the points each team earns per turn in a Celebrity
//! game and produces the standings shown while playing and at game over.

use std::collections::HashMap;

use itertools::Itertools;
use once_cell_serde::sync::OnceCell;
use serde::{Deserialize, Serialize};

use super::watcher::Id;

/// Serialization helper for Leaderboard struct
#[derive(Deserialize)]
struct LeaderboardSerde {
    points_earned: Vec<(Id, u64)>,
}

/// Points earned per turn and the running totals derived from them
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(from = "LeaderboardSerde")]
pub struct Leaderboard {
    /// Team and points for every finished turn, in order
    points_earned: Vec<(Id, u64)>,

    /// Total points per team (cached)
    #[serde(skip)]
    totals: HashMap<Id, u64>,
    /// Standings frozen when the game ended (computed once)
    #[serde(skip)]
    final_standings: OnceCell<Vec<(Id, u64)>>,
}

impl From<LeaderboardSerde> for Leaderboard {
    fn from(serde: LeaderboardSerde) -> Self {
        let totals = serde
            .points_earned
            .iter()
            .copied()
            .into_grouping_map()
            .sum();
        Self {
            points_earned: serde.points_earned,
            totals,
            final_standings: OnceCell::new(),
        }
    }
}

impl Leaderboard {
    /// Records the points a team earned in one turn
    pub fn add_turn(&mut self, team_id: Id, points: u64) {
        self.points_earned.push((team_id, points));
        *self.totals.entry(team_id).or_default() += points;
    }

    /// Total points of a team
    pub fn score(&self, team_id: Id) -> u64 {
        self.totals.get(&team_id).copied().unwrap_or_default()
    }

    /// Number of finished turns
    pub fn turns(&self) -> usize {
        self.points_earned.len()
    }

    /// Points earned by a team in each of its turns
    pub fn team_turns(&self, team_id: Id) -> Vec<u64> {
        self.points_earned
            .iter()
            .filter(|(id, _)| *id == team_id)
            .map(|(_, points)| *points)
            .collect_vec()
    }

    /// Teams ordered by total score, highest first
    ///
    /// Teams that never scored are listed with zero. Ties keep the order
    /// in which the teams were given.
    pub fn standings<I: IntoIterator<Item = Id>>(&self, team_ids: I) -> Vec<(Id, u64)> {
        team_ids
            .into_iter()
            .map(|id| (id, self.score(id)))
            .sorted_by(|(_, a), (_, b)| b.cmp(a))
            .collect_vec()
    }

    /// Freezes and returns the final standings
    ///
    /// The first call decides the standings; later calls return the same
    /// result regardless of the teams passed.
    pub fn final_standings<I: IntoIterator<Item = Id>>(&self, team_ids: I) -> &[(Id, u64)] {
        self.final_standings
            .get_or_init(|| self.standings(team_ids))
            .as_slice()
    }

    /// Forgets every score
    pub fn clear(&mut self) {
        self.points_earned.clear();
        self.totals.clear();
        self.final_standings = OnceCell::new();
    }
}
