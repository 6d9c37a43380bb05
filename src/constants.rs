//! Configuration constants for the name games
//!
//! This module contains the limits and fixed timings used throughout the
//! crate so that both games enforce consistent boundaries.

/// Limits shared by every game type
pub mod game {
    /// Maximum number of participants (players and spectators) in one game
    pub const MAX_PLAYER_COUNT: usize = 200;
    /// Maximum length of a player's real name in characters
    pub const MAX_NAME_LENGTH: usize = 30;
    /// Upper bound on the number appended to generated game ids
    pub const GAME_ID_NUMBER_LIMIT: u8 = 100;
    /// Maximum number of players listed in a roster view
    pub const PLAYER_LIST_LIMIT: usize = 50;
}

/// Celebrity configuration constants
pub mod celebrity {
    /// Allowed values for the number of names each player submits
    pub const NAMES_PER_PLAYER_CHOICES: [usize; 3] = [5, 10, 20];
    /// Default number of names each player submits
    pub const DEFAULT_NAMES_PER_PLAYER: usize = 5;
    /// Allowed turn lengths in seconds
    pub const TIME_PER_PLAYER_CHOICES: [u64; 5] = [30, 45, 60, 90, 120];
    /// Default turn length in seconds
    pub const DEFAULT_TIME_PER_PLAYER: u64 = 60;
    /// Number of teams formed when the lobby closes
    pub const INITIAL_TEAM_COUNT: usize = 2;
    /// Teams can never be reduced below this count
    pub const MIN_TEAM_COUNT: usize = 2;
    /// Maximum length of a single celebrity name
    pub const MAX_CELEBRITY_NAME_LENGTH: usize = 100;
}

/// Family configuration constants
pub mod family {
    /// Seconds counted down before the secret names are shown
    pub const SLIDESHOW_COUNTDOWN: u64 = 5;
    /// Seconds each countdown frame stays on screen
    pub const COUNTDOWN_FRAME_SECONDS: u64 = 1;
    /// Seconds each secret name stays on screen
    pub const SECRET_NAME_FRAME_SECONDS: u64 = 2;
    /// Maximum length of a secret name or a guess
    pub const MAX_SECRET_NAME_LENGTH: usize = 100;
}

/// Family chat constants
pub mod chat {
    /// Maximum length of a single chat message
    pub const MAX_MESSAGE_LENGTH: usize = 500;
    /// Maximum number of messages returned in a chat view
    pub const VIEW_LIMIT: usize = 200;
}
