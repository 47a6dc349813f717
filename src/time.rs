//! Tick, game-clock and world-coordinate conversions.
//!
//! Replays advance at a fixed [`TICKS_PER_SECOND`]. "Game time" is measured
//! from the match-start horn and is negative during the pre-game; "replay
//! time" is measured from the first tick of the recording.
//!
//! # Example
//!
//! ```
//! use replay_extract::time::{format_game_time, tick_to_game_time};
//!
//! assert_eq!(tick_to_game_time(900, 0), 30.0);
//! assert_eq!(tick_to_game_time(0, 900), -30.0);
//! assert_eq!(format_game_time(-40.0), "-0:40");
//! assert_eq!(format_game_time(187.0), "3:07");
//! ```

/// Server ticks per second of game time.
pub const TICKS_PER_SECOND: f32 = 30.0;

/// Size of one world grid cell in world units.
pub const CELL_SIZE: f32 = 128.0;

/// Offset from grid space to world space; the map origin sits at the
/// centre of the cell grid.
pub const MAP_ORIGIN_BIAS: f32 = 16384.0;

/// Combat-log type code announcing a game-state change.
pub const COMBAT_LOG_GAME_STATE: i32 = 9;

/// Game-state value announcing that the match clock has started.
pub const GAME_STATE_IN_PROGRESS: i32 = 5;

/// Converts a tick to seconds since the match-start tick.
///
/// Ticks before `game_start_tick` produce negative values.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
pub fn tick_to_game_time(tick: u32, game_start_tick: u32) -> f32 {
    (i64::from(tick) - i64::from(game_start_tick)) as f32 / TICKS_PER_SECOND
}

/// Converts seconds since the match start back to a tick, saturating at
/// zero for times before the recording began.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn game_time_to_tick(game_time: f32, game_start_tick: u32) -> u32 {
    let offset = (game_time * TICKS_PER_SECOND) as i64;
    let tick = i64::from(game_start_tick) + offset;
    tick.clamp(0, i64::from(u32::MAX)) as u32
}

/// Converts a tick to seconds since the first tick of the recording.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn tick_to_replay_time(tick: u32) -> f32 {
    tick as f32 / TICKS_PER_SECOND
}

/// Formats seconds as a game clock string (`m:ss`, with a leading `-`
/// before the horn).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_game_time(seconds: f32) -> String {
    let whole = seconds.abs() as u64;
    let (mins, secs) = (whole / 60, whole % 60);
    if seconds < 0.0 && whole > 0 {
        format!("-{mins}:{secs:02}")
    } else {
        format!("{mins}:{secs:02}")
    }
}

/// Reconstructs one world-space axis from its grid cell and in-cell offset.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn world_coord(cell: i64, offset: f32) -> f32 {
    cell as f32 * CELL_SIZE + offset - MAP_ORIGIN_BIAS
}

/// Tracks the match-start tick as it is discovered during a traversal.
///
/// Two signals can establish the start: the game-rules entity's start-time
/// field turning positive, or a combat-log game-state entry reporting that
/// the game is in progress. Whichever is observed first wins.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GameClock {
    start_tick: Option<u32>,
    start_time: Option<f32>,
}

impl GameClock {
    /// Creates a clock with no known start.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock with a known start tick.
    #[must_use]
    pub fn started_at(tick: u32) -> Self {
        Self {
            start_tick: Some(tick),
            start_time: None,
        }
    }

    /// Records the game-rules start-time field observed at `tick`.
    ///
    /// Returns true if this observation established the start.
    pub fn observe_rules_start_time(&mut self, tick: u32, start_time: f32) -> bool {
        if self.start_tick.is_none() && start_time > 0.0 {
            self.start_tick = Some(tick);
            self.start_time = Some(start_time);
            return true;
        }
        false
    }

    /// Records a combat-log game-state entry observed at `tick`.
    ///
    /// Returns true if this observation established the start.
    pub fn observe_game_state(&mut self, tick: u32, state: i32, timestamp: f32) -> bool {
        if self.start_tick.is_none() && state == GAME_STATE_IN_PROGRESS {
            self.start_tick = Some(tick);
            self.start_time = Some(timestamp);
            return true;
        }
        false
    }

    /// Returns the match-start tick, if observed.
    #[must_use]
    pub fn start_tick(&self) -> Option<u32> {
        self.start_tick
    }

    /// Returns the match-start tick, or 0 if it has not been observed.
    #[must_use]
    pub fn start_tick_or_zero(&self) -> u32 {
        self.start_tick.unwrap_or(0)
    }

    /// Returns the server clock value at the match start, if known.
    #[must_use]
    pub fn start_time(&self) -> Option<f32> {
        self.start_time
    }

    /// Returns the game time at `tick`, or 0.0 while the start is unknown.
    #[must_use]
    pub fn game_time(&self, tick: u32) -> f32 {
        self.start_tick
            .map_or(0.0, |start| tick_to_game_time(tick, start))
    }
}
