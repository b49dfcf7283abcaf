//! Arena protocol definitions shared between the server and its front-end.

use serde::{Deserialize, Serialize};

use crate::experience::ExperienceRecord;
use crate::weapons::Weapon;

/// Default front-end listener port
pub const DEFAULT_PORT: u16 = 7777;

/// Ticks a battle lasts from start to finish
pub const BATTLE_TICKS: u32 = 300;

/// Scheduler ticks per second
pub const SCHEDULER_TICK_RATE: u32 = 1;

/// Seconds an entry waits before it may be paired
pub const QUEUE_DELAY_SECS: u64 = 30;

/// Further seconds an on-deck entry waits before facing an NPC
pub const NPC_WAIT_SECS: u64 = 30;

/// Seconds a loser's re-queue timestamp is pushed into the future
pub const LOSER_REQUEUE_PENALTY_SECS: u64 = 30;

// =============================================================================
// Battle State Types
// =============================================================================

/// Externally visible battle state of a trainer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BattleState {
    #[default]
    NoBattle,
    InQueue,
    LookingForBattle,
    InBattle,
}

impl BattleState {
    /// Whether a dequeue request has anything to remove
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::InQueue | Self::LookingForBattle)
    }
}

/// Aggregate combat statistics.
///
/// Collected per side during a battle and accumulated per user and per
/// trainer across battles.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CombatStats {
    pub battles: u32,
    pub wins: u32,
    pub shots_fired: u32,
    pub shots_hit: u32,
    pub shots_evaded: u32,
    pub criticals: u32,
    pub reloads: u32,
    pub times_fled: u32,
    pub damage_dealt: f64,
    pub damage_taken: f64,
    pub damage_reduced: f64,
    pub distance_moved: f64,
}

impl CombatStats {
    /// Adds another block of statistics into this one
    pub fn absorb(&mut self, other: &CombatStats) {
        self.battles += other.battles;
        self.wins += other.wins;
        self.shots_fired += other.shots_fired;
        self.shots_hit += other.shots_hit;
        self.shots_evaded += other.shots_evaded;
        self.criticals += other.criticals;
        self.reloads += other.reloads;
        self.times_fled += other.times_fled;
        self.damage_dealt += other.damage_dealt;
        self.damage_taken += other.damage_taken;
        self.damage_reduced += other.damage_reduced;
        self.distance_moved += other.distance_moved;
    }
}

/// Outcome of a finished battle as seen by one trainer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleSummary {
    pub battle_id: u64,
    pub trainer_id: u64,
    pub weapon: Weapon,
    /// `None` when the opponent was an NPC
    pub opponent_id: Option<u64>,
    pub opponent_weapon: Weapon,
    pub won: bool,
    pub stats: CombatStats,
}

// =============================================================================
// Requests and Responses
// =============================================================================

/// Messages sent from the front-end to the server, one JSON object per line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Put a trainer in the matchmaking queue
    Enqueue { user: u64, trainer: u64, weapon: u8 },

    /// Take a trainer out of the matchmaking queue
    Dequeue { user: u64, trainer: u64 },

    /// Ticks left in the trainer's running battle
    TimeRemaining { user: u64, trainer: u64 },

    /// Battle state plus the latest finished battle
    Status { user: u64, trainer: u64 },

    /// Spend unspent experience on one (track, stat) record to gain levels
    AdvanceExperience { user: u64, track: u8, target: u8, levels: u32 },
}

impl Request {
    pub fn user(&self) -> u64 {
        match self {
            Self::Enqueue { user, .. }
            | Self::Dequeue { user, .. }
            | Self::TimeRemaining { user, .. }
            | Self::Status { user, .. }
            | Self::AdvanceExperience { user, .. } => *user,
        }
    }

    /// `None` for requests about the user's own progression
    pub fn trainer(&self) -> Option<u64> {
        match self {
            Self::Enqueue { trainer, .. }
            | Self::Dequeue { trainer, .. }
            | Self::TimeRemaining { trainer, .. }
            | Self::Status { trainer, .. } => Some(*trainer),
            Self::AdvanceExperience { .. } => None,
        }
    }
}

/// Messages sent from the server to the front-end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Queued,
    Dequeued,
    TimeRemaining {
        ticks: u32,
    },
    Status {
        state: BattleState,
        /// Present only while the trainer is in a battle
        ticks_remaining: Option<u32>,
        last_battle: Option<BattleSummary>,
    },
    ExperienceAdvanced {
        record: ExperienceRecord,
    },
    /// Every failure carries the same generic message
    Failure {
        message: String,
    },
}

impl Response {
    pub fn failure() -> Self {
        Self::Failure { message: crate::error::GENERIC_FAILURE_MESSAGE.to_string() }
    }
}
