//! Experience tracks and the per-trainer progression records behind them.

use serde::{Deserialize, Serialize};

use crate::error::{EnumKind, GameError};
use crate::stats::{AttributeTable, StatTarget};
use crate::weapons::{Weapon, WeaponClass};

/// Bonus one level of experience adds to its stat
pub const LEVEL_BONUS: f64 = 0.01;

/// Experience needed to grow one level, indexed by current level
const EXP_TO_GROW: [u32; 66] = [
    10, 12, 14, 16, 19, 22, 26, 31, 37, 44,
    52, 62, 74, 88, 105, 126, 151, 181, 217, 260,
    312, 374, 448, 537, 644, 772, 926, 1110, 1330, 1590,
    1900, 2280, 2730, 3270, 3920, 4700, 5640, 6760, 8110, 9730,
    11600, 13900, 16600, 19900, 23800, 28500, 34200, 41000, 49200, 59000,
    70800, 84900, 101000, 121000, 145000, 174000, 208000, 249000,
    298000, 357000, 428000, 513000, 615000, 738000, 885000, 1060000,
];

/// What an experience record applies to: a weapon class or a single weapon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ExpTrack {
    OffHand = 1,
    TwoHand = 2,
    EitherHand = 3,
    MainHand = 4,
    Amplifier = 5,
    Generator = 6,
    Bombarder = 7,
    Lancer = 8,
    Launcher = 9,
    Pistol = 10,
    Propeller = 11,
    Projector = 12,
    Catapulter = 13,
}

impl ExpTrack {
    pub fn from_u8(value: u8) -> Option<Self> {
        let track = match value {
            1 => Self::OffHand,
            2 => Self::TwoHand,
            3 => Self::EitherHand,
            4 => Self::MainHand,
            5 => Self::Amplifier,
            6 => Self::Generator,
            7 => Self::Bombarder,
            8 => Self::Lancer,
            9 => Self::Launcher,
            10 => Self::Pistol,
            11 => Self::Propeller,
            12 => Self::Projector,
            13 => Self::Catapulter,
            _ => return None,
        };
        Some(track)
    }

    pub fn try_from_id(value: i64) -> Result<Self, GameError> {
        u8::try_from(value)
            .ok()
            .and_then(Self::from_u8)
            .ok_or_else(|| GameError::invalid(EnumKind::ExpTrack, value))
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Class-wide track covering a weapon
    pub fn general_for(weapon: Weapon) -> Self {
        match weapon.class() {
            WeaponClass::OffHand => Self::OffHand,
            WeaponClass::TwoHand => Self::TwoHand,
            WeaponClass::EitherHand => Self::EitherHand,
            WeaponClass::MainHand => Self::MainHand,
        }
    }

    /// Track for exactly one weapon
    pub fn specific_for(weapon: Weapon) -> Self {
        match weapon {
            Weapon::Amplifier => Self::Amplifier,
            Weapon::Generator => Self::Generator,
            Weapon::Bombarder => Self::Bombarder,
            Weapon::Lancer => Self::Lancer,
            Weapon::Launcher => Self::Launcher,
            Weapon::Pistol => Self::Pistol,
            Weapon::Propeller => Self::Propeller,
            Weapon::Projector => Self::Projector,
            Weapon::Catapulter => Self::Catapulter,
        }
    }

    pub fn affects(&self, weapon: Weapon) -> bool {
        *self == Self::general_for(weapon) || *self == Self::specific_for(weapon)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OffHand => "Off Hand",
            Self::TwoHand => "Two Hand",
            Self::EitherHand => "Either Hand",
            Self::MainHand => "Main Hand",
            Self::Amplifier => "Amplifier",
            Self::Generator => "Generator",
            Self::Bombarder => "Bombarder",
            Self::Lancer => "Lancer",
            Self::Launcher => "Launcher",
            Self::Pistol => "Pistol",
            Self::Propeller => "Propeller",
            Self::Projector => "Projector",
            Self::Catapulter => "Catapulter",
        }
    }
}

/// Progression of one user on one (track, stat) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceRecord {
    pub owner: u64,
    pub track: ExpTrack,
    pub target: StatTarget,
    pub level: u32,
    /// Unspent experience
    pub exp: u32,
    /// Experience earned over the record's lifetime
    pub total_exp: u64,
}

impl ExperienceRecord {
    pub fn new(owner: u64, track: ExpTrack, target: StatTarget) -> Self {
        Self { owner, track, target, level: 0, exp: 0, total_exp: 0 }
    }

    pub fn matches(&self, owner: u64, track: ExpTrack, target: StatTarget) -> bool {
        self.owner == owner && self.track == track && self.target == target
    }

    pub fn grant(&mut self, amount: u32) {
        self.exp = self.exp.saturating_add(amount);
        self.total_exp += u64::from(amount);
    }

    /// Spends unspent experience to gain `levels` levels.
    ///
    /// Returns the experience spent. On failure the record is unchanged.
    pub fn advance(&mut self, levels: u32) -> Result<u64, GameError> {
        let target = self.level.saturating_add(levels);
        let cost = exp_required_between(self.level, target).unwrap_or(0);
        let available = u64::from(self.exp);
        if available < cost {
            return Err(GameError::NotEnoughExp { needed: cost, available: self.exp });
        }
        self.level = target;
        self.exp = u32::try_from(available - cost).unwrap_or(0);
        Ok(cost)
    }

    pub fn bonus(&self) -> f64 {
        f64::from(self.level) * LEVEL_BONUS
    }
}

/// Experience needed to grow from `level` to the next, capped at the last table entry
pub fn exp_required_at_level(level: u32) -> u32 {
    EXP_TO_GROW
        .get(level as usize)
        .copied()
        .unwrap_or(EXP_TO_GROW[EXP_TO_GROW.len() - 1])
}

/// Total experience to advance several levels at once.
///
/// Each level past the first is priced further up the table than the last,
/// so buying levels in bulk costs more than buying them one by one.
/// Returns `None` unless `from < to`.
pub fn exp_required_between(from: u32, to: u32) -> Option<u64> {
    if from >= to {
        return None;
    }

    let mut total = 0u64;
    let mut step = 0;
    let mut eval_level = from;
    for level in from..to {
        total += u64::from(exp_required_at_level(eval_level));
        if level > from {
            step += 1;
        }
        eval_level += step;
    }
    Some(total)
}

/// Bonus table a set of experience records grants to a weapon
pub fn bonuses_for<'a>(weapon: Weapon, records: impl IntoIterator<Item = &'a ExperienceRecord>) -> AttributeTable {
    let mut table = AttributeTable::default();
    for record in records.into_iter().filter(|r| r.track.affects(weapon)) {
        table.add(record.target, record.bonus());
    }
    table
}
