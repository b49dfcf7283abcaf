//! Weapon identities and the static stat table behind them.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EnumKind, GameError};
use crate::stats::{AttributeTable, StatTarget, COMBAT_STAT_COUNT};

/// Ticks a weapon spends reloading once its magazine runs dry
pub const RELOAD_TIME: f64 = 4.0;

/// Damage that breaks a combatant's morale, repeated at every multiple
pub const RUNAWAY_DAMAGE: f64 = 500.0;

/// Ticks a combatant cowers after its morale breaks
pub const BROKEN_TICKS: u32 = 3;

/// Weapon a trainer brings into the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Weapon {
    Generator = 1,
    Amplifier = 2,
    Launcher = 3,
    Bombarder = 4,
    Lancer = 5,
    Pistol = 6,
    Propeller = 7,
    Projector = 8,
    Catapulter = 9,
}

/// All weapons in id order
pub const WEAPONS: [Weapon; 9] = [
    Weapon::Generator,
    Weapon::Amplifier,
    Weapon::Launcher,
    Weapon::Bombarder,
    Weapon::Lancer,
    Weapon::Pistol,
    Weapon::Propeller,
    Weapon::Projector,
    Weapon::Catapulter,
];

/// Wielding class, used to group experience
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponClass {
    OffHand,
    TwoHand,
    EitherHand,
    MainHand,
}

/// Linear scale turning a 1-3 grade into a stat value
#[derive(Debug, Clone, Copy)]
pub struct StatScale {
    pub base: f64,
    pub per_grade: f64,
}

/// Scales in combat-stat order (AttackSpeed .. Range)
pub const STAT_SCALES: [StatScale; COMBAT_STAT_COUNT] = [
    StatScale { base: 1.6, per_grade: 0.4 },
    StatScale { base: 24.0, per_grade: 5.1 },
    StatScale { base: 2.0, per_grade: 2.4 },
    StatScale { base: 0.31, per_grade: 0.1 },
    StatScale { base: 2.7, per_grade: 1.3 },
    StatScale { base: 0.1, per_grade: 0.13 },
    StatScale { base: 0.1, per_grade: 0.1 },
    StatScale { base: 0.03, per_grade: 0.18 },
    StatScale { base: 10.0, per_grade: 6.5 },
];

// Grades per weapon, columns in combat-stat order:
// AS, Dmg, Reload, Acc, Mob, Flex, Shield, Aim, Range
const WEAPON_GRADES: [[u8; COMBAT_STAT_COUNT]; 9] = [
    [3, 3, 2, 1, 2, 2, 3, 1, 2], // Generator
    [2, 2, 1, 3, 3, 2, 2, 3, 1], // Amplifier
    [1, 3, 1, 2, 2, 3, 3, 2, 2], // Launcher
    [2, 2, 3, 2, 3, 2, 3, 1, 1], // Bombarder
    [3, 1, 2, 1, 2, 3, 2, 2, 3], // Lancer
    [3, 2, 2, 3, 3, 1, 1, 2, 2], // Pistol
    [2, 3, 2, 3, 1, 1, 2, 2, 3], // Propeller
    [1, 1, 3, 2, 2, 3, 2, 3, 2], // Projector
    [2, 2, 3, 2, 1, 2, 1, 3, 3], // Catapulter
];

impl Weapon {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1..=9 => Some(WEAPONS[value as usize - 1]),
            _ => None,
        }
    }

    pub fn try_from_id(value: i64) -> Result<Self, GameError> {
        u8::try_from(value)
            .ok()
            .and_then(Self::from_u8)
            .ok_or_else(|| GameError::invalid(EnumKind::Weapon, value))
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Generator => "Generator",
            Self::Amplifier => "Amplifier",
            Self::Launcher => "Launcher",
            Self::Bombarder => "Bombarder",
            Self::Lancer => "Lancer",
            Self::Pistol => "Pistol",
            Self::Propeller => "Propeller",
            Self::Projector => "Projector",
            Self::Catapulter => "Catapulter",
        }
    }

    pub fn class(&self) -> WeaponClass {
        match self {
            Self::Amplifier | Self::Generator => WeaponClass::OffHand,
            Self::Bombarder | Self::Lancer | Self::Launcher => WeaponClass::TwoHand,
            Self::Pistol | Self::Propeller => WeaponClass::EitherHand,
            Self::Projector | Self::Catapulter => WeaponClass::MainHand,
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        WEAPONS[rng.gen_range(0..WEAPONS.len())]
    }
}

/// Grade (1-3) a weapon has in a combat stat, 0 for Proficiency
pub fn grade(weapon: Weapon, target: StatTarget) -> u8 {
    target
        .combat_index()
        .map(|i| WEAPON_GRADES[weapon.as_u8() as usize - 1][i])
        .unwrap_or(0)
}

/// Unmodified stat value of a weapon
pub fn base_attribute(weapon: Weapon, target: StatTarget) -> f64 {
    match target.combat_index() {
        Some(i) => {
            let scale = STAT_SCALES[i];
            scale.base + f64::from(grade(weapon, target)) * scale.per_grade
        }
        None => 0.0,
    }
}

/// Stat value after applying an additive bonus, scaled like a grade
pub fn attribute_with_bonus(weapon: Weapon, target: StatTarget, bonus: f64) -> f64 {
    match target.combat_index() {
        Some(i) => base_attribute(weapon, target) + STAT_SCALES[i].per_grade * bonus,
        None => 0.0,
    }
}

/// Full attribute table for a weapon given a bonus table
pub fn attributes_for(weapon: Weapon, bonuses: &AttributeTable) -> AttributeTable {
    AttributeTable::from_fn(|target| attribute_with_bonus(weapon, target, bonuses.get(target)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_generator_stats() {
        let w = Weapon::Generator;
        assert!(close(base_attribute(w, StatTarget::AttackSpeed), 2.8));
        assert!(close(base_attribute(w, StatTarget::Damage), 39.3));
        assert!(close(base_attribute(w, StatTarget::ReloadRate), 6.8));
        assert!(close(base_attribute(w, StatTarget::Accuracy), 0.41));
        assert!(close(base_attribute(w, StatTarget::Range), 23.0));
        assert_eq!(base_attribute(w, StatTarget::Proficiency), 0.0);
    }

    #[test]
    fn test_bonus_uses_grade_scale() {
        let with = attribute_with_bonus(Weapon::Pistol, StatTarget::Range, 0.1);
        let without = base_attribute(Weapon::Pistol, StatTarget::Range);
        assert!(close(with - without, 0.65));
    }

    #[test]
    fn test_weapon_ids() {
        for (i, weapon) in WEAPONS.iter().enumerate() {
            assert_eq!(weapon.as_u8() as usize, i + 1);
            assert_eq!(Weapon::from_u8(weapon.as_u8()), Some(*weapon));
        }
        assert!(Weapon::from_u8(0).is_none());
        assert!(Weapon::try_from_id(10).is_err());
    }

    #[test]
    fn test_every_weapon_has_same_grade_budget() {
        for weapon in WEAPONS {
            let total: u32 = crate::COMBAT_STATS.iter().map(|t| u32::from(grade(weapon, *t))).sum();
            assert_eq!(total, 19, "{} is unbalanced", weapon.name());
        }
    }

    #[test]
    fn test_attributes_for_empty_bonus_is_base() {
        let table = attributes_for(Weapon::Lancer, &AttributeTable::default());
        for (target, value) in table.iter() {
            assert!(close(value, base_attribute(Weapon::Lancer, target)));
        }
    }
}
