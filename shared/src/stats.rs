//! Stat targets and the per-combatant attribute tables built from them.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EnumKind, GameError};

/// Number of stats that take part in combat
pub const COMBAT_STAT_COUNT: usize = 9;

/// Stat a modifier or experience record can improve.
///
/// `Proficiency` is not a combat stat; it spreads its bonus over all nine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum StatTarget {
    Proficiency = 0,
    AttackSpeed = 1,
    Damage = 2,
    ReloadRate = 3,
    Accuracy = 4,
    Mobility = 5,
    Flexibility = 6,
    Shielding = 7,
    Aim = 8,
    Range = 9,
}

/// The nine combat stats in table order
pub const COMBAT_STATS: [StatTarget; COMBAT_STAT_COUNT] = [
    StatTarget::AttackSpeed,
    StatTarget::Damage,
    StatTarget::ReloadRate,
    StatTarget::Accuracy,
    StatTarget::Mobility,
    StatTarget::Flexibility,
    StatTarget::Shielding,
    StatTarget::Aim,
    StatTarget::Range,
];

impl StatTarget {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Proficiency),
            1 => Some(Self::AttackSpeed),
            2 => Some(Self::Damage),
            3 => Some(Self::ReloadRate),
            4 => Some(Self::Accuracy),
            5 => Some(Self::Mobility),
            6 => Some(Self::Flexibility),
            7 => Some(Self::Shielding),
            8 => Some(Self::Aim),
            9 => Some(Self::Range),
            _ => None,
        }
    }

    /// Checked conversion for ids coming from storage or requests
    pub fn try_from_id(value: i64) -> Result<Self, GameError> {
        u8::try_from(value)
            .ok()
            .and_then(Self::from_u8)
            .ok_or_else(|| GameError::invalid(EnumKind::StatTarget, value))
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Proficiency => "Proficiency",
            Self::AttackSpeed => "Attack Speed",
            Self::Damage => "Damage",
            Self::ReloadRate => "Reload Rate",
            Self::Accuracy => "Accuracy",
            Self::Mobility => "Mobility",
            Self::Flexibility => "Flexibility",
            Self::Shielding => "Shielding",
            Self::Aim => "Aim",
            Self::Range => "Range",
        }
    }

    pub fn is_combat(&self) -> bool {
        !matches!(self, Self::Proficiency)
    }

    /// Position in an attribute table, `None` for Proficiency
    pub fn combat_index(&self) -> Option<usize> {
        match self {
            Self::Proficiency => None,
            other => Some(other.as_u8() as usize - 1),
        }
    }

    /// Uniformly random combat stat
    pub fn random_combat<R: Rng + ?Sized>(rng: &mut R) -> Self {
        COMBAT_STATS[rng.gen_range(0..COMBAT_STAT_COUNT)]
    }
}

/// One value per combat stat.
///
/// Used both for final attributes and for additive bonus tables.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributeTable([f64; COMBAT_STAT_COUNT]);

impl AttributeTable {
    pub fn new(values: [f64; COMBAT_STAT_COUNT]) -> Self {
        Self(values)
    }

    pub fn from_fn(mut f: impl FnMut(StatTarget) -> f64) -> Self {
        let mut values = [0.0; COMBAT_STAT_COUNT];
        for (slot, target) in values.iter_mut().zip(COMBAT_STATS) {
            *slot = f(target);
        }
        Self(values)
    }

    /// Proficiency always reads as zero
    pub fn get(&self, target: StatTarget) -> f64 {
        target.combat_index().map(|i| self.0[i]).unwrap_or(0.0)
    }

    pub fn set(&mut self, target: StatTarget, value: f64) {
        if let Some(i) = target.combat_index() {
            self.0[i] = value;
        }
    }

    /// Adds to one stat, or to every stat when the target is Proficiency
    pub fn add(&mut self, target: StatTarget, amount: f64) {
        match target.combat_index() {
            Some(i) => self.0[i] += amount,
            None => self.0.iter_mut().for_each(|v| *v += amount),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (StatTarget, f64)> + '_ {
        COMBAT_STATS.into_iter().zip(self.0.iter().copied())
    }

    pub fn values(&self) -> &[f64; COMBAT_STAT_COUNT] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_ids_round_trip() {
        for id in 0..=9u8 {
            let target = StatTarget::from_u8(id).unwrap();
            assert_eq!(target.as_u8(), id);
        }
        assert!(StatTarget::from_u8(10).is_none());
        assert!(StatTarget::try_from_id(-1).is_err());
        assert!(StatTarget::try_from_id(300).is_err());
    }

    #[test]
    fn test_proficiency_bonus_spreads() {
        let mut table = AttributeTable::default();
        table.add(StatTarget::Damage, 0.05);
        table.add(StatTarget::Proficiency, 0.01);

        assert!((table.get(StatTarget::Damage) - 0.06).abs() < 1e-9);
        assert!((table.get(StatTarget::Range) - 0.01).abs() < 1e-9);
        assert_eq!(table.get(StatTarget::Proficiency), 0.0);
    }

    #[test]
    fn test_random_combat_never_proficiency() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            assert!(StatTarget::random_combat(&mut rng).is_combat());
        }
    }
}
