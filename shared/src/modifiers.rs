//! Consumable modifiers that trainers equip for arena battles.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EnumKind, GameError};
use crate::stats::StatTarget;

/// Flat bonus an equipped modifier adds to its target
pub const MODIFIER_BONUS: f64 = 0.02;

/// Modifiers a trainer can carry into one battle
pub const MAX_EQUIPPED_MODIFIERS: usize = 3;

pub const MIN_RARITY: u8 = 1;
pub const MAX_RARITY: u8 = 9;
pub const MAX_POTENCY: u8 = 12;

/// Battles a modifier of each rarity survives before the potency multiplier
const SURVIVAL: [f64; 9] = [10.0, 25.0, 40.0, 60.0, 100.0, 200.0, 500.0, 1000.0, 10000.0];

const POTENCY_MULTIPLIERS: [f64; 13] = [
    1.0, 1.1, 1.3, 1.5, 1.7, 2.0, 2.5, 3.3, 4.2, 5.4, 6.8, 8.3, 10.0,
];

const RARITY_PREFIXES: [&str; 9] = [
    "Slave's ", "Weak ", "Minion's ", "Standard ", "Trainer's ",
    "Powerful ", "User's ", "Glorious ", "Master's ",
];

const POTENCY_PREFIXES: [&str; 13] = [
    "", "Renovated ", "Hardened ", "Improved ", "Enhanced ", "Augmented ",
    "Refined ", "Upgraded ", "Advanced ", "Fine-Tuned ", "Sturdy ",
    "Perfected ", "Neverending ",
];

/// A modifier record owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub id: u64,
    pub owner: u64,
    pub target: StatTarget,
    /// Rarity tier 1-9
    pub rarity: u8,
    /// Battles left before the modifier is destroyed
    pub charges: u32,
    /// Initial potency tier 0-12
    pub potency: u8,
}

impl Modifier {
    /// Builds a fresh modifier with its charge count derived from rarity and potency
    pub fn create(id: u64, owner: u64, target: StatTarget, rarity: u8, potency: u8) -> Result<Self, GameError> {
        let charges = charges_for(rarity, potency)?;
        Ok(Self { id, owner, target, rarity, charges, potency })
    }

    /// Rebuilds a stored modifier, validating its tiers
    pub fn restore(
        id: u64,
        owner: u64,
        target: StatTarget,
        rarity: u8,
        charges: u32,
        potency: u8,
    ) -> Result<Self, GameError> {
        survival(rarity)?;
        potency_multiplier(potency)?;
        Ok(Self { id, owner, target, rarity, charges, potency })
    }

    pub fn is_exhausted(&self) -> bool {
        self.charges == 0
    }

    /// Uses up one battle, never going below zero
    pub fn consume_charge(&mut self) -> u32 {
        self.charges = self.charges.saturating_sub(1);
        self.charges
    }

    pub fn display_name(&self) -> String {
        let mut name = String::new();
        if self.target.is_combat() {
            name.push_str(RARITY_PREFIXES[(self.rarity - MIN_RARITY) as usize]);
        }
        name.push_str(POTENCY_PREFIXES[self.potency as usize]);
        name.push_str("Mod of ");
        name.push_str(self.target.name());
        name
    }

    /// Experience this modifier earns its owner for one battle
    pub fn battle_exp<R: Rng + ?Sized>(&self, won: bool, rng: &mut R) -> u32 {
        if self.target == StatTarget::Proficiency {
            return 2;
        }

        let coin = |rng: &mut R| rng.gen_bool(0.5);
        match self.rarity {
            1..=3 => u32::from(won),
            4 => {
                if won || coin(rng) { 1 } else { 0 }
            }
            5 => 1,
            6 => {
                if won && coin(rng) { 2 } else { 1 }
            }
            7 => if won { 2 } else { 1 },
            8 => {
                if won || coin(rng) { 2 } else { 1 }
            }
            9 => 2,
            _ => 0,
        }
    }
}

fn survival(rarity: u8) -> Result<f64, GameError> {
    rarity
        .checked_sub(MIN_RARITY)
        .and_then(|i| SURVIVAL.get(i as usize).copied())
        .ok_or_else(|| GameError::invalid(EnumKind::Rarity, rarity))
}

pub fn potency_multiplier(potency: u8) -> Result<f64, GameError> {
    POTENCY_MULTIPLIERS
        .get(potency as usize)
        .copied()
        .ok_or_else(|| GameError::invalid(EnumKind::Potency, potency))
}

/// Battle charges a new modifier starts with
pub fn charges_for(rarity: u8, potency: u8) -> Result<u32, GameError> {
    let charges = survival(rarity)? * potency_multiplier(potency)?;
    Ok(charges.round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_charges_from_tiers() {
        assert_eq!(charges_for(1, 0).unwrap(), 10);
        assert_eq!(charges_for(4, 2).unwrap(), 78);
        assert_eq!(charges_for(9, 12).unwrap(), 100_000);
    }

    #[test]
    fn test_invalid_tiers_rejected() {
        assert!(charges_for(0, 0).is_err());
        assert!(charges_for(10, 0).is_err());
        assert!(charges_for(5, 13).is_err());
        assert!(Modifier::restore(1, 1, StatTarget::Aim, 11, 5, 0).is_err());
    }

    #[test]
    fn test_display_name() {
        let m = Modifier::create(1, 1, StatTarget::Damage, 2, 3).unwrap();
        assert_eq!(m.display_name(), "Weak Improved Mod of Damage");

        let p = Modifier::create(2, 1, StatTarget::Proficiency, 9, 0).unwrap();
        assert_eq!(p.display_name(), "Mod of Proficiency");
    }

    #[test]
    fn test_consume_charge_floors_at_zero() {
        let mut m = Modifier::restore(1, 1, StatTarget::Aim, 1, 1, 0).unwrap();
        assert_eq!(m.consume_charge(), 0);
        assert!(m.is_exhausted());
        assert_eq!(m.consume_charge(), 0);
    }

    #[test]
    fn test_battle_exp_by_rarity() {
        let mut rng = StdRng::seed_from_u64(3);
        let modifier = |rarity| Modifier::create(1, 1, StatTarget::Range, rarity, 0).unwrap();

        assert_eq!(modifier(2).battle_exp(true, &mut rng), 1);
        assert_eq!(modifier(2).battle_exp(false, &mut rng), 0);
        assert_eq!(modifier(5).battle_exp(false, &mut rng), 1);
        assert_eq!(modifier(7).battle_exp(false, &mut rng), 1);
        assert_eq!(modifier(9).battle_exp(false, &mut rng), 2);

        for _ in 0..50 {
            let exp = modifier(6).battle_exp(true, &mut rng);
            assert!(exp == 1 || exp == 2);
            assert!(modifier(4).battle_exp(false, &mut rng) <= 1);
        }

        let prof = Modifier::create(1, 1, StatTarget::Proficiency, 9, 0).unwrap();
        assert_eq!(prof.battle_exp(false, &mut rng), 2);
    }
}
