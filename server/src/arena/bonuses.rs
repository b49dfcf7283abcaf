//! Bonus tables fed into a combatant's attribute computation.

use rand::Rng;

use arena_shared::{
    bonuses_for, AttributeTable, ExperienceRecord, Modifier, StatTarget, Weapon, MODIFIER_BONUS,
};

/// Experience records an NPC opponent draws its bonuses from
pub const NPC_RECORD_LIMIT: usize = 18;

/// Additive bonuses from equipped modifiers that still have charges
pub fn modifier_bonuses(modifiers: &[Modifier]) -> AttributeTable {
    let mut table = AttributeTable::default();
    for modifier in modifiers.iter().filter(|m| !m.is_exhausted()) {
        table.add(modifier.target, MODIFIER_BONUS);
    }
    table
}

/// Combined modifier and experience bonuses for a trainer's weapon
pub fn trainer_bonuses(weapon: Weapon, modifiers: &[Modifier], experience: &[ExperienceRecord]) -> AttributeTable {
    let mut table = bonuses_for(weapon, experience);
    for (target, bonus) in modifier_bonuses(modifiers).iter() {
        table.add(target, bonus);
    }
    table
}

/// Randomized bonuses for a generated opponent.
///
/// Each of the first records lends its level to a random combat stat,
/// scaled by a factor between 0.8 and 1.2.
pub fn npc_bonuses<R: Rng + ?Sized>(experience: &[ExperienceRecord], rng: &mut R) -> AttributeTable {
    let mut table = AttributeTable::default();
    for record in experience.iter().take(NPC_RECORD_LIMIT) {
        let target = StatTarget::random_combat(rng);
        let scale: f64 = rng.gen_range(0.8..1.2);
        table.add(target, record.bonus() * scale);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_shared::ExpTrack;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record(track: ExpTrack, target: StatTarget, level: u32) -> ExperienceRecord {
        let mut record = ExperienceRecord::new(1, track, target);
        record.level = level;
        record
    }

    #[test]
    fn test_exhausted_modifiers_add_nothing() {
        let live = Modifier::restore(1, 1, StatTarget::Aim, 3, 4, 0).unwrap();
        let spent = Modifier::restore(2, 1, StatTarget::Damage, 3, 0, 0).unwrap();
        let table = modifier_bonuses(&[live, spent]);

        assert!((table.get(StatTarget::Aim) - MODIFIER_BONUS).abs() < 1e-9);
        assert_eq!(table.get(StatTarget::Damage), 0.0);
    }

    #[test]
    fn test_proficiency_modifier_lifts_every_stat() {
        let prof = Modifier::restore(1, 1, StatTarget::Proficiency, 9, 10, 0).unwrap();
        let table = modifier_bonuses(&[prof]);
        for (_, value) in table.iter() {
            assert!((value - MODIFIER_BONUS).abs() < 1e-9);
        }
    }

    #[test]
    fn test_trainer_bonuses_combine_sources() {
        let modifier = Modifier::restore(1, 1, StatTarget::Range, 5, 3, 0).unwrap();
        let exp = [record(ExpTrack::Launcher, StatTarget::Range, 4)];
        let table = trainer_bonuses(Weapon::Launcher, &[modifier], &exp);
        assert!((table.get(StatTarget::Range) - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_npc_bonuses_are_bounded() {
        let mut rng = StdRng::seed_from_u64(11);
        let exp: Vec<_> = (0..30)
            .map(|_| record(ExpTrack::Pistol, StatTarget::Aim, 10))
            .collect();

        let table = npc_bonuses(&exp, &mut rng);
        let total: f64 = table.values().iter().sum();
        let limit = NPC_RECORD_LIMIT as f64 * 0.1;
        assert!(total >= limit * 0.8 - 1e-9);
        assert!(total <= limit * 1.2 + 1e-9);
    }
}
