//! Record store consumed by the arena core.
//!
//! The in-memory roster is authoritative while the server runs. When a
//! persistence handle is attached, every durable change is forwarded to the
//! background task and written behind.

use std::collections::HashMap;

use log::{debug, info};

use arena_shared::{
    BattleSummary, CombatStats, EntityKind, ExpTrack, ExperienceRecord, GameError, Modifier, Result,
    StatTarget, MAX_EQUIPPED_MODIFIERS,
};

use crate::persistence::PersistenceHandle;

/// A trainer owned by a user
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerRecord {
    pub id: u64,
    pub owner: u64,
    pub name: String,
}

/// Everything loaded from the database at start-up
#[derive(Debug, Default)]
pub struct RosterSnapshot {
    pub trainers: Vec<TrainerRecord>,
    pub modifiers: Vec<Modifier>,
    pub experience: Vec<ExperienceRecord>,
    pub user_stats: Vec<(u64, CombatStats)>,
    pub trainer_stats: Vec<(u64, CombatStats)>,
}

/// Operations the arena needs from persistent storage
pub trait ArenaStore: Send {
    /// Fails unless `trainer` exists and belongs to `user`
    fn check_owner(&self, user: u64, trainer: u64) -> Result<()>;

    fn experience(&self, owner: u64) -> Vec<ExperienceRecord>;

    /// Marks up to three usable modifiers with distinct targets as used by `battle`
    fn equip_modifiers(&mut self, owner: u64, battle: u64) -> Vec<Modifier>;

    fn release_modifiers(&mut self, battle: u64);

    /// Spends one charge, destroying the modifier once it runs out.
    /// Returns the charges left.
    fn consume_charge(&mut self, modifier: u64) -> Result<u32>;

    fn grant_experience(&mut self, owner: u64, track: ExpTrack, target: StatTarget, amount: u32);

    /// Spends unspent experience on an existing record to raise its level
    fn advance_experience(
        &mut self,
        owner: u64,
        track: ExpTrack,
        target: StatTarget,
        levels: u32,
    ) -> Result<ExperienceRecord>;

    fn record_stats(&mut self, owner: u64, trainer: u64, stats: &CombatStats);

    fn record_summary(&mut self, summary: BattleSummary);

    fn last_summary(&self, trainer: u64) -> Option<BattleSummary>;
}

#[derive(Default)]
pub struct Roster {
    trainers: HashMap<u64, TrainerRecord>,
    /// Kept in owner record order
    modifiers: Vec<Modifier>,
    /// Modifier id to the battle using it
    equipped: HashMap<u64, u64>,
    experience: Vec<ExperienceRecord>,
    user_stats: HashMap<u64, CombatStats>,
    trainer_stats: HashMap<u64, CombatStats>,
    summaries: HashMap<u64, BattleSummary>,
    persistence: Option<PersistenceHandle>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: RosterSnapshot) -> Self {
        let mut roster = Self::new();
        for trainer in snapshot.trainers {
            roster.trainers.insert(trainer.id, trainer);
        }
        roster.modifiers = snapshot.modifiers;
        roster.experience = snapshot.experience;
        roster.user_stats = snapshot.user_stats.into_iter().collect();
        roster.trainer_stats = snapshot.trainer_stats.into_iter().collect();
        roster
    }

    /// Small fixed roster for running without a database
    pub fn demo() -> Self {
        let mut roster = Self::new();
        let targets = [StatTarget::Damage, StatTarget::Accuracy, StatTarget::Range, StatTarget::Proficiency];

        for user in 1..=4u64 {
            for slot in 0..2u64 {
                let id = user * 10 + slot;
                roster.add_trainer(TrainerRecord { id, owner: user, name: format!("Trainer {}", id) });
            }
            for (i, target) in targets.iter().enumerate() {
                let id = user * 100 + i as u64;
                let rarity = (user as u8 + i as u8) % 9 + 1;
                if let Ok(modifier) = Modifier::create(id, user, *target, rarity, 0) {
                    roster.add_modifier(modifier);
                }
            }
            let mut record = ExperienceRecord::new(user, ExpTrack::EitherHand, StatTarget::Aim);
            record.level = user as u32 * 3;
            roster.add_experience(record);
        }

        info!("Seeded demo roster with {} trainers", roster.trainers.len());
        roster
    }

    pub fn with_persistence(mut self, handle: PersistenceHandle) -> Self {
        self.persistence = Some(handle);
        self
    }

    pub fn add_trainer(&mut self, trainer: TrainerRecord) {
        self.trainers.insert(trainer.id, trainer);
    }

    pub fn add_modifier(&mut self, modifier: Modifier) {
        self.modifiers.push(modifier);
    }

    pub fn add_experience(&mut self, record: ExperienceRecord) {
        self.experience.push(record);
    }

    #[cfg(test)]
    pub fn modifier(&self, id: u64) -> Option<&Modifier> {
        self.modifiers.iter().find(|m| m.id == id)
    }

    #[cfg(test)]
    pub fn experience_record(&self, owner: u64, track: ExpTrack, target: StatTarget) -> Option<&ExperienceRecord> {
        self.experience.iter().find(|r| r.matches(owner, track, target))
    }

    #[cfg(test)]
    pub fn user_stats(&self, user: u64) -> Option<&CombatStats> {
        self.user_stats.get(&user)
    }

    #[cfg(test)]
    pub fn trainer_stats(&self, trainer: u64) -> Option<&CombatStats> {
        self.trainer_stats.get(&trainer)
    }

    #[cfg(test)]
    pub fn equipped_by(&self, battle: u64) -> usize {
        self.equipped.values().filter(|b| **b == battle).count()
    }
}

impl ArenaStore for Roster {
    fn check_owner(&self, user: u64, trainer: u64) -> Result<()> {
        let record = self
            .trainers
            .get(&trainer)
            .ok_or_else(|| GameError::not_found(EntityKind::Trainer, trainer))?;
        if record.owner != user {
            return Err(GameError::NotOwner { kind: EntityKind::Trainer, id: trainer, user });
        }
        Ok(())
    }

    fn experience(&self, owner: u64) -> Vec<ExperienceRecord> {
        self.experience.iter().filter(|r| r.owner == owner).cloned().collect()
    }

    fn equip_modifiers(&mut self, owner: u64, battle: u64) -> Vec<Modifier> {
        let mut chosen: Vec<Modifier> = Vec::with_capacity(MAX_EQUIPPED_MODIFIERS);
        for modifier in &self.modifiers {
            if chosen.len() == MAX_EQUIPPED_MODIFIERS {
                break;
            }
            let usable = modifier.owner == owner
                && !modifier.is_exhausted()
                && !self.equipped.contains_key(&modifier.id)
                && chosen.iter().all(|c| c.target != modifier.target);
            if usable {
                chosen.push(modifier.clone());
            }
        }

        for modifier in &chosen {
            self.equipped.insert(modifier.id, battle);
        }
        debug!("Battle {} equipped {} modifiers for user {}", battle, chosen.len(), owner);
        chosen
    }

    fn release_modifiers(&mut self, battle: u64) {
        self.equipped.retain(|_, b| *b != battle);
    }

    fn consume_charge(&mut self, id: u64) -> Result<u32> {
        let index = self
            .modifiers
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| GameError::not_found(EntityKind::Modifier, id))?;

        let remaining = self.modifiers[index].consume_charge();
        if remaining == 0 {
            let spent = self.modifiers.remove(index);
            self.equipped.remove(&id);
            info!("Modifier {} ({}) used up", id, spent.display_name());
            if let Some(persistence) = &self.persistence {
                persistence.delete_modifier(id);
            }
        } else if let Some(persistence) = &self.persistence {
            persistence.save_modifier(self.modifiers[index].clone());
        }
        Ok(remaining)
    }

    fn grant_experience(&mut self, owner: u64, track: ExpTrack, target: StatTarget, amount: u32) {
        let index = match self.experience.iter().position(|r| r.matches(owner, track, target)) {
            Some(index) => index,
            None => {
                self.experience.push(ExperienceRecord::new(owner, track, target));
                self.experience.len() - 1
            }
        };

        let record = &mut self.experience[index];
        record.grant(amount);
        if let Some(persistence) = &self.persistence {
            persistence.save_experience(record.clone());
        }
    }

    fn advance_experience(
        &mut self,
        owner: u64,
        track: ExpTrack,
        target: StatTarget,
        levels: u32,
    ) -> Result<ExperienceRecord> {
        let record = self
            .experience
            .iter_mut()
            .find(|r| r.matches(owner, track, target))
            .ok_or_else(|| GameError::not_found(EntityKind::Experience, owner))?;

        let spent = record.advance(levels)?;
        info!(
            "User {} advanced {} {} to level {} for {} exp",
            owner,
            track.name(),
            target.name(),
            record.level,
            spent
        );
        if let Some(persistence) = &self.persistence {
            persistence.save_experience(record.clone());
        }
        Ok(record.clone())
    }

    fn record_stats(&mut self, owner: u64, trainer: u64, stats: &CombatStats) {
        let user_total = self.user_stats.entry(owner).or_default();
        user_total.absorb(stats);
        let user_total = *user_total;

        let trainer_total = self.trainer_stats.entry(trainer).or_default();
        trainer_total.absorb(stats);
        let trainer_total = *trainer_total;

        if let Some(persistence) = &self.persistence {
            persistence.save_stats(owner, trainer, user_total, trainer_total);
        }
    }

    fn record_summary(&mut self, summary: BattleSummary) {
        if let Some(persistence) = &self.persistence {
            persistence.cache_summary(summary.clone());
        }
        self.summaries.insert(summary.trainer_id, summary);
    }

    fn last_summary(&self, trainer: u64) -> Option<BattleSummary> {
        self.summaries.get(&trainer).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_shared::ErrorKind;

    use crate::persistence::PersistenceCommand;

    fn roster() -> Roster {
        let mut roster = Roster::new();
        roster.add_trainer(TrainerRecord { id: 7, owner: 1, name: "Seven".into() });
        roster
    }

    fn modifier(id: u64, owner: u64, target: StatTarget, charges: u32) -> Modifier {
        Modifier::restore(id, owner, target, 3, charges, 0).unwrap()
    }

    #[test]
    fn test_check_owner() {
        let roster = roster();
        assert!(roster.check_owner(1, 7).is_ok());
        assert_eq!(roster.check_owner(2, 7).unwrap_err().kind(), ErrorKind::Ownership);
        assert_eq!(roster.check_owner(1, 8).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_equip_picks_distinct_usable_targets() {
        let mut roster = roster();
        roster.add_modifier(modifier(1, 1, StatTarget::Aim, 5));
        roster.add_modifier(modifier(2, 1, StatTarget::Aim, 5));
        roster.add_modifier(modifier(3, 1, StatTarget::Damage, 0));
        roster.add_modifier(modifier(4, 2, StatTarget::Range, 5));
        roster.add_modifier(modifier(5, 1, StatTarget::Range, 5));
        roster.add_modifier(modifier(6, 1, StatTarget::Mobility, 5));
        roster.add_modifier(modifier(7, 1, StatTarget::Shielding, 5));

        let ids: Vec<u64> = roster.equip_modifiers(1, 100).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 5, 6]);

        // a second battle only sees what the first left behind
        let ids: Vec<u64> = roster.equip_modifiers(1, 101).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 7]);

        roster.release_modifiers(100);
        assert_eq!(roster.equipped_by(100), 0);
        assert_eq!(roster.equipped_by(101), 2);
    }

    #[test]
    fn test_consume_charge_destroys_spent_modifier() {
        let mut roster = roster();
        roster.add_modifier(modifier(1, 1, StatTarget::Aim, 2));

        assert_eq!(roster.consume_charge(1).unwrap(), 1);
        assert_eq!(roster.consume_charge(1).unwrap(), 0);
        assert!(roster.modifier(1).is_none());
        assert!(roster.consume_charge(1).is_err());
    }

    #[test]
    fn test_grant_creates_then_accumulates() {
        let mut roster = roster();
        roster.grant_experience(1, ExpTrack::TwoHand, StatTarget::Damage, 2);
        roster.grant_experience(1, ExpTrack::TwoHand, StatTarget::Damage, 3);

        let record = roster.experience_record(1, ExpTrack::TwoHand, StatTarget::Damage).unwrap();
        assert_eq!(record.exp, 5);
        assert_eq!(roster.experience(1).len(), 1);
        assert!(roster.experience(2).is_empty());
    }

    #[test]
    fn test_advance_experience_persists_new_level() {
        let (handle, mut rx) = PersistenceHandle::channel(4);
        let mut roster = roster().with_persistence(handle);
        roster.grant_experience(1, ExpTrack::Pistol, StatTarget::Aim, 25);
        let _ = rx.try_recv();

        let record = roster.advance_experience(1, ExpTrack::Pistol, StatTarget::Aim, 2).unwrap();
        assert_eq!((record.level, record.exp), (2, 5));
        match rx.try_recv() {
            Ok(PersistenceCommand::SaveExperience { record: saved }) => assert_eq!(saved, record),
            other => panic!("expected a saved record, got {:?}", other),
        }

        // the raised level feeds the next battle's bonuses
        let table = arena_shared::bonuses_for(arena_shared::Weapon::Pistol, &roster.experience(1));
        assert!((table.get(StatTarget::Aim) - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_advance_experience_validates_first() {
        let mut roster = roster();
        let err = roster.advance_experience(1, ExpTrack::Pistol, StatTarget::Aim, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        roster.grant_experience(1, ExpTrack::Pistol, StatTarget::Aim, 9);
        let err = roster.advance_experience(1, ExpTrack::Pistol, StatTarget::Aim, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Insufficient);
        let record = roster.experience_record(1, ExpTrack::Pistol, StatTarget::Aim).unwrap();
        assert_eq!((record.level, record.exp), (0, 9));
    }

    #[test]
    fn test_stats_accumulate_per_user_and_trainer() {
        let mut roster = roster();
        let stats = CombatStats { battles: 1, wins: 1, shots_fired: 4, ..Default::default() };
        roster.record_stats(1, 7, &stats);
        roster.record_stats(1, 8, &stats);

        assert_eq!(roster.user_stats(1).unwrap().battles, 2);
        assert_eq!(roster.trainer_stats(7).unwrap().shots_fired, 4);
        assert_eq!(roster.trainer_stats(8).unwrap().wins, 1);
    }

    #[test]
    fn test_demo_roster_is_consistent() {
        let roster = Roster::demo();
        assert!(roster.check_owner(1, 10).is_ok());
        assert!(roster.check_owner(4, 41).is_ok());
        assert!(roster.check_owner(1, 41).is_err());
        assert!(!roster.experience(2).is_empty());
    }
}
