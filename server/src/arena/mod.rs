//! Arena state: active battles, the matchmaking queue and trainer battle states.
//!
//! Everything here is mutated only while holding the concurrency gate.

mod battle;
mod bonuses;
mod combatant;
mod queue;
mod settlement;

pub use battle::Battle;
pub use combatant::{Combatant, Participant};
pub use queue::{MatchmakingQueue, QueueEntry, QueueEvent};

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::Instant;

use arena_shared::{
    BattleState, BattleSummary, EntityKind, ExpTrack, ExperienceRecord, GameError, Result, StatTarget, Weapon,
};

use crate::config::ArenaConfig;
use crate::store::ArenaStore;
use settlement::{settle_side, SideOutcome};

/// Timing rules the arena runs with
#[derive(Debug, Clone, Copy)]
pub struct ArenaRules {
    pub queue_delay: Duration,
    pub npc_wait: Duration,
    pub loser_penalty: Duration,
    pub requeue_after_battle: bool,
}

impl From<&ArenaConfig> for ArenaRules {
    fn from(config: &ArenaConfig) -> Self {
        Self {
            queue_delay: config.queue_delay,
            npc_wait: config.npc_wait,
            loser_penalty: config.loser_penalty,
            requeue_after_battle: config.requeue_after_battle,
        }
    }
}

pub struct ArenaState {
    battles: Vec<Battle>,
    queue: MatchmakingQueue,
    statuses: HashMap<u64, BattleState>,
    store: Box<dyn ArenaStore>,
    rules: ArenaRules,
    rng: StdRng,
    next_battle_id: u64,
}

impl ArenaState {
    pub fn new(store: Box<dyn ArenaStore>, rules: ArenaRules) -> Self {
        Self::with_rng(store, rules, StdRng::from_entropy())
    }

    pub fn with_rng(store: Box<dyn ArenaStore>, rules: ArenaRules, rng: StdRng) -> Self {
        Self {
            battles: Vec::new(),
            queue: MatchmakingQueue::new(rules.queue_delay, rules.npc_wait),
            statuses: HashMap::new(),
            store,
            rules,
            rng,
            next_battle_id: 1,
        }
    }

    pub fn active_battles(&self) -> usize {
        self.battles.len()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn status_of(&self, trainer: u64) -> BattleState {
        self.statuses.get(&trainer).copied().unwrap_or_default()
    }

    fn set_status(&mut self, trainer: u64, state: BattleState) {
        if state == BattleState::NoBattle {
            self.statuses.remove(&trainer);
        } else {
            self.statuses.insert(trainer, state);
        }
    }

    pub fn check_owner(&self, user: u64, trainer: u64) -> Result<()> {
        self.store.check_owner(user, trainer)
    }

    pub fn last_summary(&self, trainer: u64) -> Option<BattleSummary> {
        self.store.last_summary(trainer)
    }

    // =========================================================================
    // Foreground operations
    // =========================================================================

    /// Puts a trainer in the queue after validating ownership and weapon.
    ///
    /// A trainer already in a battle is left alone; it re-enters the queue
    /// on its own when the battle settles.
    pub fn enqueue(&mut self, user: u64, trainer: u64, weapon: i64, now: Instant) -> Result<()> {
        self.store.check_owner(user, trainer)?;
        let weapon = Weapon::try_from_id(weapon)?;

        if self.status_of(trainer) == BattleState::InBattle {
            debug!("Trainer {} asked to queue while fighting", trainer);
            return Ok(());
        }

        let entry = QueueEntry { user, trainer, weapon, enqueued_at: now };
        if self.queue.enqueue(entry) {
            info!("Trainer {} queued with {}", trainer, weapon.name());
            self.set_status(trainer, BattleState::InQueue);
        }
        Ok(())
    }

    /// Takes a trainer out of the queue; returns whether anything was removed
    pub fn dequeue(&mut self, user: u64, trainer: u64) -> Result<bool> {
        self.store.check_owner(user, trainer)?;

        if !self.status_of(trainer).is_queued() {
            return Ok(false);
        }
        let removed = self.queue.dequeue(trainer).is_some();
        self.set_status(trainer, BattleState::NoBattle);
        if removed {
            info!("Trainer {} left the queue", trainer);
        }
        Ok(removed)
    }

    /// Ticks left in the battle a trainer is fighting
    pub fn query_remaining_ticks(&self, trainer: u64) -> Result<u32> {
        self.battles
            .iter()
            .find(|b| b.side_of(trainer).is_some())
            .map(|b| b.ticks_remaining())
            .ok_or_else(|| GameError::not_found(EntityKind::Battle, trainer))
    }

    /// Raises the level of one of the user's experience records
    pub fn advance_experience(&mut self, user: u64, track: i64, target: i64, levels: u32) -> Result<ExperienceRecord> {
        let track = ExpTrack::try_from_id(track)?;
        let target = StatTarget::try_from_id(target)?;
        self.store.advance_experience(user, track, target, levels)
    }

    // =========================================================================
    // Scheduler cycle
    // =========================================================================

    /// One scheduler cycle: battles advance before the queue is pumped
    pub fn run_cycle(&mut self, now: Instant) {
        self.advance_battles(now);
        self.pump(now);
    }

    /// Ticks every battle once and settles the ones that just finished
    pub fn advance_battles(&mut self, now: Instant) {
        for battle in &mut self.battles {
            battle.tick();
        }

        let (finished, active): (Vec<Battle>, Vec<Battle>) =
            std::mem::take(&mut self.battles).into_iter().partition(Battle::is_finished);
        self.battles = active;

        for battle in finished {
            self.finish_battle(battle, now);
        }
    }

    /// Applies one round of queue decisions
    pub fn pump(&mut self, now: Instant) {
        for event in self.queue.pump(now) {
            match event {
                QueueEvent::Paired(first, second) => {
                    self.begin_battle(first, second);
                }
                QueueEvent::Escalated(entry) => {
                    info!("Trainer {} waited too long; matching against an NPC", entry.trainer);
                    self.begin_npc_battle(entry);
                }
                QueueEvent::OnDeck(trainer) => {
                    self.set_status(trainer, BattleState::LookingForBattle);
                }
            }
        }
    }

    fn trainer_combatant(&mut self, entry: &QueueEntry, battle_id: u64) -> Combatant {
        let modifiers = self.store.equip_modifiers(entry.user, battle_id);
        let experience = self.store.experience(entry.user);
        let bonuses = bonuses::trainer_bonuses(entry.weapon, &modifiers, &experience);
        let participant = Participant::Trainer { user: entry.user, trainer: entry.trainer };
        Combatant::new(participant, entry.weapon, modifiers, &bonuses)
    }

    fn allocate_battle_id(&mut self) -> u64 {
        let id = self.next_battle_id;
        self.next_battle_id += 1;
        id
    }

    fn start(&mut self, battle: Battle) -> u64 {
        let id = battle.id();
        for combatant in battle.sides() {
            if let Some(trainer) = combatant.participant().trainer_id() {
                self.set_status(trainer, BattleState::InBattle);
            }
        }
        self.battles.push(battle);
        id
    }

    /// Starts a battle between two queued trainers
    pub fn begin_battle(&mut self, first: QueueEntry, second: QueueEntry) -> u64 {
        let id = self.allocate_battle_id();
        let a = self.trainer_combatant(&first, id);
        let b = self.trainer_combatant(&second, id);
        info!(
            "Battle {} started: trainer {} ({}) vs trainer {} ({})",
            id,
            first.trainer,
            first.weapon.name(),
            second.trainer,
            second.weapon.name()
        );
        self.start(Battle::new(id, a, b))
    }

    /// Starts a battle between a queued trainer and a generated opponent
    pub fn begin_npc_battle(&mut self, entry: QueueEntry) -> u64 {
        let id = self.allocate_battle_id();
        let trainer = self.trainer_combatant(&entry, id);

        let experience = self.store.experience(entry.user);
        let npc_weapon = Weapon::random(&mut self.rng);
        let npc_bonuses = bonuses::npc_bonuses(&experience, &mut self.rng);
        let npc = Combatant::new(Participant::Npc, npc_weapon, Vec::new(), &npc_bonuses);

        info!(
            "Battle {} started: trainer {} ({}) vs NPC ({})",
            id,
            entry.trainer,
            entry.weapon.name(),
            npc_weapon.name()
        );
        self.start(Battle::new(id, trainer, npc))
    }

    fn finish_battle(&mut self, battle: Battle, now: Instant) {
        let Some(winner) = battle.winner() else {
            warn!("Battle {} ended without a winner", battle.id());
            return;
        };

        for index in 0..2 {
            let me = battle.side(index);
            let opponent = battle.side(1 - index);
            let Participant::Trainer { user, trainer } = me.participant() else {
                continue;
            };

            let outcome = SideOutcome {
                user,
                trainer,
                weapon: me.weapon(),
                modifiers: me.modifiers().to_vec(),
                stats: battle.side_stats(index),
                won: index == winner,
            };
            settle_side(self.store.as_mut(), &outcome, &mut self.rng);

            self.store.record_summary(BattleSummary {
                battle_id: battle.id(),
                trainer_id: trainer,
                weapon: me.weapon(),
                opponent_id: opponent.participant().trainer_id(),
                opponent_weapon: opponent.weapon(),
                won: outcome.won,
                stats: outcome.stats,
            });

            self.set_status(trainer, BattleState::NoBattle);
            if self.rules.requeue_after_battle {
                let enqueued_at = if outcome.won { now } else { now + self.rules.loser_penalty };
                self.queue.enqueue(QueueEntry { user, trainer, weapon: me.weapon(), enqueued_at });
                self.set_status(trainer, BattleState::InQueue);
            }
        }

        self.store.release_modifiers(battle.id());
    }
}
