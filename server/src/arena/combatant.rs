//! Battle-scoped state of one side of a fight.

use log::debug;
use rand::Rng;

use arena_shared::{
    attributes_for, AttributeTable, CombatStats, Modifier, StatTarget, Weapon, BROKEN_TICKS,
    RELOAD_TIME, RUNAWAY_DAMAGE,
};

// Keeps float noise in `AS * time` from dropping a whole shot
const SHOT_EPSILON: f64 = 1e-9;

/// Who fights behind a combatant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    Trainer { user: u64, trainer: u64 },
    Npc,
}

impl Participant {
    pub fn trainer_id(&self) -> Option<u64> {
        match self {
            Self::Trainer { trainer, .. } => Some(*trainer),
            Self::Npc => None,
        }
    }
}

/// Action a combatant takes on one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Cower,
    RunAway,
    Reload,
    CloseDistance,
    FireWeapon,
}

/// Result of one resolved shot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShotOutcome {
    Evaded,
    Hit { damage: f64, critical: bool },
}

#[derive(Debug, Clone)]
pub struct Combatant {
    participant: Participant,
    weapon: Weapon,
    modifiers: Vec<Modifier>,
    /// Fixed for the whole battle
    attributes: AttributeTable,

    total_damage: f64,
    time_to_reload: f64,
    reload_time_remaining: f64,
    leftover: f64,
    fled_count: u32,
    fleeing: bool,
    broken_ticks: u32,
    action: Option<Action>,
    stats: CombatStats,
}

impl Combatant {
    /// Builds a combatant whose attributes come from its weapon plus a bonus table
    pub fn new(participant: Participant, weapon: Weapon, modifiers: Vec<Modifier>, bonuses: &AttributeTable) -> Self {
        let attributes = attributes_for(weapon, bonuses);
        Self::with_attributes(participant, weapon, modifiers, attributes)
    }

    pub fn with_attributes(
        participant: Participant,
        weapon: Weapon,
        modifiers: Vec<Modifier>,
        attributes: AttributeTable,
    ) -> Self {
        Self {
            participant,
            weapon,
            modifiers,
            attributes,
            total_damage: 0.0,
            time_to_reload: attributes.get(StatTarget::ReloadRate),
            reload_time_remaining: 0.0,
            leftover: 0.0,
            fled_count: 0,
            fleeing: false,
            broken_ticks: 0,
            action: None,
            stats: CombatStats::default(),
        }
    }

    pub fn participant(&self) -> Participant {
        self.participant
    }

    pub fn weapon(&self) -> Weapon {
        self.weapon
    }

    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    pub fn attribute(&self, target: StatTarget) -> f64 {
        self.attributes.get(target)
    }

    pub fn attributes(&self) -> &AttributeTable {
        &self.attributes
    }

    pub fn total_damage(&self) -> f64 {
        self.total_damage
    }

    pub fn is_fleeing(&self) -> bool {
        self.fleeing
    }

    pub fn is_broken(&self) -> bool {
        self.broken_ticks > 0
    }

    pub fn fled_count(&self) -> u32 {
        self.fled_count
    }

    pub fn reload_time_remaining(&self) -> f64 {
        self.reload_time_remaining
    }

    pub fn action(&self) -> Option<Action> {
        self.action
    }

    pub fn stats(&self) -> &CombatStats {
        &self.stats
    }

    /// Decides this tick's action from a snapshot of both sides
    pub fn choose_next_action(&self, opponent: &Combatant, distance: f64) -> Action {
        if self.is_broken() {
            Action::Cower
        } else if self.fleeing && opponent.attribute(StatTarget::Range) >= distance {
            Action::RunAway
        } else if self.reload_time_remaining > 0.0 {
            Action::Reload
        } else if distance > self.attribute(StatTarget::Range) {
            Action::CloseDistance
        } else {
            Action::FireWeapon
        }
    }

    /// Locks in the action and refreshes the flee flag from it.
    ///
    /// Cowering spends one broken tick here, before any damage of the tick
    /// lands, so a fresh break always yields its full run of cowering.
    pub fn set_action(&mut self, action: Action) {
        self.action = Some(action);
        match action {
            Action::RunAway => self.fleeing = true,
            Action::Cower => self.broken_ticks = self.broken_ticks.saturating_sub(1),
            _ => self.fleeing = false,
        }
    }

    /// Shots produced this tick.
    ///
    /// Attack speed carries fractional time between ticks. Each firing tick
    /// also drains the magazine; once it runs dry the weapon starts reloading
    /// and that tick produces nothing.
    pub fn fire(&mut self) -> u32 {
        if self.reload_time_remaining > 0.0 {
            return 0;
        }

        self.time_to_reload -= 1.0;
        if self.time_to_reload < 0.0 {
            self.reload_time_remaining = RELOAD_TIME;
            return 0;
        }

        let speed = self.attribute(StatTarget::AttackSpeed);
        if speed <= 0.0 {
            return 0;
        }
        let time_to_shoot = 1.0 + self.leftover;
        let shots = (speed * time_to_shoot + SHOT_EPSILON).floor().max(0.0);
        self.leftover = (time_to_shoot - shots / speed).max(0.0);

        let shots = shots as u32;
        self.stats.shots_fired += shots;
        shots
    }

    /// One tick of reloading
    pub fn reload(&mut self) {
        self.reload_time_remaining -= 1.0;
        if self.reload_time_remaining <= 0.0 {
            self.reload_time_remaining = 0.0;
            self.time_to_reload += self.attribute(StatTarget::ReloadRate);
            self.stats.reloads += 1;
        }
    }

    /// Distance covered by one move
    pub fn step(&mut self) -> f64 {
        let step = self.attribute(StatTarget::Mobility).max(0.0);
        self.stats.distance_moved += step;
        step
    }

    /// Takes damage; crossing the next multiple of the runaway threshold breaks morale
    pub fn apply_damage(&mut self, amount: f64) {
        self.total_damage += amount;
        self.stats.damage_taken += amount;

        let threshold = f64::from(self.fled_count + 1) * RUNAWAY_DAMAGE;
        if self.total_damage > threshold {
            self.fled_count += 1;
            self.fleeing = true;
            self.broken_ticks = BROKEN_TICKS;
            self.stats.times_fled += 1;
            debug!("{:?} broke after {:.1} damage", self.participant, self.total_damage);
        }
    }
}

/// Resolves one shot from `attacker` at `defender`.
///
/// The shot misses when the accuracy roll fails or the defender's
/// flexibility roll succeeds. A hit is reduced by shielding and doubled
/// on a critical.
pub fn resolve_shot<R: Rng + ?Sized>(attacker: &mut Combatant, defender: &mut Combatant, rng: &mut R) -> ShotOutcome {
    let accuracy_roll: f64 = rng.gen();
    let evade_roll: f64 = rng.gen();
    if accuracy_roll > attacker.attribute(StatTarget::Accuracy)
        || evade_roll < defender.attribute(StatTarget::Flexibility)
    {
        defender.stats.shots_evaded += 1;
        return ShotOutcome::Evaded;
    }

    let raw = attacker.attribute(StatTarget::Damage).max(0.0);
    let shielding = defender.attribute(StatTarget::Shielding).clamp(0.0, 1.0);
    let mut damage = raw * (1.0 - shielding);
    defender.stats.damage_reduced += raw - damage;

    let critical = rng.gen::<f64>() < attacker.attribute(StatTarget::Aim);
    if critical {
        damage *= 2.0;
        attacker.stats.criticals += 1;
    }

    attacker.stats.shots_hit += 1;
    attacker.stats.damage_dealt += damage;
    defender.apply_damage(damage);

    ShotOutcome::Hit { damage, critical }
}
