//! Fixed-length battle between two combatants.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use arena_shared::{CombatStats, StatTarget, BATTLE_TICKS};

use super::combatant::{resolve_shot, Action, Combatant};

pub struct Battle {
    id: u64,
    sides: [Combatant; 2],
    distance: f64,
    ticks_remaining: u32,
    winner: Option<usize>,
    rng: StdRng,
}

impl Battle {
    pub fn new(id: u64, first: Combatant, second: Combatant) -> Self {
        Self::with_rng(id, first, second, StdRng::from_entropy())
    }

    /// Battle driven by a caller-supplied generator, for reproducible fights
    pub fn with_rng(id: u64, first: Combatant, second: Combatant, rng: StdRng) -> Self {
        let reach = first
            .attribute(StatTarget::Range)
            .max(second.attribute(StatTarget::Range));
        Self {
            id,
            sides: [first, second],
            distance: reach + 1.0,
            ticks_remaining: BATTLE_TICKS,
            winner: None,
            rng,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn ticks_remaining(&self) -> u32 {
        self.ticks_remaining
    }

    pub fn is_finished(&self) -> bool {
        self.ticks_remaining == 0
    }

    /// Winning side index, set once the last tick has run
    pub fn winner(&self) -> Option<usize> {
        self.winner
    }

    pub fn side(&self, index: usize) -> &Combatant {
        &self.sides[index]
    }

    pub fn sides(&self) -> &[Combatant; 2] {
        &self.sides
    }

    /// Side index fought by a trainer, if it is in this battle
    pub fn side_of(&self, trainer: u64) -> Option<usize> {
        self.sides
            .iter()
            .position(|c| c.participant().trainer_id() == Some(trainer))
    }

    /// Statistics for one side, including the battle and win counts
    pub fn side_stats(&self, index: usize) -> CombatStats {
        let mut stats = *self.sides[index].stats();
        stats.battles = 1;
        stats.wins = u32::from(self.winner == Some(index));
        stats
    }

    /// Advances one tick. Returns false once the battle is over.
    pub fn tick(&mut self) -> bool {
        if self.ticks_remaining == 0 {
            return false;
        }
        self.ticks_remaining -= 1;

        // Both sides decide from the same snapshot
        let first = self.sides[0].choose_next_action(&self.sides[1], self.distance);
        let second = self.sides[1].choose_next_action(&self.sides[0], self.distance);
        self.sides[0].set_action(first);
        self.sides[1].set_action(second);
        debug!(
            "battle {} tick {}: {:?} vs {:?} at {:.2}",
            self.id, self.ticks_remaining, first, second, self.distance
        );

        self.apply(0, first);
        self.apply(1, second);

        if self.ticks_remaining == 0 {
            let winner = if self.sides[0].total_damage() > self.sides[1].total_damage() { 1 } else { 0 };
            self.winner = Some(winner);
            info!(
                "Battle {} finished: side {} wins ({:.1} vs {:.1} damage taken)",
                self.id,
                winner,
                self.sides[0].total_damage(),
                self.sides[1].total_damage()
            );
        }
        true
    }

    /// Same as calling `tick` `n` times
    pub fn tick_n(&mut self, n: u32) {
        for _ in 0..n {
            if !self.tick() {
                break;
            }
        }
    }

    fn apply(&mut self, index: usize, action: Action) {
        let (left, right) = self.sides.split_at_mut(1);
        let (me, opponent) = if index == 0 {
            (&mut left[0], &mut right[0])
        } else {
            (&mut right[0], &mut left[0])
        };

        match action {
            Action::Cower => {}
            Action::RunAway => self.distance += me.step(),
            Action::Reload => me.reload(),
            Action::CloseDistance => self.distance = (self.distance - me.step()).max(0.0),
            Action::FireWeapon => {
                for _ in 0..me.fire() {
                    resolve_shot(me, opponent, &mut self.rng);
                }
            }
        }
    }
}
