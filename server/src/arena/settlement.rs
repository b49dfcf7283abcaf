//! Post-battle rewards and bookkeeping for one side of a finished battle.

use log::{debug, warn};
use rand::Rng;

use arena_shared::{CombatStats, ExpTrack, Modifier, StatTarget, Weapon};

use crate::store::ArenaStore;

/// Proficiency experience for a win without a Proficiency modifier
const WIN_PROFICIENCY_EXP: u32 = 1;

/// What one trainer side brings to settlement
#[derive(Debug, Clone)]
pub struct SideOutcome {
    pub user: u64,
    pub trainer: u64,
    pub weapon: Weapon,
    pub modifiers: Vec<Modifier>,
    pub stats: CombatStats,
    pub won: bool,
}

/// Experience lands on the weapon's class track, and double on its own track
fn grant(store: &mut dyn ArenaStore, side: &SideOutcome, target: StatTarget, amount: u32) {
    if amount == 0 {
        return;
    }
    store.grant_experience(side.user, ExpTrack::general_for(side.weapon), target, amount);
    store.grant_experience(side.user, ExpTrack::specific_for(side.weapon), target, amount * 2);
}

/// Spends modifier charges, grants experience and records statistics
pub fn settle_side<R: Rng + ?Sized>(store: &mut dyn ArenaStore, side: &SideOutcome, rng: &mut R) {
    for modifier in &side.modifiers {
        if let Err(e) = store.consume_charge(modifier.id) {
            warn!("Could not spend a charge of modifier {}: {}", modifier.id, e);
            continue;
        }
        let exp = modifier.battle_exp(side.won, rng);
        grant(store, side, modifier.target, exp);
    }

    let has_proficiency = side.modifiers.iter().any(|m| m.target == StatTarget::Proficiency);
    if side.won && !has_proficiency {
        grant(store, side, StatTarget::Proficiency, WIN_PROFICIENCY_EXP);
    }

    store.record_stats(side.user, side.trainer, &side.stats);
    debug!(
        "Settled trainer {} ({}): {} modifiers, won={}",
        side.trainer,
        side.weapon.name(),
        side.modifiers.len(),
        side.won
    );
}
