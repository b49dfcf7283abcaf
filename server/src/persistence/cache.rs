//! Redis cache for the latest battle summary of each trainer.

use redis::{AsyncCommands, aio::ConnectionManager};
use log::warn;

use arena_shared::BattleSummary;

/// Cache key prefix
const BATTLE_SUMMARY_PREFIX: &str = "arena:last_battle:";

/// TTL for cached summaries (1 day)
const CACHE_TTL_SECONDS: u64 = 86_400;

fn summary_key(trainer: u64) -> String {
    format!("{}{}", BATTLE_SUMMARY_PREFIX, trainer)
}

/// Redis cache wrapper
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
}

impl Cache {
    /// Connect to Redis
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Save a trainer's latest battle summary
    pub async fn save_summary(&self, summary: &BattleSummary) -> Result<(), redis::RedisError> {
        let json = match serde_json::to_string(summary) {
            Ok(json) => json,
            Err(e) => {
                warn!("Could not encode battle summary {}: {}", summary.battle_id, e);
                return Ok(());
            }
        };

        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(summary_key(summary.trainer_id), json, CACHE_TTL_SECONDS).await?;

        Ok(())
    }

    /// Load a trainer's latest battle summary
    pub async fn load_summary(&self, trainer: u64) -> Result<Option<BattleSummary>, redis::RedisError> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn.get(summary_key(trainer)).await?;

        Ok(json.and_then(|j| serde_json::from_str(&j).ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_shared::{CombatStats, Weapon};

    #[test]
    fn test_summary_key() {
        assert_eq!(summary_key(42), "arena:last_battle:42");
    }

    #[test]
    fn test_summary_survives_json() {
        let summary = BattleSummary {
            battle_id: 3,
            trainer_id: 42,
            weapon: Weapon::Lancer,
            opponent_id: None,
            opponent_weapon: Weapon::Pistol,
            won: true,
            stats: CombatStats { battles: 1, wins: 1, damage_dealt: 812.5, ..Default::default() },
        };
        let json = serde_json::to_string(&summary).unwrap();
        let back: BattleSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }
}
