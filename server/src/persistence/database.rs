//! PostgreSQL database operations.

use sqlx::{PgPool, postgres::{PgPoolOptions, PgRow}, Row};
use log::warn;

use arena_shared::{CombatStats, ExpTrack, ExperienceRecord, Modifier, StatTarget};

use crate::store::{RosterSnapshot, TrainerRecord};

/// Tables holding running battle statistics, keyed by user and by trainer
const USER_STATS_TABLE: &str = "user_battle_stats";
const TRAINER_STATS_TABLE: &str = "trainer_battle_stats";

/// Database connection wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to the database
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;

        Ok(Self { pool })
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Load every record the arena keeps in memory
    pub async fn load_roster(&self) -> Result<RosterSnapshot, sqlx::Error> {
        let (trainers, modifiers, experience, user_stats, trainer_stats) = futures::try_join!(
            self.load_trainers(),
            self.load_modifiers(),
            self.load_experience(),
            self.load_stats(USER_STATS_TABLE, "user_id"),
            self.load_stats(TRAINER_STATS_TABLE, "trainer_id"),
        )?;

        Ok(RosterSnapshot { trainers, modifiers, experience, user_stats, trainer_stats })
    }

    async fn load_trainers(&self) -> Result<Vec<TrainerRecord>, sqlx::Error> {
        let rows = sqlx::query("SELECT id, owner_id, name FROM trainers ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|r| TrainerRecord {
            id: r.get::<i64, _>("id") as u64,
            owner: r.get::<i64, _>("owner_id") as u64,
            name: r.get("name"),
        }).collect())
    }

    /// Modifiers in record order, which is the order they get equipped in
    async fn load_modifiers(&self) -> Result<Vec<Modifier>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, owner_id, target, rarity, charges, potency FROM modifiers ORDER BY id"
        )
            .fetch_all(&self.pool)
            .await?;

        let mut modifiers = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.get::<i64, _>("id") as u64;
            let parsed = StatTarget::try_from_id(i64::from(row.get::<i16, _>("target"))).and_then(|target| {
                Modifier::restore(
                    id,
                    row.get::<i64, _>("owner_id") as u64,
                    target,
                    row.get::<i16, _>("rarity") as u8,
                    row.get::<i32, _>("charges").max(0) as u32,
                    row.get::<i16, _>("potency") as u8,
                )
            });
            match parsed {
                Ok(modifier) => modifiers.push(modifier),
                Err(e) => warn!("Skipping modifier {}: {}", id, e),
            }
        }
        Ok(modifiers)
    }

    async fn load_experience(&self) -> Result<Vec<ExperienceRecord>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT owner_id, track, target, level, exp, total_exp FROM user_experience"
        )
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let owner = row.get::<i64, _>("owner_id") as u64;
            let track = ExpTrack::try_from_id(i64::from(row.get::<i16, _>("track")));
            let target = StatTarget::try_from_id(i64::from(row.get::<i16, _>("target")));
            match (track, target) {
                (Ok(track), Ok(target)) => records.push(ExperienceRecord {
                    owner,
                    track,
                    target,
                    level: row.get::<i32, _>("level").max(0) as u32,
                    exp: row.get::<i32, _>("exp").max(0) as u32,
                    total_exp: row.get::<i64, _>("total_exp").max(0) as u64,
                }),
                (Err(e), _) | (_, Err(e)) => warn!("Skipping experience record of user {}: {}", owner, e),
            }
        }
        Ok(records)
    }

    async fn load_stats(&self, table: &str, key: &str) -> Result<Vec<(u64, CombatStats)>, sqlx::Error> {
        let sql = format!(
            "SELECT {key}, battles, wins, shots_fired, shots_hit, shots_evaded, criticals, reloads,
                    times_fled, damage_dealt, damage_taken, damage_reduced, distance_moved
             FROM {table}"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(|r| (r.get::<i64, _>(key) as u64, stats_from_row(r))).collect())
    }

    // =========================================================================
    // Settlement Writes
    // =========================================================================

    /// Store a modifier's remaining charges
    pub async fn save_modifier(&self, modifier: &Modifier) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO modifiers (id, owner_id, target, rarity, charges, potency)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO UPDATE SET charges = EXCLUDED.charges"
        )
            .bind(modifier.id as i64)
            .bind(modifier.owner as i64)
            .bind(i16::from(modifier.target.as_u8()))
            .bind(i16::from(modifier.rarity))
            .bind(modifier.charges as i32)
            .bind(i16::from(modifier.potency))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_modifier(&self, id: u64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM modifiers WHERE id = $1")
            .bind(id as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Upsert an experience record by its (owner, track, target) key
    pub async fn save_experience(&self, record: &ExperienceRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_experience (owner_id, track, target, level, exp, total_exp)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (owner_id, track, target)
             DO UPDATE SET level = EXCLUDED.level, exp = EXCLUDED.exp, total_exp = EXCLUDED.total_exp"
        )
            .bind(record.owner as i64)
            .bind(i16::from(record.track.as_u8()))
            .bind(i16::from(record.target.as_u8()))
            .bind(record.level as i32)
            .bind(record.exp as i32)
            .bind(record.total_exp as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Store running totals for a user and a trainer in one transaction
    pub async fn save_stats(
        &self,
        owner: u64,
        trainer: u64,
        user_stats: &CombatStats,
        trainer_stats: &CombatStats,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for (table, key, id, stats) in [
            (USER_STATS_TABLE, "user_id", owner, user_stats),
            (TRAINER_STATS_TABLE, "trainer_id", trainer, trainer_stats),
        ] {
            let sql = format!(
                "INSERT INTO {table} ({key}, battles, wins, shots_fired, shots_hit, shots_evaded,
                                      criticals, reloads, times_fled, damage_dealt, damage_taken,
                                      damage_reduced, distance_moved)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                 ON CONFLICT ({key}) DO UPDATE SET
                    battles = EXCLUDED.battles, wins = EXCLUDED.wins,
                    shots_fired = EXCLUDED.shots_fired, shots_hit = EXCLUDED.shots_hit,
                    shots_evaded = EXCLUDED.shots_evaded, criticals = EXCLUDED.criticals,
                    reloads = EXCLUDED.reloads, times_fled = EXCLUDED.times_fled,
                    damage_dealt = EXCLUDED.damage_dealt, damage_taken = EXCLUDED.damage_taken,
                    damage_reduced = EXCLUDED.damage_reduced, distance_moved = EXCLUDED.distance_moved"
            );
            sqlx::query(&sql)
                .bind(id as i64)
                .bind(stats.battles as i32)
                .bind(stats.wins as i32)
                .bind(stats.shots_fired as i32)
                .bind(stats.shots_hit as i32)
                .bind(stats.shots_evaded as i32)
                .bind(stats.criticals as i32)
                .bind(stats.reloads as i32)
                .bind(stats.times_fled as i32)
                .bind(stats.damage_dealt)
                .bind(stats.damage_taken)
                .bind(stats.damage_reduced)
                .bind(stats.distance_moved)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn stats_from_row(row: &PgRow) -> CombatStats {
    let count = |column: &str| row.get::<i32, _>(column).max(0) as u32;
    CombatStats {
        battles: count("battles"),
        wins: count("wins"),
        shots_fired: count("shots_fired"),
        shots_hit: count("shots_hit"),
        shots_evaded: count("shots_evaded"),
        criticals: count("criticals"),
        reloads: count("reloads"),
        times_fled: count("times_fled"),
        damage_dealt: row.get("damage_dealt"),
        damage_taken: row.get("damage_taken"),
        damage_reduced: row.get("damage_reduced"),
        distance_moved: row.get("distance_moved"),
    }
}
