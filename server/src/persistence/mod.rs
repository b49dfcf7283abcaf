//! Persistence layer for the arena server.
//!
//! The scheduler never blocks on I/O: the roster hands durable changes to a
//! background task, which writes them to Postgres and Redis. Failed writes
//! are retried with exponential backoff and then dropped with an error log.
//! Redis is optional; without it summaries are simply not cached.

mod database;
mod cache;

pub use database::Database;
pub use cache::Cache;

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use log::{info, error, warn};

use arena_shared::{BattleSummary, CombatStats, ExperienceRecord, GameError, Modifier};

use crate::config::ArenaConfig;
use crate::store::RosterSnapshot;

/// Commands sent to the persistence background task
#[derive(Debug)]
pub enum PersistenceCommand {
    /// Store a modifier's remaining charges
    SaveModifier { modifier: Modifier },
    /// Remove a used-up modifier
    DeleteModifier { id: u64 },
    /// Store an experience record
    SaveExperience { record: ExperienceRecord },
    /// Store running statistics for a user and one of its trainers
    SaveStats {
        owner: u64,
        trainer: u64,
        user_stats: CombatStats,
        trainer_stats: CombatStats,
    },
    /// Cache the latest battle summary of a trainer
    CacheSummary { summary: BattleSummary },
    /// Read a cached battle summary (response sent via oneshot channel)
    LoadSummary {
        trainer: u64,
        response: oneshot::Sender<Option<BattleSummary>>,
    },
    /// Shutdown the persistence task
    Shutdown,
}

/// Handle for sending commands to the persistence task
#[derive(Clone)]
pub struct PersistenceHandle {
    sender: mpsc::Sender<PersistenceCommand>,
}

impl PersistenceHandle {
    /// Fire and forget; a full channel drops the write with a warning
    fn send(&self, command: PersistenceCommand) {
        if let Err(e) = self.sender.try_send(command) {
            warn!("Persistence queue rejected a write: {}", e);
        }
    }

    pub fn save_modifier(&self, modifier: Modifier) {
        self.send(PersistenceCommand::SaveModifier { modifier });
    }

    pub fn delete_modifier(&self, id: u64) {
        self.send(PersistenceCommand::DeleteModifier { id });
    }

    pub fn save_experience(&self, record: ExperienceRecord) {
        self.send(PersistenceCommand::SaveExperience { record });
    }

    pub fn save_stats(&self, owner: u64, trainer: u64, user_stats: CombatStats, trainer_stats: CombatStats) {
        self.send(PersistenceCommand::SaveStats { owner, trainer, user_stats, trainer_stats });
    }

    pub fn cache_summary(&self, summary: BattleSummary) {
        self.send(PersistenceCommand::CacheSummary { summary });
    }

    /// Latest cached battle summary (async - only used when memory has none)
    pub async fn load_summary(&self, trainer: u64) -> Option<BattleSummary> {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(PersistenceCommand::LoadSummary { trainer, response: tx }).await.is_err() {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Queues `Shutdown` behind pending writes and waits up to `grace` for
    /// the task to finish them. Returns false if the task had to be abandoned.
    pub async fn shutdown(&self, task: JoinHandle<()>, grace: Duration) -> bool {
        if self.sender.send(PersistenceCommand::Shutdown).await.is_err() {
            warn!("Persistence task already gone");
        }
        match tokio::time::timeout(grace, task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!("Persistence task failed: {}", e);
                false
            }
            Err(_) => {
                error!("Persistence task still busy after {:?}; pending writes are lost", grace);
                false
            }
        }
    }

    #[cfg(test)]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<PersistenceCommand>) {
        let (sender, rx) = mpsc::channel(capacity);
        (Self { sender }, rx)
    }
}

/// Retry policy for durable writes
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
}

/// Runs `op` until it succeeds or the attempts run out, doubling the delay each time
pub async fn with_retry<T, E, F, Fut>(label: &str, policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.attempts.max(1);
    let mut delay = policy.initial_backoff;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!("{} failed (attempt {}/{}): {}; retrying in {:?}", label, attempt, attempts, e, delay);
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Connect to Postgres and Redis, load the roster and spawn the background task.
///
/// Only Postgres is required. The returned task handle is what shutdown
/// waits on.
pub async fn init(config: &ArenaConfig) -> Result<(PersistenceHandle, JoinHandle<()>, RosterSnapshot), GameError> {
    // Connect to PostgreSQL
    let db = Database::connect(&config.database_url)
        .await
        .map_err(|e| GameError::Persistence(e.to_string()))?;
    info!("Connected to PostgreSQL");

    let snapshot = db
        .load_roster()
        .await
        .map_err(|e| GameError::Persistence(e.to_string()))?;
    info!(
        "Loaded {} trainers, {} modifiers, {} experience records",
        snapshot.trainers.len(),
        snapshot.modifiers.len(),
        snapshot.experience.len()
    );

    let cache = connect_cache(&config.redis_url).await;

    let (tx, rx) = mpsc::channel(1024);
    let policy = RetryPolicy {
        attempts: config.persist_attempts,
        initial_backoff: config.persist_backoff,
    };
    let task = tokio::spawn(persistence_task(db, cache, policy, rx));
    info!("Persistence background task started");

    Ok((PersistenceHandle { sender: tx }, task, snapshot))
}

/// Redis connection, or `None` when it is unreachable
async fn connect_cache(url: &str) -> Option<Cache> {
    match Cache::connect(url).await {
        Ok(cache) => {
            info!("Connected to Redis");
            Some(cache)
        }
        Err(e) => {
            warn!("Redis unavailable ({}); battle summaries will not be cached", e);
            None
        }
    }
}

async fn cache_summary(cache: Option<&Cache>, summary: &BattleSummary) {
    let Some(cache) = cache else { return };
    // best effort, never retried
    if let Err(e) = cache.save_summary(summary).await {
        warn!("Failed to cache battle summary for trainer {}: {}", summary.trainer_id, e);
    }
}

async fn cached_summary(cache: Option<&Cache>, trainer: u64) -> Option<BattleSummary> {
    let cache = cache?;
    match cache.load_summary(trainer).await {
        Ok(summary) => summary,
        Err(e) => {
            warn!("Failed to read battle summary for trainer {}: {}", trainer, e);
            None
        }
    }
}

/// Background task that handles all persistence operations
async fn persistence_task(
    db: Database,
    cache: Option<Cache>,
    policy: RetryPolicy,
    mut rx: mpsc::Receiver<PersistenceCommand>,
) {
    info!("Persistence task running");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            PersistenceCommand::SaveModifier { modifier } => {
                let result = with_retry("save modifier", policy, || db.save_modifier(&modifier)).await;
                if let Err(e) = result {
                    error!("Dropping update for modifier {}: {}", modifier.id, e);
                }
            }

            PersistenceCommand::DeleteModifier { id } => {
                if let Err(e) = with_retry("delete modifier", policy, || db.delete_modifier(id)).await {
                    error!("Dropping delete of modifier {}: {}", id, e);
                }
            }

            PersistenceCommand::SaveExperience { record } => {
                if let Err(e) = with_retry("save experience", policy, || db.save_experience(&record)).await {
                    error!(
                        "Dropping experience update for user {} ({}, {}): {}",
                        record.owner,
                        record.track.name(),
                        record.target.name(),
                        e
                    );
                }
            }

            PersistenceCommand::SaveStats { owner, trainer, user_stats, trainer_stats } => {
                let result = with_retry("save stats", policy, || {
                    db.save_stats(owner, trainer, &user_stats, &trainer_stats)
                })
                .await;
                if let Err(e) = result {
                    error!("Dropping stats for user {} / trainer {}: {}", owner, trainer, e);
                }
            }

            PersistenceCommand::CacheSummary { summary } => {
                cache_summary(cache.as_ref(), &summary).await;
            }

            PersistenceCommand::LoadSummary { trainer, response } => {
                let _ = response.send(cached_summary(cache.as_ref(), trainer).await);
            }

            PersistenceCommand::Shutdown => {
                info!("Persistence task shutting down");
                break;
            }
        }
    }

    info!("Persistence task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    use arena_shared::Weapon;

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy { attempts, initial_backoff: Duration::from_millis(250) }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_backs_off_until_success() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<u32, String> = with_retry("flaky", policy(4), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(format!("down {}", n))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 250ms then 500ms
        assert!(start.elapsed() >= Duration::from_millis(750));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<(), &str> = with_retry("broken", policy(4), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("still down") }
        })
        .await;

        assert_eq!(result, Err("still down"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_handle_forwards_writes() {
        let (handle, mut rx) = PersistenceHandle::channel(8);
        handle.delete_modifier(12);
        handle.save_stats(1, 2, CombatStats::default(), CombatStats::default());

        assert!(matches!(rx.recv().await, Some(PersistenceCommand::DeleteModifier { id: 12 })));
        assert!(matches!(
            rx.recv().await,
            Some(PersistenceCommand::SaveStats { owner: 1, trainer: 2, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_queued_writes() {
        let (handle, mut rx) = PersistenceHandle::channel(8);
        let written = Arc::new(AtomicU32::new(0));
        let counter = written.clone();
        let task = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                if matches!(command, PersistenceCommand::Shutdown) {
                    break;
                }
                // a slow database
                tokio::time::sleep(Duration::from_millis(400)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        handle.delete_modifier(3);
        handle.delete_modifier(4);
        handle.save_stats(1, 10, CombatStats::default(), CombatStats::default());

        assert!(handle.shutdown(task, Duration::from_secs(5)).await);
        assert_eq!(written.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_gives_up_after_grace() {
        let (handle, mut rx) = PersistenceHandle::channel(8);
        let task = tokio::spawn(async move {
            let _ = rx.recv().await;
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        handle.delete_modifier(5);

        let start = Instant::now();
        assert!(!handle.shutdown(task, Duration::from_secs(2)).await);
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_runs_without_cache() {
        assert!(connect_cache("not a redis url").await.is_none());

        let summary = BattleSummary {
            battle_id: 1,
            trainer_id: 10,
            weapon: Weapon::Pistol,
            opponent_id: Some(20),
            opponent_weapon: Weapon::Lancer,
            won: false,
            stats: CombatStats::default(),
        };
        cache_summary(None, &summary).await;
        assert_eq!(cached_summary(None, 10).await, None);
    }
}
