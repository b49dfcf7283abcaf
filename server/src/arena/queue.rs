//! Matchmaking queue with delayed pairing and NPC escalation.

use std::time::Duration;

use tokio::time::Instant;

use arena_shared::Weapon;

#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub user: u64,
    pub trainer: u64,
    pub weapon: Weapon,
    /// May lie in the future for a trainer serving a re-queue penalty
    pub enqueued_at: Instant,
}

/// What one pump decided
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    Paired(QueueEntry, QueueEntry),
    /// Waited too long on deck; fights a generated opponent
    Escalated(QueueEntry),
    /// Eligible but unpaired; stays queued
    OnDeck(u64),
}

pub struct MatchmakingQueue {
    entries: Vec<QueueEntry>,
    queue_delay: Duration,
    npc_wait: Duration,
}

impl MatchmakingQueue {
    pub fn new(queue_delay: Duration, npc_wait: Duration) -> Self {
        Self {
            entries: Vec::new(),
            queue_delay,
            npc_wait,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, trainer: u64) -> bool {
        self.entries.iter().any(|e| e.trainer == trainer)
    }

    /// Adds an entry. A trainer already queued keeps its place and timestamp
    /// and only switches weapon. Returns true if the trainer was not queued.
    pub fn enqueue(&mut self, entry: QueueEntry) -> bool {
        match self.entries.iter_mut().find(|e| e.trainer == entry.trainer) {
            Some(existing) => {
                existing.weapon = entry.weapon;
                false
            }
            None => {
                self.entries.push(entry);
                true
            }
        }
    }

    pub fn dequeue(&mut self, trainer: u64) -> Option<QueueEntry> {
        let index = self.entries.iter().position(|e| e.trainer == trainer)?;
        Some(self.entries.remove(index))
    }

    fn waited(&self, entry: &QueueEntry, now: Instant) -> Duration {
        now.saturating_duration_since(entry.enqueued_at)
    }

    /// Pairs eligible entries in queue order.
    ///
    /// Entries that have waited at least the queue delay are eligible and
    /// are paired two at a time. A leftover eligible entry that has waited
    /// past the delay plus the NPC window is escalated; otherwise it stays
    /// on deck.
    pub fn pump(&mut self, now: Instant) -> Vec<QueueEvent> {
        let eligible: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| self.waited(e, now) >= self.queue_delay)
            .map(|(i, _)| i)
            .collect();

        let mut events = Vec::new();
        let mut taken = vec![false; self.entries.len()];
        for chunk in eligible.chunks(2) {
            match *chunk {
                [first, second] => {
                    taken[first] = true;
                    taken[second] = true;
                    events.push(QueueEvent::Paired(
                        self.entries[first].clone(),
                        self.entries[second].clone(),
                    ));
                }
                [single] => {
                    let entry = &self.entries[single];
                    if self.waited(entry, now) > self.queue_delay + self.npc_wait {
                        taken[single] = true;
                        events.push(QueueEvent::Escalated(entry.clone()));
                    } else {
                        events.push(QueueEvent::OnDeck(entry.trainer));
                    }
                }
                _ => {}
            }
        }

        let mut index = 0;
        self.entries.retain(|_| {
            let keep = !taken[index];
            index += 1;
            keep
        });
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_secs(30);

    fn queue() -> MatchmakingQueue {
        MatchmakingQueue::new(DELAY, Duration::from_secs(30))
    }

    fn entry(trainer: u64, at: Instant) -> QueueEntry {
        QueueEntry { user: trainer * 10, trainer, weapon: Weapon::Pistol, enqueued_at: at }
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_nothing_happens_before_delay() {
        let start = Instant::now();
        let mut q = queue();
        q.enqueue(entry(1, start));
        q.enqueue(entry(2, start));

        assert!(q.pump(start + secs(29)).is_empty());
        assert_eq!(q.len(), 2);

        let events = q.pump(start + secs(30));
        assert_eq!(events, vec![QueueEvent::Paired(entry(1, start), entry(2, start))]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_lone_entry_escalates_only_after_window() {
        let start = Instant::now();
        let mut q = queue();
        q.enqueue(entry(1, start));

        for t in [30, 45, 60] {
            assert_eq!(q.pump(start + secs(t)), vec![QueueEvent::OnDeck(1)]);
            assert!(q.contains(1));
        }

        let events = q.pump(start + secs(61));
        assert_eq!(events, vec![QueueEvent::Escalated(entry(1, start))]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_pairs_in_insertion_order() {
        let start = Instant::now();
        let mut q = queue();
        for trainer in 1..=5 {
            q.enqueue(entry(trainer, start));
        }
        q.enqueue(entry(6, start + secs(20)));

        let events = q.pump(start + secs(35));
        assert_eq!(
            events,
            vec![
                QueueEvent::Paired(entry(1, start), entry(2, start)),
                QueueEvent::Paired(entry(3, start), entry(4, start)),
                QueueEvent::OnDeck(5),
            ]
        );
        assert!(q.contains(5));
        assert!(q.contains(6));

        // 6 becomes eligible and pairs with 5, which kept its place
        let events = q.pump(start + secs(50));
        assert_eq!(events, vec![QueueEvent::Paired(entry(5, start), entry(6, start + secs(20)))]);
    }

    #[test]
    fn test_future_timestamp_waits_out_penalty() {
        let start = Instant::now();
        let mut q = queue();
        q.enqueue(entry(1, start + secs(30)));

        assert!(q.pump(start + secs(59)).is_empty());
        assert_eq!(q.pump(start + secs(60)), vec![QueueEvent::OnDeck(1)]);
    }

    #[test]
    fn test_reenqueue_keeps_place() {
        let start = Instant::now();
        let mut q = queue();
        assert!(q.enqueue(entry(1, start)));
        assert!(q.enqueue(entry(2, start)));

        let mut again = entry(1, start + secs(10));
        again.weapon = Weapon::Catapulter;
        assert!(!q.enqueue(again));

        match q.pump(start + secs(30)).as_slice() {
            [QueueEvent::Paired(first, second)] => {
                assert_eq!(first.trainer, 1);
                assert_eq!(first.weapon, Weapon::Catapulter);
                assert_eq!(first.enqueued_at, start);
                assert_eq!(second.trainer, 2);
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_dequeue_is_idempotent() {
        let start = Instant::now();
        let mut q = queue();
        q.enqueue(entry(1, start));

        assert!(q.dequeue(1).is_some());
        assert!(q.dequeue(1).is_none());
        assert!(q.pump(start + secs(90)).is_empty());
    }
}
