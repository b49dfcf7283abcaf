//! Single fair token guarding the arena state.
//!
//! Waiters on a tokio mutex are served in the order they arrived, so neither
//! the scheduler nor a request handler can be starved by the other.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

pub struct ConcurrencyGate<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for ConcurrencyGate<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> ConcurrencyGate<T> {
    pub fn new(value: T) -> Self {
        Self { inner: Arc::new(Mutex::new(value)) }
    }

    /// Waits for the token; it is released when the guard drops
    pub async fn acquire(&self) -> MutexGuard<'_, T> {
        self.inner.lock().await
    }

    /// Runs `f` while holding the token
    pub async fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.lock().await;
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_waiters_served_in_arrival_order() {
        let gate = ConcurrencyGate::new(Vec::new());
        let held = gate.acquire().await;

        let mut tasks = Vec::new();
        for i in 0..5 {
            let gate = gate.clone();
            tasks.push(tokio::spawn(async move {
                gate.with(|order| order.push(i)).await;
            }));
            // let the task queue up before the next one is spawned
            tokio::task::yield_now().await;
        }

        drop(held);
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(gate.with(|order| order.clone()).await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_mutation_visible_to_next_holder() {
        let gate = ConcurrencyGate::new(0u32);
        gate.with(|n| *n += 3).await;
        *gate.acquire().await += 1;
        assert_eq!(*gate.acquire().await, 4);
    }
}
