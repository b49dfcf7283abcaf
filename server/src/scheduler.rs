//! Background loop driving battles and matchmaking.

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

use crate::context::ArenaContext;

/// Runs one arena cycle per period until shutdown is signalled.
///
/// Deadlines advance by a fixed period from the previous deadline, so time
/// spent processing is absorbed instead of accumulating. A loop that falls
/// more than a period behind skips ahead rather than bursting.
pub async fn run(ctx: ArenaContext, mut shutdown: watch::Receiver<bool>) {
    let period = ctx.config.tick_period;
    let mut deadline = Instant::now() + period;
    let mut cycles: u64 = 0;

    info!("Scheduler started ({:?} period)", period);

    loop {
        tokio::select! {
            _ = sleep_until(deadline) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let started = Instant::now();
        {
            let mut arena = ctx.gate.acquire().await;
            arena.run_cycle(started);
            if cycles % 60 == 0 {
                debug!(
                    "Cycle {}: {} battles, {} queued",
                    cycles,
                    arena.active_battles(),
                    arena.queued()
                );
            }
        }
        cycles += 1;

        deadline += period;
        let now = Instant::now();
        if now >= deadline + period {
            warn!("Scheduler fell behind by {:?}; skipping ahead", now - deadline);
            deadline = now + period;
        }
    }

    info!("Scheduler stopped after {} cycles", cycles);
}
