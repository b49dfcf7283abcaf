//! Request handlers for the front-end protocol.
//!
//! Every handler validates before it mutates and runs while holding the
//! concurrency gate. Failures never leak details to the client; they are
//! logged here and answered with the generic failure response.

use log::{debug, warn};
use tokio::time::Instant;

use arena_shared::{BattleState, GameError, Request, Response};

use crate::context::ArenaContext;

/// Executes one request and builds its response
pub async fn handle_request(ctx: &ArenaContext, request: Request) -> Response {
    let user = request.user();
    let subject = match request.trainer() {
        Some(trainer) => format!("trainer {}", trainer),
        None => "own progression".to_string(),
    };
    let result = match request {
        Request::Enqueue { user, trainer, weapon } => handle_enqueue(ctx, user, trainer, weapon).await,
        Request::Dequeue { user, trainer } => handle_dequeue(ctx, user, trainer).await,
        Request::TimeRemaining { user, trainer } => handle_time_remaining(ctx, user, trainer).await,
        Request::Status { user, trainer } => handle_status(ctx, user, trainer).await,
        Request::AdvanceExperience { user, track, target, levels } => {
            handle_advance_experience(ctx, user, track, target, levels).await
        }
    };

    match result {
        Ok(response) => response,
        Err(e) => {
            if e.is_expected() {
                debug!("Request from user {} for {} refused: {}", user, subject, e);
            } else {
                warn!("Request from user {} for {} failed: {}", user, subject, e);
            }
            Response::failure()
        }
    }
}

async fn handle_enqueue(ctx: &ArenaContext, user: u64, trainer: u64, weapon: u8) -> Result<Response, GameError> {
    let now = Instant::now();
    ctx.gate.with(|arena| arena.enqueue(user, trainer, i64::from(weapon), now)).await?;
    Ok(Response::Queued)
}

async fn handle_dequeue(ctx: &ArenaContext, user: u64, trainer: u64) -> Result<Response, GameError> {
    ctx.gate.with(|arena| arena.dequeue(user, trainer)).await?;
    Ok(Response::Dequeued)
}

async fn handle_time_remaining(ctx: &ArenaContext, user: u64, trainer: u64) -> Result<Response, GameError> {
    let arena = ctx.gate.acquire().await;
    arena.check_owner(user, trainer)?;
    let ticks = arena.query_remaining_ticks(trainer)?;
    Ok(Response::TimeRemaining { ticks })
}

async fn handle_status(ctx: &ArenaContext, user: u64, trainer: u64) -> Result<Response, GameError> {
    let (state, ticks_remaining, last_battle) = {
        let arena = ctx.gate.acquire().await;
        arena.check_owner(user, trainer)?;
        let state = arena.status_of(trainer);
        let ticks = match state {
            BattleState::InBattle => arena.query_remaining_ticks(trainer).ok(),
            _ => None,
        };
        (state, ticks, arena.last_summary(trainer))
    };

    // summaries from before a restart only live in the cache
    let last_battle = match (last_battle, &ctx.persistence) {
        (Some(summary), _) => Some(summary),
        (None, Some(persistence)) => persistence.load_summary(trainer).await,
        (None, None) => None,
    };

    Ok(Response::Status { state, ticks_remaining, last_battle })
}

async fn handle_advance_experience(
    ctx: &ArenaContext,
    user: u64,
    track: u8,
    target: u8,
    levels: u32,
) -> Result<Response, GameError> {
    let record = ctx
        .gate
        .with(|arena| arena.advance_experience(user, i64::from(track), i64::from(target), levels))
        .await?;
    Ok(Response::ExperienceAdvanced { record })
}
