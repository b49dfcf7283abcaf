//! Services shared by the scheduler and the request handlers.

use std::sync::Arc;

use crate::arena::{ArenaRules, ArenaState};
use crate::config::ArenaConfig;
use crate::gate::ConcurrencyGate;
use crate::persistence::PersistenceHandle;
use crate::store::ArenaStore;

/// Built once at start-up and cloned into every task
#[derive(Clone)]
pub struct ArenaContext {
    pub gate: ConcurrencyGate<ArenaState>,
    pub config: Arc<ArenaConfig>,
    pub persistence: Option<PersistenceHandle>,
}

impl ArenaContext {
    pub fn new(config: ArenaConfig, store: Box<dyn ArenaStore>, persistence: Option<PersistenceHandle>) -> Self {
        let state = ArenaState::new(store, ArenaRules::from(&config));
        Self {
            gate: ConcurrencyGate::new(state),
            config: Arc::new(config),
            persistence,
        }
    }
}
