use std::sync::Arc;

use tokio::sync::mpsc;

use crate::engine::{EngineCtx, Job};

use super::auth::NonceStore;

#[derive(Clone)]
pub struct AppState {
    pub ctx: EngineCtx,
    pub nonces: Arc<NonceStore>,
    pub triggers: mpsc::Sender<Job>,
}

impl AppState {
    pub fn new(ctx: EngineCtx, triggers: mpsc::Sender<Job>) -> Self {
        AppState {
            ctx,
            nonces: Arc::new(NonceStore::new()),
            triggers,
        }
    }
}
