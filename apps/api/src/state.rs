use std::sync::Arc;

use crate::config::Config;
use crate::critique::critic::Critic;
use crate::critique::registry::SessionRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub critic: Arc<Critic>,
    pub sessions: SessionRegistry,
    pub config: Config,
}
