use std::sync::Arc;

use crate::config::Config;
use crate::proposals::service::ProposalService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub proposals: ProposalService,
    pub config: Arc<Config>,
}
