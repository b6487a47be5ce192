use crate::{services::tiering_service::TieringService, storage::ProviderInitFailure};
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: TieringService,
    /// Providers that could not be built at startup.
    pub provider_failures: Arc<Vec<ProviderInitFailure>>,
}

impl AppState {
    pub fn new(service: TieringService, provider_failures: Vec<ProviderInitFailure>) -> Self {
        Self {
            service,
            provider_failures: Arc::new(provider_failures),
        }
    }
}
