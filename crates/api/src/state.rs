//! Shared application state.

use std::sync::Arc;

use domain::OrderEngine;
use store::Store;

use crate::auth::AuthGate;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub engine: OrderEngine<S>,
    pub auth: Arc<dyn AuthGate>,
}

impl<S: Store> AppState<S> {
    /// Creates the state over `store`, resolving identities with `auth`.
    pub fn new(store: S, auth: Arc<dyn AuthGate>) -> Self {
        Self {
            engine: OrderEngine::new(store),
            auth,
        }
    }
}
