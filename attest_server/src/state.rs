use attest_core::Broker;

/// Shared application state
pub struct AppState {
    /// The broker every route dispatches into
    pub broker: Broker,
}

impl AppState {
    pub fn new(broker: Broker) -> Self {
        Self { broker }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Broker::default())
    }
}
