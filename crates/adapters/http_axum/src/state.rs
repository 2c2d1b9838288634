//! Shared application state for axum handlers.

use std::sync::Arc;

use kadernim_app::ports::{EventPublisher, ExecutionLogRepository, RuleRepository};

/// Application state shared across all axum handlers.
///
/// Generic over the event publisher and the two read-side repositories to
/// avoid dynamic dispatch. `Clone` is implemented manually so the
/// underlying types do not need to be `Clone`.
pub struct AppState<P, L, R> {
    /// Where accepted events go.
    pub publisher: Arc<P>,
    pub execution_logs: Arc<L>,
    pub rules: Arc<R>,
}

impl<P, L, R> Clone for AppState<P, L, R> {
    fn clone(&self) -> Self {
        Self {
            publisher: Arc::clone(&self.publisher),
            execution_logs: Arc::clone(&self.execution_logs),
            rules: Arc::clone(&self.rules),
        }
    }
}

impl<P, L, R> AppState<P, L, R>
where
    P: EventPublisher + 'static,
    L: ExecutionLogRepository + 'static,
    R: RuleRepository + 'static,
{
    pub fn new(publisher: P, execution_logs: L, rules: R) -> Self {
        Self {
            publisher: Arc::new(publisher),
            execution_logs: Arc::new(execution_logs),
            rules: Arc::new(rules),
        }
    }
}
