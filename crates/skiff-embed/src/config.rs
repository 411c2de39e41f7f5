//! Context configuration.

/// Tuning knobs for a [`ScriptContext`](crate::ScriptContext).
#[derive(Clone, Debug)]
pub struct ContextConfig {
    /// Handle-pool cells pre-warmed at context creation.
    pub initial_pool_capacity: usize,
    /// Upper bound on cells retained in the handle pool's free queue;
    /// `None` for unbounded. Cells beyond the cap are dropped on release
    /// and reallocated on demand.
    pub max_pool_capacity: Option<usize>,
    /// When true, interpret/call failures are raised as
    /// `InterpretFailure` errors carrying the diagnostic log, instead of
    /// only being returned as a result code.
    pub raise_on_failure: bool,
    /// Entries retained in the rolling diagnostic log.
    pub diagnostic_capacity: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            initial_pool_capacity: 16,
            max_pool_capacity: None,
            raise_on_failure: false,
            diagnostic_capacity: 256,
        }
    }
}

impl ContextConfig {
    /// Enable raising on interpret/call failure.
    pub fn raise_on_failure(mut self, raise: bool) -> Self {
        self.raise_on_failure = raise;
        self
    }

    /// Set the handle pool's pre-warm count.
    pub fn initial_pool_capacity(mut self, capacity: usize) -> Self {
        self.initial_pool_capacity = capacity;
        self
    }

    /// Cap the handle pool's retained free cells.
    pub fn max_pool_capacity(mut self, capacity: usize) -> Self {
        self.max_pool_capacity = Some(capacity);
        self
    }
}
