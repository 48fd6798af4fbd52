use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to spawn worker thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker {name} has shut down")]
    ShutDown { name: String },

    #[error("microtask budget exceeded: more than {budget} tasks in one drain")]
    MicrotaskBudgetExceeded { budget: usize },

    #[error("timer budget exceeded: more than {budget} timers in one run")]
    TimerBudgetExceeded { budget: usize },

    #[error("invalid log filter {filter:?}: {message}")]
    InvalidLogFilter { filter: String, message: String },

    #[error("logging already initialized: {message}")]
    LoggingInit { message: String },
}

impl RuntimeError {
    /// Whether the error came from a runaway loop rather than setup.
    #[must_use]
    pub fn is_budget_exceeded(&self) -> bool {
        matches!(
            self,
            Self::MicrotaskBudgetExceeded { .. } | Self::TimerBudgetExceeded { .. }
        )
    }
}
