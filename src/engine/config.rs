// 11.0.1: engine tunables. kept small: everything else about the engine is
// deterministic by construction.

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How many times a unit of work is retried after a store serialization
    /// conflict before giving up.
    pub max_commit_retries: u32,
    /// Cap on the unconfirmed pool; admission fails past it.
    pub max_unconfirmed: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_commit_retries: 3,
            max_unconfirmed: 100_000,
        }
    }
}
