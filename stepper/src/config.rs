use std::time::Duration;

use serde::Deserialize;

/// Tunables of the stepping executor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// World units covered by one step of a move block.
    pub move_unit: f64,

    /// How long an error message stays on screen, in seconds.
    pub error_display_secs: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            move_unit: 0.25,
            error_display_secs: 3.0,
        }
    }
}

impl ExecutorConfig {
    pub fn error_display(&self) -> Duration {
        Duration::try_from_secs_f64(self.error_display_secs).unwrap_or(Duration::ZERO)
    }
}
