//! Engine lifecycle states.

/// Engine operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Directory and schedule book are being loaded.
    Starting,
    /// Accepting commands and firing scheduled orders.
    Running,
    /// Draining; new commands are ignored.
    ShuttingDown,
    /// Everything flushed.
    Stopped,
}

impl EngineState {
    /// Check if the engine is accepting new commands.
    pub fn accepts_commands(&self) -> bool {
        matches!(self, EngineState::Running)
    }

    /// Check if the engine is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineState::Stopped)
    }
}
