//! Service state definitions.

/// Service lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Service is wiring its components.
    Starting,
    /// Service is running cycles and answering lookups.
    Running,
    /// Shutdown requested; the current cycle may still finish.
    ShuttingDown,
    /// Service is stopped.
    Stopped,
}

impl ServiceState {
    /// Check if the service is operational.
    pub fn is_operational(&self) -> bool {
        matches!(self, ServiceState::Running)
    }

    /// Check if new ingestion cycles may start.
    pub fn accepts_cycles(&self) -> bool {
        matches!(self, ServiceState::Starting | ServiceState::Running)
    }

    /// Check if the service is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceState::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(ServiceState::Running.is_operational());
        assert!(ServiceState::Starting.accepts_cycles());
        assert!(!ServiceState::ShuttingDown.accepts_cycles());
        assert!(ServiceState::Stopped.is_terminal());
    }
}
