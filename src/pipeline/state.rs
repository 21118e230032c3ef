//! Pipeline state management

use std::time::Instant;

/// Video pipeline state machine
///
/// State transitions are validated so that a failed startup can never be
/// confused with a stream gap: the pipeline either reaches `Running` or the
/// start call reports a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Pipeline has been built but not started
    Idle,

    /// Pipeline is acquiring its socket and decoder
    Initializing,

    /// Pipeline is receiving and decoding
    Running {
        /// When the pipeline started running
        started_at: Instant,
    },

    /// Pipeline is tearing down
    Stopping,

    /// Pipeline has stopped and cannot be restarted
    Stopped,
}

impl PipelineState {
    /// Check if this state transition is valid
    pub fn can_transition_to(&self, target: &PipelineState) -> bool {
        use PipelineState::*;

        match (self, target) {
            (Idle, Initializing) => true,

            (Initializing, Running { .. }) => true,
            (Initializing, Stopping) => true, // aborted startup

            (Running { .. }, Stopping) => true,

            (Stopping, Stopped) => true,

            // no transitions out of Stopped
            (Stopped, _) => false,

            // self-transitions
            (a, b) if a == b => true,

            _ => false,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Idle",
            PipelineState::Initializing => "Initializing",
            PipelineState::Running { .. } => "Running",
            PipelineState::Stopping => "Stopping",
            PipelineState::Stopped => "Stopped",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, PipelineState::Running { .. })
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, PipelineState::Stopped | PipelineState::Stopping)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_path_is_valid() {
        let running = PipelineState::Running {
            started_at: Instant::now(),
        };

        assert!(PipelineState::Idle.can_transition_to(&PipelineState::Initializing));
        assert!(PipelineState::Initializing.can_transition_to(&running));
        assert!(running.can_transition_to(&PipelineState::Stopping));
        assert!(PipelineState::Stopping.can_transition_to(&PipelineState::Stopped));
    }

    #[test]
    fn aborted_startup_is_valid() {
        assert!(PipelineState::Initializing.can_transition_to(&PipelineState::Stopping));
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let running = PipelineState::Running {
            started_at: Instant::now(),
        };

        // must go through Initializing
        assert!(!PipelineState::Idle.can_transition_to(&running));
        assert!(!PipelineState::Idle.can_transition_to(&PipelineState::Stopped));
        // no restart after stop
        assert!(!PipelineState::Stopped.can_transition_to(&running));
        assert!(!PipelineState::Stopped.can_transition_to(&PipelineState::Idle));
    }

    #[test]
    fn state_checks() {
        let running = PipelineState::Running {
            started_at: Instant::now(),
        };
        assert!(running.is_running());
        assert!(!running.is_stopped());
        assert!(PipelineState::Stopped.is_stopped());
        assert!(PipelineState::Stopping.is_stopped());
        assert!(!PipelineState::Idle.is_running());
    }
}
