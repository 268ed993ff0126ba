use rns_core::Phase;

use crate::error::{OrchestratorError, Result};

pub struct PhaseStateMachine;

impl PhaseStateMachine {
    pub fn validate_transition(label: &str, from: Phase, to: Phase) -> Result<()> {
        if Self::next_phase(from) == Some(to) {
            Ok(())
        } else {
            Err(OrchestratorError::phase_order(label, from, to))
        }
    }

    pub fn can_transition(from: Phase, to: Phase) -> bool {
        Self::next_phase(from) == Some(to)
    }

    pub fn next_phase(current: Phase) -> Option<Phase> {
        match current {
            Phase::Idle => Some(Phase::Started),
            Phase::Started => Some(Phase::Committed),
            Phase::Committed => Some(Phase::Revealed),
            Phase::Revealed => Some(Phase::Finalized),
            Phase::Finalized => Some(Phase::Transferred),
            Phase::Transferred => None,
        }
    }

    pub fn previous_phase(current: Phase) -> Option<Phase> {
        match current {
            Phase::Idle => None,
            Phase::Started => Some(Phase::Idle),
            Phase::Committed => Some(Phase::Started),
            Phase::Revealed => Some(Phase::Committed),
            Phase::Finalized => Some(Phase::Revealed),
            Phase::Transferred => Some(Phase::Finalized),
        }
    }
}
