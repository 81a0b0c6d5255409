use crate::traits::{NetconfError, Result};
use parking_lot::Mutex;
use std::fmt;

/// Negotiation state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// Nothing sent yet
    Idle,
    /// Our hello is out, waiting for the peer's
    OpenWait,
    /// Peer hello accepted, session installed
    Established,
    /// Negotiation failed; the connection is closed
    Failed,
}

impl NegotiationState {
    /// Whether `self -> target` is one of the legal transitions
    pub fn can_transition_to(self, target: NegotiationState) -> bool {
        use NegotiationState::*;
        matches!(
            (self, target),
            (Idle, OpenWait) | (OpenWait, Established) | (Idle, Failed) | (OpenWait, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, NegotiationState::Established | NegotiationState::Failed)
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::Idle => "IDLE",
            NegotiationState::OpenWait => "OPEN_WAIT",
            NegotiationState::Established => "ESTABLISHED",
            NegotiationState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Lock-guarded negotiation state
///
/// Read from the channel context and from timer tasks; every mutation is a
/// checked compare-and-set.
#[derive(Debug)]
pub struct NegotiationStateCell {
    state: Mutex<NegotiationState>,
}

impl Default for NegotiationStateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl NegotiationStateCell {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(NegotiationState::Idle),
        }
    }

    pub fn get(&self) -> NegotiationState {
        *self.state.lock()
    }

    /// Move from `expected` to `target`
    ///
    /// Fails with [`NetconfError::InvalidStateTransition`] if the current
    /// state is not `expected` or the transition is not a legal one; the
    /// state is left untouched in that case.
    pub fn transition(&self, expected: NegotiationState, target: NegotiationState) -> Result<()> {
        let mut state = self.state.lock();
        if *state != expected || !expected.can_transition_to(target) {
            return Err(NetconfError::InvalidStateTransition {
                expected: expected.to_string(),
                actual: state.to_string(),
                target: target.to_string(),
            });
        }
        *state = target;
        Ok(())
    }

    /// Move to `Failed` if negotiation is still in progress
    ///
    /// Returns the state that was replaced, or `None` if the state was
    /// already terminal.
    pub fn fail_if_pending(&self) -> Option<NegotiationState> {
        let mut state = self.state.lock();
        match *state {
            previous @ (NegotiationState::Idle | NegotiationState::OpenWait) => {
                *state = NegotiationState::Failed;
                Some(previous)
            }
            NegotiationState::Established | NegotiationState::Failed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use NegotiationState::*;

    const ALL: [NegotiationState; 4] = [Idle, OpenWait, Established, Failed];

    #[test]
    fn test_only_the_defined_transitions_are_legal() {
        let legal: Vec<_> = ALL
            .iter()
            .flat_map(|from| ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .collect();

        assert_eq!(
            legal,
            vec![(Idle, OpenWait), (Idle, Failed), (OpenWait, Established), (OpenWait, Failed)]
        );
    }

    #[test]
    fn test_illegal_transition_is_rejected_and_state_kept() {
        let cell = NegotiationStateCell::new();
        let err = cell.transition(Idle, Established).unwrap_err();
        assert!(matches!(err, NetconfError::InvalidStateTransition { .. }));
        assert_eq!(cell.get(), Idle);
    }

    #[test]
    fn test_expected_state_mismatch_is_rejected() {
        let cell = NegotiationStateCell::new();
        cell.transition(Idle, OpenWait).unwrap();

        let err = cell.transition(Idle, Failed).unwrap_err();
        assert_eq!(
            err,
            NetconfError::InvalidStateTransition {
                expected: "IDLE".into(),
                actual: "OPEN_WAIT".into(),
                target: "FAILED".into(),
            }
        );
        assert_eq!(cell.get(), OpenWait);
    }

    #[test]
    fn test_terminal_states_stay_terminal() {
        let cell = NegotiationStateCell::new();
        cell.transition(Idle, OpenWait).unwrap();
        cell.transition(OpenWait, Established).unwrap();

        assert_eq!(cell.fail_if_pending(), None);
        for target in ALL {
            assert!(cell.transition(Established, target).is_err());
        }
        assert_eq!(cell.get(), Established);
    }

    #[test]
    fn test_fail_if_pending() {
        let cell = NegotiationStateCell::new();
        assert_eq!(cell.fail_if_pending(), Some(Idle));
        assert_eq!(cell.get(), Failed);
        assert_eq!(cell.fail_if_pending(), None);
    }
}
