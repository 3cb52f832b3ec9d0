//! External login flow state machine using rust-fsm.
//!
//! The browser-based login session is modeled as an explicit finite state
//! machine with three terminal outcomes, so every session ends in exactly
//! one of them and a finished flow cannot be resolved twice.
//!
//! ## State Diagram
//!
//! ```text
//! ┌──────────┐
//! │   Idle   │ (initial)
//! └────┬─────┘
//!      │ Initiate
//!      ▼
//! ┌───────────────────┐
//! │ AwaitingRedirect  │
//! └────┬────┬────┬────┘
//!      │    │    │
//!      │    │    │ SessionDismissed
//!      │    │    ▼
//!      │    │  Dismissed
//!      │    │ UserCancelled
//!      │    ▼
//!      │  Cancelled
//!      │ RedirectReceived
//!      ▼
//!  Completed
//! ```

use rust_fsm::*;

// Generates a module `login_flow` with State, Input, and StateMachine types.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub login_flow(Idle)

    Idle => {
        Initiate => AwaitingRedirect
    },
    AwaitingRedirect => {
        RedirectReceived => Completed,
        UserCancelled => Cancelled,
        SessionDismissed => Dismissed
    }
}

// Re-export the generated types with clearer names
pub use login_flow::Input as LoginFlowInput;
pub use login_flow::State as LoginFlowState;
pub use login_flow::StateMachine as LoginFlowMachine;

impl LoginFlowState {
    /// Returns true once the flow has reached one of its three outcomes.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoginFlowState::Completed | LoginFlowState::Cancelled | LoginFlowState::Dismissed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_idle() {
        let machine = LoginFlowMachine::new();
        assert_eq!(*machine.state(), LoginFlowState::Idle);
        assert!(!machine.state().is_terminal());
    }

    #[test]
    fn test_redirect_flow() {
        let mut machine = LoginFlowMachine::new();

        machine.consume(&LoginFlowInput::Initiate).unwrap();
        assert_eq!(*machine.state(), LoginFlowState::AwaitingRedirect);

        machine.consume(&LoginFlowInput::RedirectReceived).unwrap();
        assert_eq!(*machine.state(), LoginFlowState::Completed);
        assert!(machine.state().is_terminal());
    }

    #[test]
    fn test_cancel_and_dismiss_outcomes() {
        let mut machine = LoginFlowMachine::new();
        machine.consume(&LoginFlowInput::Initiate).unwrap();
        machine.consume(&LoginFlowInput::UserCancelled).unwrap();
        assert_eq!(*machine.state(), LoginFlowState::Cancelled);

        let mut machine = LoginFlowMachine::new();
        machine.consume(&LoginFlowInput::Initiate).unwrap();
        machine.consume(&LoginFlowInput::SessionDismissed).unwrap();
        assert_eq!(*machine.state(), LoginFlowState::Dismissed);
    }

    #[test]
    fn test_cannot_resolve_before_initiate() {
        let mut machine = LoginFlowMachine::new();
        assert!(machine.consume(&LoginFlowInput::RedirectReceived).is_err());
        assert!(machine.consume(&LoginFlowInput::UserCancelled).is_err());
        assert_eq!(*machine.state(), LoginFlowState::Idle);
    }

    #[test]
    fn test_terminal_states_accept_no_input() {
        let mut machine = LoginFlowMachine::new();
        machine.consume(&LoginFlowInput::Initiate).unwrap();
        machine.consume(&LoginFlowInput::RedirectReceived).unwrap();

        // A completed flow cannot be cancelled, dismissed, or restarted
        assert!(machine.consume(&LoginFlowInput::UserCancelled).is_err());
        assert!(machine.consume(&LoginFlowInput::SessionDismissed).is_err());
        assert!(machine.consume(&LoginFlowInput::Initiate).is_err());
        assert_eq!(*machine.state(), LoginFlowState::Completed);
    }
}
