//! Load state machine.
//!
//! ```text
//!               enable() + next tick
//!  DISABLED(r) ─────────────────────▶ ACTIVE
//!       ▲                               │
//!       │  disable(USER) / cutoff /      │
//!       └────── sticky fault ────────────┘
//! ```
//!
//! `enable()` only records a request; the transition happens on the next
//! tick so the regulator can compute a safe first command before the
//! enable line is asserted.  Every path into `DISABLED` is immediate and
//! carries the reason.

use core::fmt;

use log::info;

/// Why the load is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DisableReason {
    /// Operator switched the load off (also the power-on state).
    User = 0,
    /// Sensed voltage dropped below the cutoff threshold.
    Cutoff = 1,
    /// A sticky fault is latched.
    Error = 2,
}

/// Coarse load state.  Whether an active load is actually tracking its
/// setpoint is reported separately by [`LoadState`]'s owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    Disabled(DisableReason),
    Active,
}

impl LoadState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Reason for the last disable, `None` while active.
    pub fn disable_reason(self) -> Option<DisableReason> {
        match self {
            Self::Disabled(reason) => Some(reason),
            Self::Active => None,
        }
    }
}

impl Default for LoadState {
    fn default() -> Self {
        Self::Disabled(DisableReason::User)
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Disabled(DisableReason::User) => write!(f, "Disabled(user)"),
            Self::Disabled(DisableReason::Cutoff) => write!(f, "Disabled(cutoff)"),
            Self::Disabled(DisableReason::Error) => write!(f, "Disabled(error)"),
        }
    }
}

/// Tracks the current state plus a pending enable request.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadStateMachine {
    state: LoadState,
    enable_requested: bool,
}

impl LoadStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn enable_pending(&self) -> bool {
        self.enable_requested
    }

    /// Ask for activation on the next tick.
    pub fn request_enable(&mut self) {
        self.enable_requested = true;
    }

    /// Realise a pending enable request.  Returns `true` if the state
    /// changed.
    pub fn apply_pending(&mut self) -> bool {
        if !self.enable_requested {
            return false;
        }
        self.enable_requested = false;
        self.transition(LoadState::Active)
    }

    /// Switch off immediately, dropping any pending enable request.
    /// Returns `true` if the state changed.
    pub fn disable(&mut self, reason: DisableReason) -> bool {
        self.enable_requested = false;
        self.transition(LoadState::Disabled(reason))
    }

    fn transition(&mut self, next: LoadState) -> bool {
        if next == self.state {
            return false;
        }
        info!("LOAD | {} -> {}", self.state, next);
        self.state = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disabled_by_user() {
        let sm = LoadStateMachine::new();
        assert_eq!(sm.state(), LoadState::Disabled(DisableReason::User));
        assert!(!sm.enable_pending());
    }

    #[test]
    fn enable_is_deferred() {
        let mut sm = LoadStateMachine::new();
        sm.request_enable();
        assert!(!sm.is_active());
        assert!(sm.apply_pending());
        assert!(sm.is_active());
        assert!(!sm.apply_pending(), "request is consumed");
    }

    #[test]
    fn disable_cancels_pending_enable() {
        let mut sm = LoadStateMachine::new();
        sm.request_enable();
        sm.disable(DisableReason::Error);
        assert!(!sm.apply_pending());
        assert_eq!(sm.state().disable_reason(), Some(DisableReason::Error));
    }

    #[test]
    fn disable_is_immediate_and_tagged() {
        let mut sm = LoadStateMachine::new();
        sm.request_enable();
        sm.apply_pending();
        assert!(sm.disable(DisableReason::Cutoff));
        assert!(!sm.is_active());
        assert_eq!(sm.state().disable_reason(), Some(DisableReason::Cutoff));
    }

    #[test]
    fn reason_can_be_overwritten_while_disabled() {
        let mut sm = LoadStateMachine::new();
        sm.disable(DisableReason::Cutoff);
        assert!(sm.disable(DisableReason::User));
        assert!(!sm.disable(DisableReason::User));
    }
}
