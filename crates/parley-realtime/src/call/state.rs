//! Call lifecycle state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use parley_core::AppError;

/// Lifecycle state of a call session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallState {
    Idle,
    Ringing,
    Connected,
    Ended,
    Rejected,
}

/// Inputs that drive a call session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEvent {
    Start,
    Answer,
    Reject,
    End,
    RingTimeout,
    Disconnect,
    Signal,
}

/// Reason carried by `call:ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallEndReason {
    /// A party sent `call:end`.
    Hangup,
    /// The ring timer fired.
    NoAnswer,
    /// A party's engaged connection went away.
    PeerDisconnected,
    /// Another device of the callee rejected the call.
    Rejected,
}

impl CallState {
    /// `ENDED` and `REJECTED` accept no further events.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Rejected)
    }

    /// Applies an event, returning the next state or `INVALID_STATE`.
    ///
    /// `Signal` is a self-transition: payloads may be relayed while ringing
    /// (early ICE candidates) and once connected.
    pub fn apply(self, event: CallEvent) -> Result<Self, AppError> {
        use CallEvent as E;
        use CallState as S;

        match (self, event) {
            (S::Idle, E::Start) => Ok(S::Ringing),
            (S::Ringing, E::Answer) => Ok(S::Connected),
            (S::Ringing, E::Reject) => Ok(S::Rejected),
            (S::Ringing, E::RingTimeout) => Ok(S::Ended),
            (S::Ringing | S::Connected, E::End | E::Disconnect) => Ok(S::Ended),
            (S::Ringing | S::Connected, E::Signal) => Ok(self),
            (state, event) => Err(AppError::invalid_state(format!(
                "Cannot {event} a call that is {state}"
            ))),
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Ringing => write!(f, "RINGING"),
            Self::Connected => write!(f, "CONNECTED"),
            Self::Ended => write!(f, "ENDED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

impl fmt::Display for CallEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Answer => write!(f, "answer"),
            Self::Reject => write!(f, "reject"),
            Self::End => write!(f, "end"),
            Self::RingTimeout => write!(f, "time out"),
            Self::Disconnect => write!(f, "disconnect"),
            Self::Signal => write!(f, "signal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::error::ErrorKind;

    #[test]
    fn test_happy_path() {
        let s = CallState::Idle.apply(CallEvent::Start).unwrap();
        assert_eq!(s, CallState::Ringing);
        let s = s.apply(CallEvent::Signal).unwrap();
        assert_eq!(s, CallState::Ringing);
        let s = s.apply(CallEvent::Answer).unwrap();
        assert_eq!(s, CallState::Connected);
        assert_eq!(s.apply(CallEvent::Signal).unwrap(), CallState::Connected);
        assert_eq!(s.apply(CallEvent::End).unwrap(), CallState::Ended);
    }

    #[test]
    fn test_reject_only_while_ringing() {
        assert_eq!(
            CallState::Ringing.apply(CallEvent::Reject).unwrap(),
            CallState::Rejected
        );
        let err = CallState::Connected.apply(CallEvent::Reject).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidState);
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for state in [CallState::Ended, CallState::Rejected] {
            assert!(state.is_terminal());
            for event in [
                CallEvent::Start,
                CallEvent::Answer,
                CallEvent::Reject,
                CallEvent::End,
                CallEvent::RingTimeout,
                CallEvent::Disconnect,
                CallEvent::Signal,
            ] {
                assert_eq!(state.apply(event).unwrap_err().kind, ErrorKind::InvalidState);
            }
        }
    }

    #[test]
    fn test_answer_twice_is_invalid() {
        let err = CallState::Connected.apply(CallEvent::Answer).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidState);
        assert!(err.message.contains("CONNECTED"));
    }

    #[test]
    fn test_timeout_only_while_ringing() {
        assert_eq!(
            CallState::Ringing.apply(CallEvent::RingTimeout).unwrap(),
            CallState::Ended
        );
        assert!(CallState::Connected.apply(CallEvent::RingTimeout).is_err());
    }

    #[test]
    fn test_signal_before_start_invalid() {
        assert!(CallState::Idle.apply(CallEvent::Signal).is_err());
    }
}
