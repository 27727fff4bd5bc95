//! The connection-level state automaton (§4.6). The client mirrors the
//! server's states so it can reject requests that are never legal from
//! here without making a round trip.

use crate::error::{Error, Result};
use crate::message::Request;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Negotiation,
    Authentication,
    Ready,
    Streaming,
    TxReady,
    TxStreaming,
    Failed,
    Interrupted,
    Defunct,
}

impl ConnectionState {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Negotiation => "NEGOTIATION",
            ConnectionState::Authentication => "AUTHENTICATION",
            ConnectionState::Ready => "READY",
            ConnectionState::Streaming => "STREAMING",
            ConnectionState::TxReady => "TX_READY",
            ConnectionState::TxStreaming => "TX_STREAMING",
            ConnectionState::Failed => "FAILED",
            ConnectionState::Interrupted => "INTERRUPTED",
            ConnectionState::Defunct => "DEFUNCT",
        }
    }

    /// In `Failed`/`Interrupted`, every request except `RESET` is legal
    /// to *send* — the server answers `IGNORED` and the state doesn't
    /// move. This is different from [`ConnectionState::check`] rejecting
    /// a request outright: here the wire is still touched (§4.6).
    pub fn is_ignoring(&self) -> bool {
        matches!(self, ConnectionState::Failed | ConnectionState::Interrupted)
    }

    /// Validates that `request` is legal to send from this state,
    /// without touching the wire. `Failed`/`Interrupted` always pass
    /// here — whether the server honors the request is handled by
    /// [`Self::is_ignoring`] at the connection layer.
    pub fn check(&self, request: &Request) -> Result<()> {
        if self.is_ignoring() {
            return Ok(());
        }
        let allowed = match (self, request) {
            (ConnectionState::Negotiation, Request::Hello { .. }) => true,
            (ConnectionState::Authentication, Request::Logon { .. }) => true,
            (ConnectionState::Ready, Request::Run { .. } | Request::Begin { .. }) => true,
            (ConnectionState::Streaming, Request::Pull { .. } | Request::Discard { .. }) => true,
            (ConnectionState::TxReady, Request::Run { .. } | Request::Commit | Request::Rollback) => true,
            (ConnectionState::TxStreaming, Request::Pull { .. } | Request::Discard { .. }) => true,
            // RESET and GOODBYE are legal from any live state.
            (state, Request::Reset) => !matches!(state, ConnectionState::Disconnected | ConnectionState::Defunct),
            (state, Request::Goodbye) => !matches!(state, ConnectionState::Disconnected | ConnectionState::Defunct),
            _ => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(Error::InvalidTransition { request: request.name(), state: self.name() })
        }
    }

    /// The state reached after a terminal response is observed while in
    /// `self` and having sent `request`. `did_server_ignore` is the
    /// response actually being `IGNORED` rather than `SUCCESS`/`FAILURE`.
    pub fn advance(&self, request: &Request, outcome: Outcome) -> ConnectionState {
        if matches!(outcome, Outcome::Ignored) {
            return *self;
        }
        if matches!(outcome, Outcome::Failure) {
            return ConnectionState::Failed;
        }
        match (self, request) {
            (ConnectionState::Negotiation, Request::Hello { .. }) => ConnectionState::Authentication,
            (ConnectionState::Authentication, Request::Logon { .. }) => ConnectionState::Ready,
            (ConnectionState::Ready, Request::Run { .. }) => ConnectionState::Streaming,
            (ConnectionState::Ready, Request::Begin { .. }) => ConnectionState::TxReady,
            (ConnectionState::Streaming, Request::Pull { .. } | Request::Discard { .. }) => ConnectionState::Ready,
            (ConnectionState::TxReady, Request::Run { .. }) => ConnectionState::TxStreaming,
            (ConnectionState::TxReady, Request::Commit | Request::Rollback) => ConnectionState::Ready,
            (ConnectionState::TxStreaming, Request::Pull { .. } | Request::Discard { .. }) => ConnectionState::TxReady,
            (_, Request::Reset) => ConnectionState::Ready,
            (_, Request::Goodbye) => ConnectionState::Defunct,
            (state, _) => *state,
        }
    }
}

/// How a request's response stream resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Ignored,
    Failure,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Dictionary;

    #[test]
    fn run_not_permitted_before_ready() {
        let state = ConnectionState::Negotiation;
        let request = Request::Run { query: "RETURN 1".into(), parameters: Dictionary::new(), extra: Dictionary::new() };
        assert!(matches!(state.check(&request), Err(Error::InvalidTransition { .. })));
    }

    #[test]
    fn reset_recovers_from_failed() {
        let state = ConnectionState::Failed;
        assert!(state.check(&Request::Reset).is_ok());
        assert_eq!(state.advance(&Request::Reset, Outcome::Success), ConnectionState::Ready);
    }

    #[test]
    fn failed_state_ignores_but_does_not_transition() {
        let state = ConnectionState::Failed;
        let request = Request::Run { query: "RETURN 1".into(), parameters: Dictionary::new(), extra: Dictionary::new() };
        assert!(state.check(&request).is_ok());
        assert_eq!(state.advance(&request, Outcome::Ignored), ConnectionState::Failed);
    }

    #[test]
    fn failure_response_moves_any_state_to_failed() {
        let state = ConnectionState::Streaming;
        assert_eq!(state.advance(&Request::Pull { extra: Dictionary::new() }, Outcome::Failure), ConnectionState::Failed);
    }

    #[test]
    fn run_permitted_again_after_reset() {
        let mut state = ConnectionState::Failed;
        state = state.advance(&Request::Reset, Outcome::Success);
        assert_eq!(state, ConnectionState::Ready);
        let request = Request::Run { query: "RETURN 1".into(), parameters: Dictionary::new(), extra: Dictionary::new() };
        assert!(state.check(&request).is_ok());
    }
}
