//! Reference-face lock state machine.

use crate::app::Status;
use camface_core::{compare, FaceEncoding};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Authorized,
    Unauthorized,
}

/// Emitted only when the lock state actually changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: LockState,
    /// Whether the evaluated pass saw any face at all.
    pub faces_present: bool,
}

impl Transition {
    pub fn status(&self) -> Status {
        match (self.state, self.faces_present) {
            (LockState::Authorized, _) => Status::success("Authorized: Access Granted!"),
            (LockState::Unauthorized, true) => Status::error("Unauthorized: Access Denied"),
            (LockState::Unauthorized, false) => Status::info("Waiting for face..."),
        }
    }
}

/// Holds at most one reference encoding and the current lock state.
pub struct MatchEngine {
    state: LockState,
    reference: Option<FaceEncoding>,
    tolerance: f32,
}

impl MatchEngine {
    pub fn new(tolerance: f32) -> Self {
        Self {
            state: LockState::Unauthorized,
            reference: None,
            tolerance,
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    #[cfg(test)]
    pub fn reference(&self) -> Option<&FaceEncoding> {
        self.reference.as_ref()
    }

    /// Replace the reference wholesale. The lock state is kept.
    pub fn set_reference(&mut self, encoding: FaceEncoding) {
        tracing::info!(dim = encoding.values.len(), "reference encoding replaced");
        self.reference = Some(encoding);
    }

    /// Compare one pass's encodings against the reference.
    ///
    /// Without a reference nothing is compared and the state is kept. An
    /// empty pass counts as a non-match.
    pub fn evaluate(&mut self, encodings: &[FaceEncoding]) -> Option<Transition> {
        let reference = self.reference.as_ref()?;

        let matched = encodings
            .iter()
            .any(|candidate| compare(reference, candidate, self.tolerance));
        let next = if matched { LockState::Authorized } else { LockState::Unauthorized };

        tracing::debug!(faces = encodings.len(), matched, "match pass");

        if next == self.state {
            return None;
        }
        self.state = next;
        tracing::info!(state = ?next, "lock state changed");
        Some(Transition {
            state: next,
            faces_present: !encodings.is_empty(),
        })
    }
}
