//! Per-element render bookkeeping.
use std::time::Instant;

use crate::common::Error;

/// Phase of the most recent render of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderPhase {
    /// Never rendered, or reset
    #[default]
    Idle,
    /// A render is in flight
    Rendering,
    /// Rendered by a backend, from cache, or degraded by the fallback
    Completed,
    /// No backend could be loaded; the element shows the fallback
    Failed,
}

/// Render state carried by every element.
///
/// Only the component performing a render mutates it; the monitor and callers
/// that want to skip already-completed elements read it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderState {
    pub phase: RenderPhase,
    pub last_error: Option<Error>,
    pub updated_at: Option<Instant>,
}

impl RenderState {
    pub(crate) fn transition(&mut self, phase: RenderPhase, error: Option<Error>) {
        self.phase = phase;
        self.last_error = error;
        self.updated_at = Some(Instant::now());
    }

    /// Whether the element already shows rendered content.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.phase == RenderPhase::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_records_error_and_time() {
        let mut state = RenderState::default();
        assert_eq!(state.phase, RenderPhase::Idle);
        assert!(state.updated_at.is_none());

        state.transition(RenderPhase::Failed, Some(Error::Superseded));
        assert_eq!(state.phase, RenderPhase::Failed);
        assert_eq!(state.last_error, Some(Error::Superseded));
        assert!(state.updated_at.is_some());

        state.transition(RenderPhase::Completed, None);
        assert!(state.is_completed());
        assert!(state.last_error.is_none());
    }
}
