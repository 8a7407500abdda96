//! Single-run lock

use std::sync::{Mutex, MutexGuard};

/// Whether a sync run is in progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    Running,
}

/// Admits one sync run at a time.
///
/// A request made while a run is in progress is refused, not queued.
#[derive(Debug, Default)]
pub struct RunGate {
    state: Mutex<RunState>,
}

impl RunGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move from `Idle` to `Running`.
    ///
    /// Returns `None` when a run is already in progress. The run ends when
    /// the returned guard is dropped.
    pub fn try_start(&self) -> Option<RunGuard<'_>> {
        let mut state = self.lock();
        match *state {
            RunState::Running => None,
            RunState::Idle => {
                *state = RunState::Running;
                Some(RunGuard { gate: self })
            }
        }
    }

    pub fn state(&self) -> RunState {
        *self.lock()
    }

    fn finish(&self) {
        *self.lock() = RunState::Idle;
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Proof of a running sync; returns the gate to `Idle` on drop
#[derive(Debug)]
pub struct RunGuard<'a> {
    gate: &'a RunGate,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.gate.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_start_is_refused() {
        let gate = RunGate::new();
        let guard = gate.try_start();
        assert!(guard.is_some());
        assert_eq!(gate.state(), RunState::Running);
        assert!(gate.try_start().is_none());

        drop(guard);
        assert_eq!(gate.state(), RunState::Idle);
        assert!(gate.try_start().is_some());
    }
}
