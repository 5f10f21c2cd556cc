use stimkit_core::{ListenerId, TrialPhase};
use stimkit_timing::TimerId;

/// What ended a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Response,
    Deadline,
    Forced,
    Aborted,
}

/// Resources held by one trial while it runs.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    pub phase: TrialPhase,
    pub timers: Vec<TimerId>,
    pub listener: Option<ListenerId>,
    pub responses: usize,
}

impl RunState {
    /// Moves `Armed -> Ending` and hands back every handle still registered.
    /// Returns `None` if the trial is not armed, so the caller must stop.
    pub fn begin_ending(&mut self) -> Option<(Vec<TimerId>, Option<ListenerId>)> {
        if !self.phase.accepts_events() {
            return None;
        }
        self.phase = TrialPhase::Ending;
        Some((std::mem::take(&mut self.timers), self.listener.take()))
    }

    pub fn is_released(&self) -> bool {
        self.timers.is_empty() && self.listener.is_none()
    }
}
