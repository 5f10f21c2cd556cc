/// Lifecycle of a single trial run.
///
/// `Idle -> Armed -> Ending -> Done`. A trial only waits on outside events
/// while `Armed`; `Ending` is entered at most once.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum TrialPhase {
    #[default]
    Idle,
    Armed,
    Ending,
    Done,
}

impl TrialPhase {
    pub fn accepts_events(&self) -> bool {
        matches!(self, Self::Armed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn next(&self) -> Option<Self> {
        use TrialPhase::*;
        Some(match self {
            Idle => Armed,
            Armed => Ending,
            Ending => Done,
            Done => return None,
        })
    }
}
