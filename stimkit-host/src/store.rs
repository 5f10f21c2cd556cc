use std::cell::{Cell, RefCell};
use stimkit_core::{Completion, DataSink, HostError, TrialResult};
use tracing::debug;

/// In-memory data store, one entry per finished trial.
#[derive(Debug, Default)]
pub struct DataStore {
    results: RefCell<Vec<TrialResult>>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.results.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.borrow().is_empty()
    }

    pub fn results(&self) -> Vec<TrialResult> {
        self.results.borrow().clone()
    }

    pub fn last(&self) -> Option<TrialResult> {
        self.results.borrow().last().cloned()
    }

    /// All records as a JSON array.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.results
                .borrow()
                .iter()
                .map(|result| serde_json::Value::Object(result.to_record()))
                .collect(),
        )
    }
}

impl DataSink for DataStore {
    fn record(&self, result: TrialResult) -> Result<(), HostError> {
        self.results.borrow_mut().push(result);
        debug!(stored = self.len(), "trial data written");
        Ok(())
    }
}

/// Counts finished signals so the timeline knows when to move on.
#[derive(Debug, Default)]
pub struct Progress {
    finished: Cell<usize>,
}

impl Progress {
    pub fn finished(&self) -> usize {
        self.finished.get()
    }
}

impl Completion for Progress {
    fn trial_finished(&self) -> Result<(), HostError> {
        self.finished.set(self.finished.get() + 1);
        Ok(())
    }
}
