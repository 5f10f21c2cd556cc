use crate::error::TrialError;
use std::rc::Rc;
use std::time::Duration;
use stimkit_core::{Completion, DataSink, Display, ResponseSource};
use stimkit_timing::Scheduler;

/// Everything a trial needs from its host, passed in explicitly.
#[derive(Clone)]
pub struct HostServices {
    pub display: Rc<dyn Display>,
    pub responses: Rc<dyn ResponseSource>,
    pub scheduler: Rc<dyn Scheduler>,
    pub sink: Rc<dyn DataSink>,
    pub completion: Rc<dyn Completion>,
    /// Pause between the end of a trial and the finished signal.
    pub post_trial_interval: Option<Duration>,
}

impl HostServices {
    pub fn builder() -> HostServicesBuilder {
        HostServicesBuilder::default()
    }
}

#[derive(Default)]
pub struct HostServicesBuilder {
    display: Option<Rc<dyn Display>>,
    responses: Option<Rc<dyn ResponseSource>>,
    scheduler: Option<Rc<dyn Scheduler>>,
    sink: Option<Rc<dyn DataSink>>,
    completion: Option<Rc<dyn Completion>>,
    post_trial_interval: Option<Duration>,
}

impl HostServicesBuilder {
    pub fn display(mut self, display: Rc<dyn Display>) -> Self {
        self.display = Some(display);
        self
    }

    pub fn responses(mut self, responses: Rc<dyn ResponseSource>) -> Self {
        self.responses = Some(responses);
        self
    }

    pub fn scheduler(mut self, scheduler: Rc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn sink(mut self, sink: Rc<dyn DataSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn completion(mut self, completion: Rc<dyn Completion>) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn post_trial_interval(mut self, interval: Duration) -> Self {
        self.post_trial_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<HostServices, TrialError> {
        Ok(HostServices {
            display: self
                .display
                .ok_or(TrialError::HostServiceUnavailable("display"))?,
            responses: self
                .responses
                .ok_or(TrialError::HostServiceUnavailable("responses"))?,
            scheduler: self
                .scheduler
                .ok_or(TrialError::HostServiceUnavailable("scheduler"))?,
            sink: self.sink.ok_or(TrialError::HostServiceUnavailable("sink"))?,
            completion: self
                .completion
                .ok_or(TrialError::HostServiceUnavailable("completion"))?,
            post_trial_interval: self.post_trial_interval,
        })
    }
}
