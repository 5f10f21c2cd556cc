//! Single-stimulus trial controller.
//!
//! A trial renders its stimulus, arms a response listener plus up to two
//! timers, and then waits. Whichever of the response or the deadline fires
//! first ends the trial; ending is guarded by the phase so it runs once, and
//! it releases every handle before the result is written.

use super::error::TrialError;
use super::services::HostServices;
use super::trial::{EndReason, RunState};
use std::cell::RefCell;
use std::rc::Rc;
use stimkit_core::{
    Element, HostError, RESPONDED_CLASS, ResponseInfo, STIMULUS_ELEMENT_ID, TrialPhase,
    TrialResult, TrialSpec,
};
use tracing::{debug, info};

/// Handle to a running (or finished) trial.
///
/// Dropping the handle does not stop the trial; the callbacks it registered
/// keep it alive until it ends.
pub struct TrialController {
    inner: Rc<ActiveTrial>,
}

struct ActiveTrial {
    spec: TrialSpec,
    services: HostServices,
    state: RefCell<RunState>,
}

impl TrialController {
    /// Renders `spec` and arms its listener and timers. The result arrives
    /// later through the sink, followed by the finished signal.
    pub fn run(spec: TrialSpec, services: HostServices) -> Result<Self, TrialError> {
        let trial = Rc::new(ActiveTrial {
            spec,
            services,
            state: RefCell::new(RunState::default()),
        });
        trial.render()?;
        trial.arm();
        Ok(Self { inner: trial })
    }

    pub fn phase(&self) -> TrialPhase {
        self.inner.state.borrow().phase
    }

    pub fn spec(&self) -> &TrialSpec {
        &self.inner.spec
    }

    /// Responses seen so far, including ones that did not end the trial.
    pub fn responses(&self) -> usize {
        self.inner.state.borrow().responses
    }

    /// True once no timer or listener registered by this trial is left.
    pub fn is_released(&self) -> bool {
        self.inner.state.borrow().is_released()
    }

    /// Ends the trial from outside with no response recorded.
    ///
    /// Returns `Ok(false)` without side effects if the trial already ended.
    pub fn force_end(&self) -> Result<bool, TrialError> {
        Ok(self.inner.end(EndReason::Forced, None)?)
    }

    /// Tears the trial down without writing data or signalling completion.
    /// Used when the host gives up on a trial it can no longer finish.
    ///
    /// Returns `Ok(false)` without side effects if the trial already ended.
    pub fn abort(&self) -> Result<bool, TrialError> {
        if !self.inner.release(EndReason::Aborted) {
            return Ok(false);
        }
        self.inner.services.display.clear()?;
        self.inner.state.borrow_mut().phase = TrialPhase::Done;
        info!(stimulus = self.inner.spec.stimulus.source(), "trial aborted");
        Ok(true)
    }
}

impl ActiveTrial {
    fn render(&self) -> Result<(), HostError> {
        let display = &self.services.display;
        display.append(Element::Stimulus {
            id: STIMULUS_ELEMENT_ID,
            content: self.spec.stimulus.clone(),
        })?;
        if !self.spec.prompt.is_empty() {
            display.append(Element::Prompt(self.spec.prompt.clone()))?;
        }
        debug!(stimulus = self.spec.stimulus.source(), "rendered stimulus");
        Ok(())
    }

    fn arm(self: &Rc<Self>) {
        let listener = {
            let trial = Rc::clone(self);
            self.services.responses.listen(
                &self.spec.choices,
                Box::new(move |info: ResponseInfo| trial.on_response(info)),
            )
        };

        let mut timers = Vec::with_capacity(2);
        if let Some(delay) = self.spec.stimulus_duration.duration() {
            let trial = Rc::clone(self);
            timers.push(
                self.services
                    .scheduler
                    .schedule(delay, Box::new(move || trial.hide_stimulus())),
            );
        }
        if let Some(delay) = self.spec.response_deadline.duration() {
            let trial = Rc::clone(self);
            timers.push(self.services.scheduler.schedule(
                delay,
                Box::new(move || trial.end(EndReason::Deadline, None).map(|_| ())),
            ));
        }

        let mut state = self.state.borrow_mut();
        state.listener = Some(listener);
        state.timers = timers;
        state.phase = TrialPhase::Armed;
        debug!(
            timers = state.timers.len(),
            stimulus_ms = ?self.spec.stimulus_duration.duration().map(|d| d.as_millis()),
            deadline_ms = ?self.spec.response_deadline.duration().map(|d| d.as_millis()),
            "trial armed"
        );
    }

    fn on_response(&self, info: ResponseInfo) -> Result<(), HostError> {
        {
            let mut state = self.state.borrow_mut();
            if !state.phase.accepts_events() {
                debug!(key = %info.key, phase = ?state.phase, "late response ignored");
                return Ok(());
            }
            state.responses += 1;
        }
        self.services
            .display
            .add_class(STIMULUS_ELEMENT_ID, RESPONDED_CLASS)?;

        if self.spec.continue_after_response {
            self.end(EndReason::Response, Some(info))?;
        } else {
            debug!(key = %info.key, rt_ms = info.rt.as_millis(), "response recorded, trial continues");
        }
        Ok(())
    }

    // Visual only; never ends the trial.
    fn hide_stimulus(&self) -> Result<(), HostError> {
        if !self.state.borrow().phase.accepts_events() {
            return Ok(());
        }
        debug!("stimulus hidden");
        self.services.display.set_hidden(STIMULUS_ELEMENT_ID)
    }

    /// Enters `Ending` and cancels every timer and listener. Returns `false`
    /// if the trial had already left `Armed`.
    fn release(&self, reason: EndReason) -> bool {
        let released = self.state.borrow_mut().begin_ending();
        let Some((timers, listener)) = released else {
            debug!(?reason, "trial already ended");
            return false;
        };

        for id in timers {
            self.services.scheduler.cancel(id);
        }
        if let Some(id) = listener {
            self.services.responses.cancel(id);
        }

        debug_assert!(self.state.borrow().is_released());
        true
    }

    fn end(&self, reason: EndReason, response: Option<ResponseInfo>) -> Result<bool, HostError> {
        if !self.release(reason) {
            return Ok(false);
        }

        let result = TrialResult::new(&self.spec, response);
        info!(
            ?reason,
            stimulus = %result.stimulus,
            rt_ms = result.rt_millis(),
            key = ?result.key_press.as_ref().map(|k| k.as_str()),
            "trial ended"
        );
        self.services.sink.record(result)?;
        self.services.display.clear()?;
        self.state.borrow_mut().phase = TrialPhase::Done;

        match self.services.post_trial_interval.filter(|d| !d.is_zero()) {
            Some(delay) => {
                let completion = Rc::clone(&self.services.completion);
                self.services
                    .scheduler
                    .schedule(delay, Box::new(move || completion.trial_finished()));
            }
            None => self.services.completion.trial_finished()?,
        }
        Ok(true)
    }
}
