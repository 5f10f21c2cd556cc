use crate::display::Surface;
use crate::keyboard::Keyboard;
use crate::store::{DataStore, Progress};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::rc::Rc;
use std::time::Duration;
use stimkit_core::{HostError, Key, TrialResult, TrialSpec};
use stimkit_experiment::{HostServices, TrialController};
use stimkit_timing::{HighPrecisionTimer, Scheduler, Timer, TimerId, TimerQueue, VirtualTimer};
use tracing::info;

/// Settings owned by the host rather than by individual trials.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Gap between a trial's end and the start of the next one.
    pub post_trial_interval_ms: u64,
}

impl HostConfig {
    pub fn post_trial_interval(&self) -> Duration {
        Duration::from_millis(self.post_trial_interval_ms)
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            post_trial_interval_ms: 1000,
        }
    }
}

/// Runs trials one after another without a window: display, keyboard and
/// data store are in memory, and key presses are scripted on the timer
/// queue.
pub struct HeadlessHost<T: Timer<Timestamp = u64> + 'static> {
    config: HostConfig,
    queue: Rc<TimerQueue<T>>,
    surface: Rc<Surface>,
    keyboard: Rc<Keyboard<T>>,
    store: Rc<DataStore>,
    progress: Rc<Progress>,
}

impl HeadlessHost<VirtualTimer> {
    /// Host on a virtual clock; waits complete instantly.
    pub fn virtual_time(config: HostConfig) -> Self {
        Self::with_timer(config, VirtualTimer::new())
    }
}

impl HeadlessHost<HighPrecisionTimer> {
    /// Host on the wall clock; waits really sleep.
    pub fn realtime(config: HostConfig) -> Self {
        Self::with_timer(config, HighPrecisionTimer::new())
    }
}

impl<T: Timer<Timestamp = u64> + 'static> HeadlessHost<T> {
    pub fn with_timer(config: HostConfig, timer: T) -> Self {
        Self {
            config,
            keyboard: Rc::new(Keyboard::new(timer.clone())),
            queue: Rc::new(TimerQueue::new(timer)),
            surface: Rc::new(Surface::new()),
            store: Rc::new(DataStore::new()),
            progress: Rc::new(Progress::default()),
        }
    }

    pub fn services(&self) -> HostServices {
        HostServices {
            display: self.surface.clone(),
            responses: self.keyboard.clone(),
            scheduler: self.queue.clone(),
            sink: self.store.clone(),
            completion: self.progress.clone(),
            post_trial_interval: Some(self.config.post_trial_interval()),
        }
    }

    /// Schedules a key press `delay` from now.
    pub fn press_after(&self, delay: Duration, key: impl Into<Key>) -> TimerId {
        let keyboard = Rc::clone(&self.keyboard);
        let key = key.into();
        self.queue
            .schedule(delay, Box::new(move || keyboard.press(&key).map(|_| ())))
    }

    /// Delivers a key press immediately.
    pub fn press(&self, key: impl Into<Key>) -> Result<usize, HostError> {
        self.keyboard.press(&key.into())
    }

    pub fn queue(&self) -> &TimerQueue<T> {
        &self.queue
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn pending_timers(&self) -> usize {
        self.queue.pending()
    }

    pub fn active_listeners(&self) -> usize {
        self.keyboard.active_listeners()
    }

    pub fn trials_finished(&self) -> usize {
        self.progress.finished()
    }

    /// Starts `spec` and pumps the queue until the trial signals it is
    /// finished.
    pub fn run_trial(&self, spec: TrialSpec) -> Result<TrialResult> {
        let before = self.progress.finished();
        let trial = TrialController::run(spec, self.services())?;
        while self.progress.finished() == before {
            if self.queue.fire_next()?.is_none() {
                let phase = trial.phase();
                // Nothing may outlive the failed trial and answer to the next one.
                trial.abort()?;
                return Err(HostError::Stalled).with_context(|| {
                    format!(
                        "trial showing {} is {:?} with nothing left to wait for",
                        trial.spec().stimulus.source(),
                        phase
                    )
                });
            }
        }
        self.store
            .last()
            .context("trial finished without writing data")
    }

    /// Runs every spec in order, starting each only after the previous one
    /// has finished.
    pub fn run_timeline(&self, specs: Vec<TrialSpec>) -> Result<Vec<TrialResult>> {
        let total = specs.len();
        let mut results = Vec::with_capacity(total);
        for (index, spec) in specs.into_iter().enumerate() {
            let result = self
                .run_trial(spec)
                .with_context(|| format!("trial {} of {total}", index + 1))?;
            results.push(result);
        }
        info!(trials = total, "timeline complete");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stimkit_core::{KeyChoice, StimulusContent, Timing};

    fn spec(source: &str) -> TrialSpec {
        let mut spec = TrialSpec::new(StimulusContent::Image(source.into()));
        spec.choices = KeyChoice::from_keys(["f", "j"]);
        spec
    }

    #[test]
    fn host_config_defaults_to_one_second_gap() {
        let config: HostConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.post_trial_interval(), Duration::from_secs(1));
    }

    #[test]
    fn timeline_waits_for_post_trial_gap() {
        let host = HeadlessHost::virtual_time(HostConfig::default());
        let mut first = spec("a.png");
        first.response_deadline = Timing::from_millis(500);
        let mut second = spec("b.png");
        second.response_deadline = Timing::from_millis(500);

        let results = host.run_timeline(vec![first, second]).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(host.trials_finished(), 2);
        // two deadlines plus two post-trial gaps
        assert_eq!(host.queue().now(), 3_000_000_000);
    }

    #[test]
    fn stalled_trial_is_an_error() {
        let host = HeadlessHost::virtual_time(HostConfig::default());
        let err = host.run_trial(spec("a.png")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HostError>(),
            Some(HostError::Stalled)
        ));
        assert_eq!(host.store().len(), 0);
        assert_eq!(host.active_listeners(), 0);
        assert!(host.surface().is_empty());
    }

    #[test]
    fn trial_after_a_stall_records_only_itself() {
        let host = HeadlessHost::virtual_time(HostConfig {
            post_trial_interval_ms: 0,
        });
        assert!(host.run_trial(spec("first.png")).is_err());

        host.press_after(Duration::from_millis(100), "f");
        let result = host.run_trial(spec("second.png")).unwrap();

        assert_eq!(host.store().len(), 1);
        assert_eq!(result.stimulus, "second.png");
        assert_eq!(result.rt, Some(Duration::from_millis(100)));
        assert_eq!(host.active_listeners(), 0);
    }

    #[test]
    fn realtime_host_runs_a_short_trial() {
        let host = HeadlessHost::realtime(HostConfig {
            post_trial_interval_ms: 0,
        });
        host.press_after(Duration::from_millis(5), "j");
        let result = host.run_trial(spec("a.png")).unwrap();
        assert_eq!(result.key_press, Some(Key::new("j")));
        assert!(result.rt.unwrap() >= Duration::from_millis(4));
    }
}
