//! Single-stimulus keyboard trials.
//!
//! Build specs from a batch configuration, then hand each one to a
//! [`TrialController`] together with the services of the host it runs in.

pub use stimkit_core::{
    Completion, DataSink, Display, Element, HostError, Key, KeyChoice, ListenerId,
    RESPONDED_CLASS, ResponseInfo, ResponseSource, STIMULUS_ELEMENT_ID, StimulusContent, Timing,
    TrialPhase, TrialResult, TrialSpec,
};
pub use stimkit_experiment::{
    BatchConfig, ConfigError, EndReason, HostServices, Param, TrialController, TrialError,
    build_trial_specs,
};
pub use stimkit_host::{HeadlessHost, HostConfig};
pub use stimkit_timing::{HighPrecisionTimer, Scheduler, Timer, TimerQueue, VirtualTimer};

/// Builds the specs for `config` and runs them in order on `host`.
pub fn run_batch<T>(
    host: &HeadlessHost<T>,
    config: &BatchConfig,
) -> anyhow::Result<Vec<TrialResult>>
where
    T: Timer<Timestamp = u64> + 'static,
{
    let specs = build_trial_specs(config)?;
    host.run_timeline(specs)
}
