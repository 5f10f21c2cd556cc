pub mod host;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use host::{
    Completion, DataSink, Display, HostError, ListenerId, ResponseCallback, ResponseSource,
};
pub use phase::TrialPhase;
pub use stimulus::{Element, RESPONDED_CLASS, STIMULUS_ELEMENT_ID, StimulusContent};
pub use trial::{Key, KeyChoice, NO_RESPONSE, ResponseInfo, Timing, TrialResult, TrialSpec};
