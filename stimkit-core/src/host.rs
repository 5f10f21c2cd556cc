//! Services a trial consumes from the surrounding host.
//!
//! Every trait takes `&self`: implementations are shared between the
//! controller and the callbacks it registers, so they keep their own state
//! behind interior mutability. Implementations must not hold internal
//! borrows while invoking a callback.

use crate::stimulus::Element;
use crate::trial::{KeyChoice, ResponseInfo, TrialResult};
use thiserror::Error;

/// Failure reported by a host service.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("display error: {0}")]
    Display(String),

    #[error("data sink rejected trial result: {0}")]
    Sink(String),

    #[error("host failed to advance after trial: {0}")]
    Completion(String),

    #[error("trial suspended with no pending events")]
    Stalled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Handle for a registered response listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

/// Invoked for every accepted key press. Errors are returned to whoever
/// dispatched the key.
pub type ResponseCallback = Box<dyn FnMut(ResponseInfo) -> Result<(), HostError>>;

/// Surface the stimulus is drawn on.
pub trait Display {
    fn append(&self, element: Element) -> Result<(), HostError>;

    /// Hides the element with `id`. A missing element is not an error.
    fn set_hidden(&self, id: &str) -> Result<(), HostError>;

    /// Adds a style class to the element with `id`. A missing element is not
    /// an error.
    fn add_class(&self, id: &str, class: &str) -> Result<(), HostError>;

    fn clear(&self) -> Result<(), HostError>;
}

/// Keyboard-response primitive. The host measures reaction time from the
/// moment `listen` is called.
pub trait ResponseSource {
    fn listen(&self, choices: &KeyChoice, on_response: ResponseCallback) -> ListenerId;

    /// Cancelling an unknown or already spent listener is a no-op.
    fn cancel(&self, id: ListenerId);
}

/// Receives the one result each trial writes.
pub trait DataSink {
    fn record(&self, result: TrialResult) -> Result<(), HostError>;
}

/// Signal that the current trial is over and the host may move on.
pub trait Completion {
    fn trial_finished(&self) -> Result<(), HostError>;
}
