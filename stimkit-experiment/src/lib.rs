pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod trial;
pub use config::{BatchConfig, ConfigError, Param, build_trial_specs};
pub use error::TrialError;
pub use services::{HostServices, HostServicesBuilder};
pub use state::TrialController;
pub use trial::EndReason;
