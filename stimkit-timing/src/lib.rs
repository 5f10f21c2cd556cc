pub mod scheduler;
pub mod timer;

pub use scheduler::{Scheduler, TimerCallback, TimerId, TimerQueue};
pub use timer::{HighPrecisionTimer, Timer, VirtualTimer};
