pub mod display;
pub mod keyboard;
pub mod logging;
pub mod store;
pub mod timeline;

pub use display::{DisplayEvent, Node, Surface};
pub use keyboard::Keyboard;
pub use store::{DataStore, Progress};
pub use timeline::{HeadlessHost, HostConfig};
