pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::ParleyConfig;
pub use error::{ParleyError, Result};
pub use events::{EventBus, SessionEvent};
pub use types::*;
