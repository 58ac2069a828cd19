pub mod clock;
pub mod config;
pub mod error;
pub mod message;
pub mod paths;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use message::{AgentCommand, AgentStatus};
pub use paths::Paths;
pub use types::{DomainSettings, ElectionRecord, NoteEntry};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
