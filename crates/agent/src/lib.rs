pub mod presentation;
pub mod tab;

pub use presentation::{render_style, LogPresentation, Presentation, PresentationActivity};
pub use tab::{AgentHandle, AgentState, CommandRequest, TabAgent};
