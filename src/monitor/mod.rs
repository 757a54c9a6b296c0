pub mod engine;
pub mod events;
mod poller;

pub use engine::{EngineSettings, EngineStatus, MonitorEngine, MonitorRules, StartOutcome, StopOutcome};
pub use events::{EventBus, MonitorEvent};
