pub mod model;
pub mod types;

pub use model::{build_alert, compose};
pub use types::{AnalysisResult, RiskThresholds, SecurityAlert};
