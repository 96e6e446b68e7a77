pub mod config;
pub mod error;
pub mod generate;
pub mod git;
pub mod outcome;
pub mod paths;
pub mod pipeline;
pub mod policy;
pub mod publish;
pub mod trigger;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
pub use outcome::StepOutcome;
pub use pipeline::{Pipeline, PlanReport, RunOutcome, RunReport};
