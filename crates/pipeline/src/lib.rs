//! Pipeline orchestration: stage state machines, job polling, and the
//! orchestrator that ties them to the render providers.

pub mod cache;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod poller;
pub mod run;
pub mod snapshot;
pub mod stage;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use events::PipelineEvent;
pub use orchestrator::PipelineOrchestrator;
pub use snapshot::PipelineSnapshot;
