//! Service Module
//!
//! Business logic of the relay: event ingestion, the training pipeline and
//! result encoding. Services only talk to the outside world through
//! repositories.

pub mod encoding;
pub mod ingestion;
pub mod pipeline;

pub use ingestion::JobCreatedHandler;
pub use pipeline::{PipelineError, TrainingPipeline};
