//! Scheduler layer for the relay
//!
//! Polls the ledger event log per tracked event type and hands new jobs to
//! the pipeline worker.

pub mod dispatcher;
pub mod poller;

pub use dispatcher::{PipelineDispatcher, PipelineWorker};
pub use poller::{EventHandler, EventPoller, EventTracker};
