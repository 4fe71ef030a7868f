//! Repository layer
//!
//! Repositories abstract everything the relay reads from or writes to:
//! the local cursor/job tables and the two external systems (ledger and
//! secure compute service). They carry no business logic.
//!
//! All repositories are trait-based so services can be exercised against
//! in-memory or scripted implementations.

mod compute;
mod cursor;
mod job;
mod ledger;
mod signer;

#[cfg(test)]
pub mod fakes;
#[cfg(test)]
mod memory;

// Re-export traits
pub use compute::ComputeRepository;
pub use cursor::CursorRepository;
pub use job::JobRepository;
pub use ledger::LedgerRepository;

// Re-export implementations
pub use compute::HttpComputeRepository;
pub use cursor::PgCursorRepository;
pub use job::PgJobRepository;
#[cfg(test)]
pub use memory::{InMemoryCursorRepository, InMemoryJobRepository};
pub use ledger::SuiLedgerRepository;
pub use signer::OperatorKey;

// Re-export errors and call types
pub use compute::ComputeError;
pub use ledger::{CompleteJobCall, LedgerError, SubmissionReceipt};

/// Errors raised by the local cursor/job storage
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("value {value} does not fit column `{column}`")]
    OutOfRange { column: &'static str, value: u64 },

    #[error("corrupt row: {0}")]
    Corrupt(String),
}
