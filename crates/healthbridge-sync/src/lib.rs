//! Healthbridge Sync - Background synchronization engine
//!
//! Provides:
//! - The per-user sync attempt: recency gate, availability, concurrent
//!   reads, snapshot and connection upserts
//! - Connect / disconnect flows that own the connection row
//! - Registration of the periodic background task and its handler
//! - An in-process task scheduler for hosts without one
//!
//! ## Modules
//!
//! - [`orchestrator`] - [`SyncOrchestrator`], one attempt per call
//! - [`background`] - [`BackgroundSync`], task registration and outcome mapping
//! - [`scheduler`] - [`TokioTaskScheduler`], `ITaskScheduler` on tokio intervals

pub mod background;
pub mod orchestrator;
pub mod scheduler;

pub use background::BackgroundSync;
pub use orchestrator::{SyncOrchestrator, SyncRequest};
pub use scheduler::TokioTaskScheduler;

use thiserror::Error;

use healthbridge_core::ports::StoreError;

/// Errors surfaced by the connect/disconnect flows and task registration
///
/// A sync attempt itself never fails; it reports a
/// [`SyncResult`](healthbridge_core::domain::SyncResult) instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No user id was given and nobody is signed in
    #[error("no authenticated user")]
    NotAuthenticated,

    /// The permission negotiation did not grant step reads
    #[error("health permissions not granted: {0}")]
    PermissionNotGranted(String),

    /// The metrics store rejected a read or write
    #[error("metrics store error: {0}")]
    Store(#[from] StoreError),

    /// The host scheduler rejected a registration request
    #[error("task scheduler error: {0}")]
    Scheduler(#[source] anyhow::Error),
}
