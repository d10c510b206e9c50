//! Declarative multi-file reconciliation.
//!
//! Converges a branch to a declared set of files with one atomic commit.
//!
//! # Module Structure
//!
//! - [`types`] - `FileEntry`, `FileSet`, `Action`, `ReconciliationRequest`
//! - [`desired`] - Desired-State Extractor over the orchestrator record
//! - [`fetch`] - Observed-State Fetcher and Drift Reader
//! - [`diff`] - Set Differ / Action Classifier
//! - [`commit`] - Commit Action Builder & Submitter
//! - [`engine`] - [`Reconciler`], which runs the phases in order
//! - [`progress`] - Progress reporting: `ReconcileProgress`, `ProgressCallback`, `emit()`
//!
//! # Example
//!
//! ```ignore
//! use repofiles::reconcile::{CommitPhase, Reconciler, extract_desired};
//!
//! let desired = extract_desired(&record)?;
//! let outcome = Reconciler::new(&client)
//!     .apply(&desired, &Default::default(), CommitPhase::Initial)
//!     .await?;
//! println!("{}", outcome.id);
//! ```

pub mod commit;
pub mod desired;
pub mod diff;
pub mod engine;
mod error;
pub mod fetch;
mod progress;
pub mod types;

pub use commit::{CommitPhase, build_request, submit};
pub use desired::{FileBlock, FilesRecord, declared_paths, extract_desired, extract_target};
pub use diff::{ActionPlan, classify};
pub use engine::{Reconciler, Reconciliation};
pub use error::ReconcileError;
pub use fetch::{DriftReport, fetch_observed, read_drift};
pub use progress::{ProgressCallback, ReconcileProgress, emit};
pub use types::{
    Action, ActionKind, CommitTarget, DesiredState, FileEntry, FileSet, ReconciliationRequest,
};
