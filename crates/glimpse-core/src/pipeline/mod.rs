//! Pipeline stages.
//!
//! - **scanner**: Find image files under a root directory
//! - **thumbnail**: Fingerprint-named thumbnail cache
//! - **reconcile**: Split a scan into reusable and to-be-processed records
//! - **pool**: Blocking worker pool with per-item isolation
//! - **job**: Thumbnail then classify, for one image
//! - **orchestrator**: Runs the stages and persists the result

pub mod job;
pub mod orchestrator;
pub mod pool;
pub mod reconcile;
pub mod scanner;
pub mod thumbnail;

pub use job::ImageJob;
pub use orchestrator::{Pipeline, ProgressCallback};
pub use pool::WorkerPool;
pub use reconcile::{Reconciler, Reconciliation};
pub use scanner::Scanner;
pub use thumbnail::{Thumbnail, ThumbnailCache, ThumbnailOutcome};
