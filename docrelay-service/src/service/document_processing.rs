//! Document processing workflows.
//!
//! One task is spawned per document at intake and runs the stages in order:
//! - Dispatch to the external processor
//! - Status polling until a terminal reply
//! - Page image download
//! - Text extraction into the durable OCR record
//!
//! Reclaim (delayed and periodic sweep) and read-only queries live here too.

mod cleanup;
mod dispatch;
mod extraction;
mod materialize;
mod polling;
mod processing;
mod queries;
mod upload;
mod workers;

pub use queries::DocumentStatusReport;
pub use workers::start_cleanup_sweeper;
