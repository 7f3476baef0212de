//! Attachment ownership and orphan reclamation.
//!
//! An uploaded receipt passes through three states: *pending* (registered in
//! the ownership ledger but not yet attached to an expense), *attached*
//! (referenced by an expense's attachment field, which is the durable claim),
//! and *reclaimed* (deleted once nothing references it and it has aged past
//! the retention window). [`AttachmentService`] owns the first two
//! transitions; the sweep in [`sweep`] owns the last.

pub mod config;
pub mod error;
pub mod service;
pub mod sweep;
pub mod worker;

pub use config::AttachmentConfig;
pub use error::AttachmentError;
pub use service::AttachmentService;
pub use sweep::SweepReport;
pub use worker::{SweepWorker, SweepWorkerConfig};
