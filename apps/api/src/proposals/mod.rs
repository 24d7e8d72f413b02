//! Proposal workflow: uploads, analysis, artifacts and the proposal checklist.

pub mod handlers;
pub mod locks;
pub mod service;

pub use service::{ProposalService, UploadedFile};
