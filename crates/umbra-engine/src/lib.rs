//! Reconciliation engine for the mirror: one handler per inbound event
//! kind, the journal renderers they share, the audit trail, and the
//! listener shell tying restore, event loop, and snapshot together.

mod audit;
mod reconciler;
mod render;
mod service;

pub use audit::AuditTrail;
pub use reconciler::Reconciler;
pub use service::MirrorService;
