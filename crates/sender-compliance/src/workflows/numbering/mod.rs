//! 10DLC and toll-free numbering records: lifecycle rules, sample copies, and carrier briefs.

pub mod brief_bindings;
mod briefing;
pub mod config;
pub mod domain;
pub mod lifecycle;
pub mod router;
pub mod store;
pub mod validation;

#[cfg(test)]
mod tests;

pub use brief_bindings::{brief_bindings, BriefContext, FIXED_BRIEF_KEYS};
pub use config::{DidLockPolicy, FieldLimits, LifecycleConfig, StorageBuckets};
pub use domain::{
    BriefArtifact, BriefTemplate, BriefTemplateDraft, NumberingKind, NumberingRecord, Provider,
    ProviderId, RecordFilter, RecordId, RecordPatch, Sender, SenderAddress, SenderId, Status,
    StatusId, TemplateId,
};
pub use lifecycle::{Clock, LifecycleError, NumberingLifecycle, SystemClock};
pub use router::numbering_router;
pub use store::{BlobError, BlobStore, ComplianceStore, StoreError};
pub use validation::FieldViolation;
