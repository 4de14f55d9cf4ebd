//! Collaborator boundaries: the relational store and the blob store.

use super::domain::{
    BriefTemplate, NumberingKind, NumberingRecord, Provider, ProviderId, RecordFilter, RecordId,
    Sender, SenderId, Status, StatusId, TemplateId,
};
use crate::workflows::samples::{FinalizedSamples, SampleSet};

/// Keyed access to records, senders, providers, statuses, templates, and sample sets.
///
/// `upsert_record` assigns an identity when the record's id is unassigned. Implementations
/// backed by a unique index on `(kind, did)` report violations as [`StoreError::Conflict`].
pub trait ComplianceStore: Send + Sync {
    fn record(
        &self,
        kind: NumberingKind,
        id: RecordId,
    ) -> Result<Option<NumberingRecord>, StoreError>;
    fn find_records(
        &self,
        kind: NumberingKind,
        filter: &RecordFilter,
    ) -> Result<Vec<NumberingRecord>, StoreError>;
    fn upsert_record(&self, record: NumberingRecord) -> Result<NumberingRecord, StoreError>;

    fn sender(&self, id: SenderId) -> Result<Option<Sender>, StoreError>;
    fn provider(&self, id: ProviderId) -> Result<Option<Provider>, StoreError>;
    fn status(&self, id: StatusId) -> Result<Option<Status>, StoreError>;

    fn brief_template(&self, id: TemplateId) -> Result<Option<BriefTemplate>, StoreError>;
    fn find_brief_templates(&self, provider_id: ProviderId)
        -> Result<Vec<BriefTemplate>, StoreError>;
    fn upsert_brief_template(&self, template: BriefTemplate) -> Result<BriefTemplate, StoreError>;
    fn delete_brief_template(&self, id: TemplateId) -> Result<(), StoreError>;

    fn sample_set(
        &self,
        kind: NumberingKind,
        record_id: RecordId,
    ) -> Result<Option<SampleSet>, StoreError>;
    fn upsert_finalized_samples(
        &self,
        kind: NumberingKind,
        record_id: RecordId,
        samples: &FinalizedSamples,
    ) -> Result<(), StoreError>;
}

/// Error enumeration for store failures; messages are the store's own.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("store rejected the request: {0}")]
    Rejected(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Named binary objects grouped into buckets.
pub trait BlobStore: Send + Sync {
    fn upload(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), BlobError>;
    fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BlobError>;
    fn remove(&self, bucket: &str, key: &str) -> Result<(), BlobError>;
    fn list(&self, bucket: &str) -> Result<Vec<String>, BlobError>;
    fn public_url(&self, bucket: &str, key: &str) -> Result<String, BlobError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("object {bucket}/{key} not found")]
    NotFound { bucket: String, key: String },
    #[error("blob store unavailable: {0}")]
    Unavailable(String),
}
