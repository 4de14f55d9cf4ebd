use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::config::{DidLockPolicy, LifecycleConfig};
use super::domain::{
    NumberingKind, NumberingRecord, ProviderId, RecordFilter, RecordId, RecordPatch, Sender,
    SenderId, StatusId,
};
use super::store::{BlobError, BlobStore, ComplianceStore, StoreError};
use super::validation::{check_length, normalize_did, validate_did, FieldViolation};
use crate::workflows::briefs::{BriefError, DocumentMergeEngine, RenderError, TemplateError};
use crate::workflows::generation::{GenerationError, TextGenerator};
use crate::workflows::samples::{FinalizedSamples, SampleCopyGenerator, SampleCopyPatch};

/// Source of audit timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Controller for the numbering record lifecycle and the generators hanging off it.
///
/// Collaborators are injected once; the controller never opens connections of its own.
pub struct NumberingLifecycle<S, B, G> {
    pub(super) store: Arc<S>,
    pub(super) blobs: Arc<B>,
    generator: Arc<G>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) config: LifecycleConfig,
    samples: SampleCopyGenerator<G>,
    pub(super) briefs: DocumentMergeEngine,
    record_guard: Mutex<()>,
}

impl<S, B, G> NumberingLifecycle<S, B, G>
where
    S: ComplianceStore + 'static,
    B: BlobStore + 'static,
    G: TextGenerator + 'static,
{
    pub fn new(store: Arc<S>, blobs: Arc<B>, generator: Arc<G>, config: LifecycleConfig) -> Self {
        Self::with_clock(store, blobs, generator, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<S>,
        blobs: Arc<B>,
        generator: Arc<G>,
        config: LifecycleConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let samples = SampleCopyGenerator::new(generator.clone(), config.generation);
        Self {
            store,
            blobs,
            generator,
            clock,
            config,
            samples,
            briefs: DocumentMergeEngine::new(),
            record_guard: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Create a record in status `New` for an existing sender.
    pub fn create(
        &self,
        kind: NumberingKind,
        sender_id: SenderId,
        initial_did: Option<&str>,
        actor: &str,
    ) -> Result<RecordId, LifecycleError> {
        let did = initial_did.and_then(normalize_did);
        if let Some(did) = &did {
            check_length("did", did, self.config.limits.text)?;
            validate_did(kind, did)?;
        }

        self.require_sender(sender_id)?;

        let _serialized = self.lock_records();
        if let Some(did) = &did {
            self.ensure_did_available(kind, did, None)?;
        }

        let record = NumberingRecord::draft(kind, sender_id, did, self.clock.now(), actor);
        let stored = self.store.upsert_record(record)?;
        info!(
            kind = kind.label(),
            record_id = stored.id.0,
            sender_id = sender_id.0,
            did = stored.did.as_deref().unwrap_or(""),
            "numbering record created"
        );
        Ok(stored.id)
    }

    /// Apply a partial update. Nothing is written when any field fails validation.
    pub fn update(
        &self,
        kind: NumberingKind,
        id: RecordId,
        patch: RecordPatch,
        actor: &str,
    ) -> Result<NumberingRecord, LifecycleError> {
        self.check_patch_lengths(&patch)?;

        let did_change = patch.did.as_deref().map(normalize_did);
        if let Some(Some(did)) = &did_change {
            validate_did(kind, did)?;
        }

        let _serialized = self.lock_records();
        let mut record = self.load(kind, id)?;

        if let Some(target) = did_change {
            self.apply_did_change(&mut record, target)?;
        }

        if let Some(provider_id) = patch.provider_id {
            self.require_provider_for(kind, provider_id)?;
            record.provider_id = Some(provider_id);
        }
        if let Some(campaign_id) = patch.campaign_id {
            record.campaign_id = non_empty(campaign_id);
        }
        if let Some(use_case) = patch.use_case {
            record.use_case = non_empty(use_case);
        }
        if let Some(notes) = patch.notes {
            record.notes = non_empty(notes);
        }

        let now = self.clock.now();
        if let Some(status_id) = patch.status_id {
            if self.store.status(status_id)?.is_none() {
                return Err(LifecycleError::not_found("status", status_id.0));
            }
            if status_id == StatusId::SUBMITTED && record.submitted_date.is_none() {
                let submitted = patch.submitted_on.unwrap_or_else(|| now.date_naive());
                record.submitted_date = Some(submitted);
                info!(record_id = id.0, %submitted, "submission date recorded");
            }
            if status_id != record.status_id {
                debug!(record_id = id.0, from = %record.status_id, to = %status_id, "status change");
            }
            record.status_id = status_id;
        }

        if record.status_id == StatusId::APPROVED && record.did.is_some() {
            record.did_locked = true;
        }

        record.stamp(now, actor);
        let stored = self.store.upsert_record(record)?;
        info!(kind = kind.label(), record_id = id.0, actor, "numbering record updated");
        Ok(stored)
    }

    pub fn get(&self, kind: NumberingKind, id: RecordId) -> Result<NumberingRecord, LifecycleError> {
        self.load(kind, id)
    }

    pub fn list_by_status(
        &self,
        kind: NumberingKind,
        status_id: StatusId,
    ) -> Result<Vec<NumberingRecord>, LifecycleError> {
        Ok(self
            .store
            .find_records(kind, &RecordFilter::by_status(status_id))?)
    }

    /// Draft a use-case description. The text is returned, never persisted.
    pub fn generate_use_case(
        &self,
        kind: NumberingKind,
        id: RecordId,
    ) -> Result<String, LifecycleError> {
        let record = self.load(kind, id)?;
        let sender = self.require_sender(record.sender_id)?;

        let prompt = use_case_prompt(kind, &sender);
        let settings = self.config.generation;
        let completion = self
            .generator
            .complete(&prompt, settings.max_tokens, settings.temperature)?;
        let completion = completion.trim();
        if completion.is_empty() {
            return Err(GenerationError::EmptyCompletion.into());
        }

        debug!(record_id = id.0, chars = completion.len(), "use case drafted");
        Ok(completion.to_string())
    }

    pub fn commit_use_case(
        &self,
        kind: NumberingKind,
        id: RecordId,
        text: &str,
        actor: &str,
    ) -> Result<NumberingRecord, LifecycleError> {
        check_length("use_case", text, self.config.limits.use_case)?;
        self.restamp(kind, id, actor, |record| {
            record.use_case = non_empty(text.to_string());
        })
    }

    /// Rewrite the initial samples through the text generator and persist the result.
    pub fn generate_sample_copies(
        &self,
        kind: NumberingKind,
        id: RecordId,
        actor: &str,
    ) -> Result<FinalizedSamples, LifecycleError> {
        let record = self.load(kind, id)?;
        let sender = self.require_sender(record.sender_id)?;
        let initial = self
            .store
            .sample_set(kind, id)?
            .and_then(|set| set.initial)
            .ok_or_else(|| LifecycleError::not_found("initial samples for record", id.0))?;

        let copies = self
            .samples
            .generate(&initial, &sender.sms_bindings(), &sender.brand)?;
        self.store.upsert_finalized_samples(kind, id, &copies)?;
        self.restamp(kind, id, actor, |_| {})?;

        info!(kind = kind.label(), record_id = id.0, "sample copies generated");
        Ok(copies)
    }

    /// Overwrite only the provided finalized slots.
    pub fn edit_sample_copies(
        &self,
        kind: NumberingKind,
        id: RecordId,
        patch: SampleCopyPatch,
        actor: &str,
    ) -> Result<FinalizedSamples, LifecycleError> {
        for (field, value) in patch.provided() {
            check_length(field, value, self.config.limits.sample_copy)?;
        }

        self.load(kind, id)?;
        let current = self
            .store
            .sample_set(kind, id)?
            .and_then(|set| set.finalized)
            .unwrap_or_default();
        let merged = patch.apply(current);

        self.store.upsert_finalized_samples(kind, id, &merged)?;
        self.restamp(kind, id, actor, |_| {})?;
        Ok(merged)
    }

    pub(super) fn load(
        &self,
        kind: NumberingKind,
        id: RecordId,
    ) -> Result<NumberingRecord, LifecycleError> {
        self.store
            .record(kind, id)?
            .ok_or_else(|| LifecycleError::not_found(kind_entity(kind), id.0))
    }

    pub(super) fn require_sender(&self, id: SenderId) -> Result<Sender, LifecycleError> {
        self.store
            .sender(id)?
            .ok_or_else(|| LifecycleError::not_found("sender", id.0))
    }

    pub(super) fn require_provider_for(
        &self,
        kind: NumberingKind,
        id: ProviderId,
    ) -> Result<(), LifecycleError> {
        let provider = self
            .store
            .provider(id)?
            .ok_or_else(|| LifecycleError::not_found("provider", id.0))?;
        if !provider.serves(kind) {
            return Err(FieldViolation::ProviderKindMismatch {
                provider: id,
                kind: kind.label(),
            }
            .into());
        }
        Ok(())
    }

    /// Reload the stored record, apply `change`, and stamp the audit fields.
    ///
    /// Operations that do slow work between reading and writing a record go through here, so
    /// concurrent updates made in the meantime are kept.
    pub(super) fn restamp(
        &self,
        kind: NumberingKind,
        id: RecordId,
        actor: &str,
        change: impl FnOnce(&mut NumberingRecord),
    ) -> Result<NumberingRecord, LifecycleError> {
        let _serialized = self.lock_records();
        let mut record = self.load(kind, id)?;
        change(&mut record);
        record.stamp(self.clock.now(), actor);
        Ok(self.store.upsert_record(record)?)
    }

    fn check_patch_lengths(&self, patch: &RecordPatch) -> Result<(), FieldViolation> {
        let limits = self.config.limits;
        let fields = [
            ("did", patch.did.as_deref(), limits.text),
            ("campaign_id", patch.campaign_id.as_deref(), limits.text),
            ("use_case", patch.use_case.as_deref(), limits.use_case),
            ("notes", patch.notes.as_deref(), limits.notes),
        ];
        for (field, value, max) in fields {
            if let Some(value) = value {
                check_length(field, value, max)?;
            }
        }
        Ok(())
    }

    fn apply_did_change(
        &self,
        record: &mut NumberingRecord,
        target: Option<String>,
    ) -> Result<(), LifecycleError> {
        if target == record.did {
            return Ok(());
        }

        if record.did_is_locked() {
            return match self.config.did_lock {
                DidLockPolicy::Ignore => {
                    warn!(
                        record_id = record.id.0,
                        stored = record.did.as_deref().unwrap_or(""),
                        requested = target.as_deref().unwrap_or(""),
                        "did is locked; change dropped"
                    );
                    Ok(())
                }
                DidLockPolicy::Reject => Err(LifecycleError::Conflict(format!(
                    "did on {} record {} is locked",
                    record.kind.label(),
                    record.id.0
                ))),
            };
        }

        if let Some(did) = &target {
            self.ensure_did_available(record.kind, did, Some(record.id))?;
        }
        record.did = target;
        Ok(())
    }

    fn ensure_did_available(
        &self,
        kind: NumberingKind,
        did: &str,
        owner: Option<RecordId>,
    ) -> Result<(), LifecycleError> {
        let holders = self.store.find_records(kind, &RecordFilter::by_did(did))?;
        match holders.iter().find(|holder| Some(holder.id) != owner) {
            Some(holder) => Err(LifecycleError::Conflict(format!(
                "did {did} is already assigned to {} record {}",
                kind.label(),
                holder.id.0
            ))),
            None => Ok(()),
        }
    }

    /// Serializes read-modify-write cycles on records, including DID uniqueness checks.
    fn lock_records(&self) -> MutexGuard<'_, ()> {
        self.record_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn kind_entity(kind: NumberingKind) -> &'static str {
    match kind {
        NumberingKind::TenDlc => "10dlc record",
        NumberingKind::TollFree => "toll-free record",
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn use_case_prompt(kind: NumberingKind, sender: &Sender) -> String {
    let verticals = if sender.verticals.is_empty() {
        "general business messaging".to_string()
    } else {
        sender.verticals.join(", ")
    };
    let channel = match kind {
        NumberingKind::TenDlc => "a 10DLC campaign",
        NumberingKind::TollFree => "a toll-free number verification",
    };
    format!(
        "Write a carrier compliance use-case description for {channel}.\n\
         Brand: {}\nCompany: {}\nIndustry verticals: {verticals}\n\
         Describe who receives the messages, how recipients opt in, what the messages contain, \
         and how recipients opt out. Answer in one plain paragraph.",
        sender.brand, sender.company
    )
}

/// Failure returned by every [`NumberingLifecycle`] operation.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("validation failed: {0}")]
    Validation(#[from] FieldViolation),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Template(TemplateError),
    #[error(transparent)]
    Render(RenderError),
    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Blob(BlobError),
}

impl LifecycleError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LifecycleError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleError::Validation(_) => "validation",
            LifecycleError::Conflict(_) => "conflict",
            LifecycleError::NotFound { .. } => "not_found",
            LifecycleError::Generation(_) => "generation",
            LifecycleError::Template(_) => "template",
            LifecycleError::Render(_) => "render",
            LifecycleError::Store(_) | LifecycleError::Blob(_) => "collaborator",
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict(message) => LifecycleError::Conflict(message),
            other => LifecycleError::Store(other),
        }
    }
}

impl From<BlobError> for LifecycleError {
    fn from(error: BlobError) -> Self {
        match error {
            BlobError::NotFound { bucket, key } => LifecycleError::NotFound {
                entity: "blob",
                id: format!("{bucket}/{key}"),
            },
            other => LifecycleError::Blob(other),
        }
    }
}

impl From<BriefError> for LifecycleError {
    fn from(error: BriefError) -> Self {
        match error {
            BriefError::Template(error) => LifecycleError::Template(error),
            BriefError::Render(error) => LifecycleError::Render(error),
        }
    }
}

impl From<TemplateError> for LifecycleError {
    fn from(error: TemplateError) -> Self {
        LifecycleError::Template(error)
    }
}
