//! Brief rendering and template publication on top of the lifecycle controller.

use std::fmt::Display;

use tracing::{info, warn};

use super::brief_bindings::{brief_bindings, BriefContext};
use super::domain::{
    BriefArtifact, BriefTemplate, BriefTemplateDraft, NumberingKind, NumberingRecord, RecordId,
    TemplateId,
};
use super::lifecycle::{LifecycleError, NumberingLifecycle};
use super::store::{BlobError, BlobStore, ComplianceStore};
use crate::workflows::briefs::brief_file_name;
use crate::workflows::generation::TextGenerator;
use crate::workflows::placeholders::Bindings;

impl<S, B, G> NumberingLifecycle<S, B, G>
where
    S: ComplianceStore + 'static,
    B: BlobStore + 'static,
    G: TextGenerator + 'static,
{
    /// Render the carrier brief for a record and return the DOCX bytes. Nothing is stored.
    pub fn generate_brief(
        &self,
        kind: NumberingKind,
        id: RecordId,
    ) -> Result<Vec<u8>, LifecycleError> {
        let record = self.load(kind, id)?;
        self.render_brief(&record)
    }

    /// Render, upload, and attach a brief to its record. The upload only happens after a
    /// complete merge.
    pub fn publish_brief(
        &self,
        kind: NumberingKind,
        id: RecordId,
        actor: &str,
    ) -> Result<BriefArtifact, LifecycleError> {
        let record = self.load(kind, id)?;
        let document = self.render_brief(&record)?;

        let bucket = &self.config.buckets.briefs;
        let key = brief_file_name(id.0, self.clock.now());
        self.blobs.upload(bucket, &key, &document)?;
        let url = self.blobs.public_url(bucket, &key)?;

        self.restamp(kind, id, actor, |record| record.brief = Some(key.clone()))?;

        info!(kind = kind.label(), record_id = id.0, %key, bytes = document.len(), "brief published");
        Ok(BriefArtifact {
            record_id: id,
            key,
            url,
        })
    }

    /// Validate and store a new template binary for a provider.
    pub fn publish_template(
        &self,
        draft: BriefTemplateDraft,
        template: &[u8],
    ) -> Result<BriefTemplate, LifecycleError> {
        self.require_provider_for(draft.did_type, draft.provider_id)?;
        let discovered = self.briefs.placeholders(template)?;

        let mut placeholders = draft.placeholders;
        for token in discovered {
            if !placeholders.contains(&token) {
                placeholders.push(token);
            }
        }

        let key = format!(
            "template-{}-{}.docx",
            draft.provider_id.0,
            self.clock.now().timestamp_millis()
        );
        self.blobs
            .upload(&self.config.buckets.templates, &key, template)?;

        let stored = self.store.upsert_brief_template(BriefTemplate {
            id: TemplateId(0),
            provider_id: draft.provider_id,
            did_type: draft.did_type,
            blob_key: key,
            placeholders,
            format_version: draft.format_version,
            description: draft.description,
        })?;
        info!(
            template_id = stored.id.0,
            provider_id = stored.provider_id.0,
            placeholders = stored.placeholders.len(),
            "brief template published"
        );
        Ok(stored)
    }

    /// Delete a template row and its binary.
    pub fn retire_template(&self, id: TemplateId) -> Result<(), LifecycleError> {
        let template = self
            .store
            .brief_template(id)?
            .ok_or_else(|| LifecycleError::not_found("brief template", id.0))?;

        self.store.delete_brief_template(id)?;
        match self
            .blobs
            .remove(&self.config.buckets.templates, &template.blob_key)
        {
            Ok(()) => {}
            Err(BlobError::NotFound { key, .. }) => {
                warn!(template_id = id.0, %key, "template binary already gone");
            }
            Err(other) => return Err(other.into()),
        }

        info!(template_id = id.0, "brief template retired");
        Ok(())
    }

    fn render_brief(&self, record: &NumberingRecord) -> Result<Vec<u8>, LifecycleError> {
        let template = self.template_for(record)?;
        let binary = self
            .blobs
            .download(&self.config.buckets.templates, &template.blob_key)?;
        let bindings = self.assemble_bindings(record, &template);
        Ok(self.briefs.merge(&binary, &bindings)?)
    }

    fn template_for(&self, record: &NumberingRecord) -> Result<BriefTemplate, LifecycleError> {
        let missing = || LifecycleError::not_found("brief template for record", record.id.0);
        let provider_id = record.provider_id.ok_or_else(missing)?;
        self.store
            .find_brief_templates(provider_id)?
            .into_iter()
            .next()
            .ok_or_else(missing)
    }

    fn assemble_bindings(&self, record: &NumberingRecord, template: &BriefTemplate) -> Bindings {
        let sender = lenient("sender", record.id, self.store.sender(record.sender_id));
        let provider = match record.provider_id {
            Some(provider_id) => lenient("provider", record.id, self.store.provider(provider_id)),
            None => None,
        };
        let status = lenient("status", record.id, self.store.status(record.status_id));
        let samples = lenient(
            "sample set",
            record.id,
            self.store.sample_set(record.kind, record.id),
        );

        let context = BriefContext {
            record,
            sender: sender.as_ref(),
            provider: provider.as_ref(),
            status: status.as_ref(),
            samples: samples.as_ref(),
            today: self.clock.now().date_naive(),
        };
        brief_bindings(&context, &template.placeholders)
    }
}

/// Brief bindings degrade to empty values when a lookup fails.
fn lenient<T, E: Display>(what: &str, record_id: RecordId, fetched: Result<Option<T>, E>) -> Option<T> {
    match fetched {
        Ok(Some(value)) => Some(value),
        Ok(None) => {
            warn!(record_id = record_id.0, what, "brief lookup missing; binding empty values");
            None
        }
        Err(error) => {
            warn!(record_id = record_id.0, what, %error, "brief lookup failed; binding empty values");
            None
        }
    }
}
