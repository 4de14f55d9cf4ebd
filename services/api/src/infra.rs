use metrics_exporter_prometheus::PrometheusHandle;
use sender_compliance::workflows::numbering::{
    BlobError, BlobStore, BriefTemplate, ComplianceStore, NumberingKind, NumberingRecord,
    Provider, ProviderId, RecordFilter, RecordId, Sender, SenderAddress, SenderId, Status,
    StatusId, StoreError, TemplateId,
};
use sender_compliance::workflows::samples::{FinalizedSamples, InitialSamples, SampleSet};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct StoreTables {
    records: BTreeMap<(NumberingKind, RecordId), NumberingRecord>,
    senders: HashMap<SenderId, Sender>,
    providers: HashMap<ProviderId, Provider>,
    statuses: HashMap<StatusId, Status>,
    templates: BTreeMap<TemplateId, BriefTemplate>,
    samples: HashMap<(NumberingKind, RecordId), SampleSet>,
    next_record: u64,
    next_template: u64,
}

/// Process-local store used by the demo server; enforces the `(kind, did)` unique index.
#[derive(Default, Clone)]
pub(crate) struct InMemoryComplianceStore {
    tables: Arc<Mutex<StoreTables>>,
}

impl InMemoryComplianceStore {
    fn tables(&self) -> Result<MutexGuard<'_, StoreTables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))
    }

    /// Canonical statuses, one provider per numbering kind, and a demo sender with samples.
    pub(crate) fn seeded() -> Self {
        let mut tables = StoreTables::default();

        for id in [
            StatusId::NEW,
            StatusId::IN_REVIEW,
            StatusId::APPROVED,
            StatusId::SUBMITTED,
            StatusId::LIVE,
        ] {
            let label = id.canonical_label().unwrap_or_default().to_string();
            tables.statuses.insert(id, Status { id, label });
        }

        for provider in [
            Provider {
                id: ProviderId(1),
                name: "Toll-Free Messaging Registry".to_string(),
                kinds: vec![NumberingKind::TollFree],
            },
            Provider {
                id: ProviderId(2),
                name: "Campaign Registry".to_string(),
                kinds: vec![NumberingKind::TenDlc],
            },
        ] {
            tables.providers.insert(provider.id, provider);
        }

        let sender = demo_sender();
        tables.senders.insert(sender.id, sender);

        Self {
            tables: Arc::new(Mutex::new(tables)),
        }
    }

    /// Initial samples are provisioned with the sender, so the demo store hands them out to
    /// every record that has none yet.
    fn samples_or_seed(
        tables: &mut StoreTables,
        kind: NumberingKind,
        record_id: RecordId,
    ) -> Option<SampleSet> {
        if !tables.records.contains_key(&(kind, record_id)) {
            return tables.samples.get(&(kind, record_id)).cloned();
        }
        let set = tables.samples.entry((kind, record_id)).or_default();
        if set.initial.is_none() {
            set.initial = Some(demo_samples());
        }
        Some(set.clone())
    }
}

fn demo_sender() -> Sender {
    Sender {
        id: SenderId(1),
        sender: "Acme Alerts".to_string(),
        brand: "Acme".to_string(),
        short_url: Some("acme.ly".to_string()),
        company: "Acme Holdings LLC".to_string(),
        address: SenderAddress {
            street: "100 Market St".to_string(),
            city: "Des Moines".to_string(),
            state: "IA".to_string(),
            postal_code: "50309".to_string(),
        },
        cta: Some("Text JOIN to subscribe".to_string()),
        terms_url: Some("https://acme.example/terms".to_string()),
        privacy_url: Some("https://acme.example/privacy".to_string()),
        verticals: vec!["Retail".to_string()],
    }
}

fn demo_samples() -> InitialSamples {
    InitialSamples {
        sample1: "Hi from [brand]! Your order has shipped. Reply STOP to opt out.".to_string(),
        sample2: "[brand]: this week's deals are live at [shorturl]. Reply STOP to opt out."
            .to_string(),
        sample3: "Thanks for joining [brand] alerts. Terms: [terms]".to_string(),
    }
}

impl ComplianceStore for InMemoryComplianceStore {
    fn record(
        &self,
        kind: NumberingKind,
        id: RecordId,
    ) -> Result<Option<NumberingRecord>, StoreError> {
        Ok(self.tables()?.records.get(&(kind, id)).cloned())
    }

    fn find_records(
        &self,
        kind: NumberingKind,
        filter: &RecordFilter,
    ) -> Result<Vec<NumberingRecord>, StoreError> {
        Ok(self
            .tables()?
            .records
            .values()
            .filter(|record| record.kind == kind && filter.matches(record))
            .cloned()
            .collect())
    }

    fn upsert_record(&self, mut record: NumberingRecord) -> Result<NumberingRecord, StoreError> {
        let mut tables = self.tables()?;
        if let Some(did) = record.did.as_deref() {
            let duplicate = tables.records.values().any(|other| {
                other.kind == record.kind && other.id != record.id && other.did.as_deref() == Some(did)
            });
            if duplicate {
                return Err(StoreError::Conflict(format!(
                    "did {did} already exists for {}",
                    record.kind.label()
                )));
            }
        }
        if !record.is_persisted() {
            tables.next_record += 1;
            record.id = RecordId(tables.next_record);
        }
        tables
            .records
            .insert((record.kind, record.id), record.clone());
        Ok(record)
    }

    fn sender(&self, id: SenderId) -> Result<Option<Sender>, StoreError> {
        Ok(self.tables()?.senders.get(&id).cloned())
    }

    fn provider(&self, id: ProviderId) -> Result<Option<Provider>, StoreError> {
        Ok(self.tables()?.providers.get(&id).cloned())
    }

    fn status(&self, id: StatusId) -> Result<Option<Status>, StoreError> {
        Ok(self.tables()?.statuses.get(&id).cloned())
    }

    fn brief_template(&self, id: TemplateId) -> Result<Option<BriefTemplate>, StoreError> {
        Ok(self.tables()?.templates.get(&id).cloned())
    }

    fn find_brief_templates(
        &self,
        provider_id: ProviderId,
    ) -> Result<Vec<BriefTemplate>, StoreError> {
        Ok(self
            .tables()?
            .templates
            .values()
            .filter(|template| template.provider_id == provider_id)
            .cloned()
            .collect())
    }

    fn upsert_brief_template(
        &self,
        mut template: BriefTemplate,
    ) -> Result<BriefTemplate, StoreError> {
        let mut tables = self.tables()?;
        if template.id == TemplateId(0) {
            tables.next_template += 1;
            template.id = TemplateId(tables.next_template);
        }
        tables.templates.insert(template.id, template.clone());
        Ok(template)
    }

    fn delete_brief_template(&self, id: TemplateId) -> Result<(), StoreError> {
        self.tables()?.templates.remove(&id);
        Ok(())
    }

    fn sample_set(
        &self,
        kind: NumberingKind,
        record_id: RecordId,
    ) -> Result<Option<SampleSet>, StoreError> {
        let mut tables = self.tables()?;
        Ok(Self::samples_or_seed(&mut tables, kind, record_id))
    }

    fn upsert_finalized_samples(
        &self,
        kind: NumberingKind,
        record_id: RecordId,
        samples: &FinalizedSamples,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        tables.samples.entry((kind, record_id)).or_default().finalized = Some(samples.clone());
        Ok(())
    }
}

/// Bucketed object map standing in for the hosted blob store.
#[derive(Default, Clone)]
pub(crate) struct InMemoryBlobStore {
    objects: Arc<Mutex<BTreeMap<(String, String), Vec<u8>>>>,
    public_base: String,
}

impl InMemoryBlobStore {
    pub(crate) fn new(public_base: impl Into<String>) -> Self {
        Self {
            objects: Arc::default(),
            public_base: public_base.into(),
        }
    }

    fn objects(&self) -> Result<MutexGuard<'_, BTreeMap<(String, String), Vec<u8>>>, BlobError> {
        self.objects
            .lock()
            .map_err(|_| BlobError::Unavailable("blob mutex poisoned".to_string()))
    }
}

fn not_found(bucket: &str, key: &str) -> BlobError {
    BlobError::NotFound {
        bucket: bucket.to_string(),
        key: key.to_string(),
    }
}

impl BlobStore for InMemoryBlobStore {
    fn upload(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), BlobError> {
        self.objects()?
            .insert((bucket.to_string(), key.to_string()), bytes.to_vec());
        Ok(())
    }

    fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BlobError> {
        self.objects()?
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| not_found(bucket, key))
    }

    fn remove(&self, bucket: &str, key: &str) -> Result<(), BlobError> {
        self.objects()?
            .remove(&(bucket.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found(bucket, key))
    }

    fn list(&self, bucket: &str) -> Result<Vec<String>, BlobError> {
        Ok(self
            .objects()?
            .keys()
            .filter(|(owner, _)| owner == bucket)
            .map(|(_, key)| key.clone())
            .collect())
    }

    fn public_url(&self, bucket: &str, key: &str) -> Result<String, BlobError> {
        if !self.objects()?.contains_key(&(bucket.to_string(), key.to_string())) {
            return Err(not_found(bucket, key));
        }
        Ok(format!(
            "{}/{bucket}/{key}",
            self.public_base.trim_end_matches('/')
        ))
    }
}
