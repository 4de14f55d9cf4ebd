use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io::{Cursor, Write};
use std::sync::{mpsc, Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::workflows::briefs::{TemplateArchive, ZipTemplateArchive, DOCUMENT_BODY};
use crate::workflows::generation::{GenerationError, TextGenerator};
use crate::workflows::numbering::{
    BlobError, BlobStore, BriefTemplate, Clock, ComplianceStore, LifecycleConfig, NumberingKind,
    NumberingLifecycle, NumberingRecord, Provider, ProviderId, RecordFilter, RecordId, Sender,
    SenderAddress, SenderId, Status, StatusId, StoreError, TemplateId,
};
use crate::workflows::samples::{FinalizedSamples, InitialSamples, SampleSet};

pub(super) const ACME: SenderId = SenderId(1);
pub(super) const GLOBEX: SenderId = SenderId(2);
pub(super) const TOLL_FREE_CARRIER: ProviderId = ProviderId(10);
pub(super) const LOCAL_CARRIER: ProviderId = ProviderId(11);
pub(super) const TOLL_FREE_DID: &str = "+18005551234";

pub(super) type TestLifecycle = NumberingLifecycle<MemoryStore, MemoryBlobs, ScriptedGenerator>;

pub(super) fn acme() -> Sender {
    Sender {
        id: ACME,
        sender: "Acme Alerts".to_string(),
        brand: "Acme".to_string(),
        short_url: Some("acme.ly".to_string()),
        company: "Acme Holdings LLC".to_string(),
        address: SenderAddress {
            street: "1 Main St".to_string(),
            city: "Des Moines".to_string(),
            state: "IA".to_string(),
            postal_code: "50309".to_string(),
        },
        cta: Some("Text JOIN to 800-555-1234".to_string()),
        terms_url: Some("https://acme.example/terms".to_string()),
        privacy_url: Some("https://acme.example/privacy".to_string()),
        verticals: vec!["Retail".to_string(), "Loyalty".to_string()],
    }
}

pub(super) fn globex() -> Sender {
    Sender {
        id: GLOBEX,
        sender: "Globex".to_string(),
        brand: "Globex".to_string(),
        short_url: None,
        company: "Globex Corp".to_string(),
        address: SenderAddress::default(),
        cta: None,
        terms_url: None,
        privacy_url: None,
        verticals: Vec::new(),
    }
}

pub(super) fn initial_samples() -> InitialSamples {
    InitialSamples {
        sample1: "Hi [brand]!".to_string(),
        sample2: "Visit [shorturl]".to_string(),
        sample3: "Thanks".to_string(),
    }
}

pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 15, 30, 0)
        .single()
        .expect("valid timestamp")
}

#[derive(Default)]
pub(super) struct StoreState {
    pub(super) records: BTreeMap<(NumberingKind, RecordId), NumberingRecord>,
    pub(super) senders: HashMap<SenderId, Sender>,
    pub(super) providers: HashMap<ProviderId, Provider>,
    pub(super) statuses: HashMap<StatusId, Status>,
    pub(super) templates: BTreeMap<TemplateId, BriefTemplate>,
    pub(super) samples: HashMap<(NumberingKind, RecordId), SampleSet>,
    pub(super) next_id: u64,
    pub(super) writes: usize,
    pub(super) sender_lookups_fail: bool,
}

/// In-memory store with a unique `(kind, did)` index, like the production schema.
#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    pub(super) state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub(super) fn seeded() -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock().expect("store mutex poisoned");
            for sender in [acme(), globex()] {
                state.senders.insert(sender.id, sender);
            }
            state.providers.insert(
                TOLL_FREE_CARRIER,
                Provider {
                    id: TOLL_FREE_CARRIER,
                    name: "Tollway Carrier".to_string(),
                    kinds: vec![NumberingKind::TollFree],
                },
            );
            state.providers.insert(
                LOCAL_CARRIER,
                Provider {
                    id: LOCAL_CARRIER,
                    name: "Local Carrier".to_string(),
                    kinds: vec![NumberingKind::TenDlc],
                },
            );
            for id in 1..=5 {
                let id = StatusId(id);
                let label = id.canonical_label().unwrap_or("Other").to_string();
                state.statuses.insert(id, Status { id, label });
            }
        }
        store
    }

    pub(super) fn put_initial_samples(
        &self,
        kind: NumberingKind,
        id: RecordId,
        initial: InitialSamples,
    ) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.samples.entry((kind, id)).or_default().initial = Some(initial);
    }

    pub(super) fn put_template(&self, template: BriefTemplate) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.templates.insert(template.id, template);
    }

    pub(super) fn stored(&self, kind: NumberingKind, id: RecordId) -> NumberingRecord {
        self.state
            .lock()
            .expect("store mutex poisoned")
            .records
            .get(&(kind, id))
            .cloned()
            .expect("record stored")
    }

    pub(super) fn finalized(&self, kind: NumberingKind, id: RecordId) -> Option<FinalizedSamples> {
        self.state
            .lock()
            .expect("store mutex poisoned")
            .samples
            .get(&(kind, id))
            .and_then(|set| set.finalized.clone())
    }

    pub(super) fn fail_sender_lookups(&self) {
        self.state.lock().expect("store mutex poisoned").sender_lookups_fail = true;
    }

    pub(super) fn record_writes(&self) -> usize {
        self.state.lock().expect("store mutex poisoned").writes
    }
}

impl ComplianceStore for MemoryStore {
    fn record(
        &self,
        kind: NumberingKind,
        id: RecordId,
    ) -> Result<Option<NumberingRecord>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.records.get(&(kind, id)).cloned())
    }

    fn find_records(
        &self,
        kind: NumberingKind,
        filter: &RecordFilter,
    ) -> Result<Vec<NumberingRecord>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .records
            .values()
            .filter(|record| record.kind == kind && filter.matches(record))
            .cloned()
            .collect())
    }

    fn upsert_record(&self, mut record: NumberingRecord) -> Result<NumberingRecord, StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        if let Some(did) = &record.did {
            let taken = state.records.values().any(|other| {
                other.kind == record.kind
                    && other.id != record.id
                    && other.did.as_deref() == Some(did.as_str())
            });
            if taken {
                return Err(StoreError::Conflict(format!(
                    "duplicate key value violates unique constraint on did {did}"
                )));
            }
        }
        if !record.is_persisted() {
            state.next_id += 1;
            record.id = RecordId(state.next_id);
        }
        state.writes += 1;
        state
            .records
            .insert((record.kind, record.id), record.clone());
        Ok(record)
    }

    fn sender(&self, id: SenderId) -> Result<Option<Sender>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        if state.sender_lookups_fail {
            return Err(StoreError::Unavailable("senders table offline".to_string()));
        }
        Ok(state.senders.get(&id).cloned())
    }

    fn provider(&self, id: ProviderId) -> Result<Option<Provider>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.providers.get(&id).cloned())
    }

    fn status(&self, id: StatusId) -> Result<Option<Status>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.statuses.get(&id).cloned())
    }

    fn brief_template(&self, id: TemplateId) -> Result<Option<BriefTemplate>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.templates.get(&id).cloned())
    }

    fn find_brief_templates(
        &self,
        provider_id: ProviderId,
    ) -> Result<Vec<BriefTemplate>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
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
        let mut state = self.state.lock().expect("store mutex poisoned");
        if template.id == TemplateId(0) {
            let next = state.templates.keys().map(|id| id.0).max().unwrap_or(0) + 1;
            template.id = TemplateId(next);
        }
        state.templates.insert(template.id, template.clone());
        Ok(template)
    }

    fn delete_brief_template(&self, id: TemplateId) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.templates.remove(&id);
        Ok(())
    }

    fn sample_set(
        &self,
        kind: NumberingKind,
        record_id: RecordId,
    ) -> Result<Option<SampleSet>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.samples.get(&(kind, record_id)).cloned())
    }

    fn upsert_finalized_samples(
        &self,
        kind: NumberingKind,
        record_id: RecordId,
        samples: &FinalizedSamples,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.samples.entry((kind, record_id)).or_default().finalized = Some(samples.clone());
        Ok(())
    }
}

/// Store whose every call fails, for collaborator error mapping.
pub(super) struct UnavailableStore;

impl ComplianceStore for UnavailableStore {
    fn record(&self, _: NumberingKind, _: RecordId) -> Result<Option<NumberingRecord>, StoreError> {
        Err(offline())
    }

    fn find_records(
        &self,
        _: NumberingKind,
        _: &RecordFilter,
    ) -> Result<Vec<NumberingRecord>, StoreError> {
        Err(offline())
    }

    fn upsert_record(&self, _: NumberingRecord) -> Result<NumberingRecord, StoreError> {
        Err(offline())
    }

    fn sender(&self, _: SenderId) -> Result<Option<Sender>, StoreError> {
        Err(offline())
    }

    fn provider(&self, _: ProviderId) -> Result<Option<Provider>, StoreError> {
        Err(offline())
    }

    fn status(&self, _: StatusId) -> Result<Option<Status>, StoreError> {
        Err(offline())
    }

    fn brief_template(&self, _: TemplateId) -> Result<Option<BriefTemplate>, StoreError> {
        Err(offline())
    }

    fn find_brief_templates(&self, _: ProviderId) -> Result<Vec<BriefTemplate>, StoreError> {
        Err(offline())
    }

    fn upsert_brief_template(&self, _: BriefTemplate) -> Result<BriefTemplate, StoreError> {
        Err(offline())
    }

    fn delete_brief_template(&self, _: TemplateId) -> Result<(), StoreError> {
        Err(offline())
    }

    fn sample_set(&self, _: NumberingKind, _: RecordId) -> Result<Option<SampleSet>, StoreError> {
        Err(offline())
    }

    fn upsert_finalized_samples(
        &self,
        _: NumberingKind,
        _: RecordId,
        _: &FinalizedSamples,
    ) -> Result<(), StoreError> {
        Err(offline())
    }
}

fn offline() -> StoreError {
    StoreError::Unavailable("database offline".to_string())
}

#[derive(Default, Clone)]
pub(super) struct MemoryBlobs {
    objects: Arc<Mutex<BTreeMap<(String, String), Vec<u8>>>>,
}

impl MemoryBlobs {
    pub(super) fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) {
        self.objects
            .lock()
            .expect("blob mutex poisoned")
            .insert((bucket.to_string(), key.to_string()), bytes);
    }

    pub(super) fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .expect("blob mutex poisoned")
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub(super) fn keys(&self, bucket: &str) -> Vec<String> {
        self.list(bucket).expect("memory list")
    }
}

impl BlobStore for MemoryBlobs {
    fn upload(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), BlobError> {
        self.put(bucket, key, bytes.to_vec());
        Ok(())
    }

    fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BlobError> {
        self.get(bucket, key).ok_or_else(|| BlobError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    fn remove(&self, bucket: &str, key: &str) -> Result<(), BlobError> {
        self.objects
            .lock()
            .expect("blob mutex poisoned")
            .remove(&(bucket.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or_else(|| BlobError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    fn list(&self, bucket: &str) -> Result<Vec<String>, BlobError> {
        Ok(self
            .objects
            .lock()
            .expect("blob mutex poisoned")
            .keys()
            .filter(|(owner, _)| owner == bucket)
            .map(|(_, key)| key.clone())
            .collect())
    }

    fn public_url(&self, bucket: &str, key: &str) -> Result<String, BlobError> {
        Ok(format!("https://blobs.test/{bucket}/{key}"))
    }
}

/// Text generator replaying queued completions and recording prompts.
#[derive(Default)]
pub(super) struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    prompts: Mutex<Vec<String>>,
    gate: Mutex<Option<Gate>>,
}

struct Gate {
    entered: mpsc::Sender<()>,
    release: mpsc::Receiver<()>,
}

/// Test side of a gated generator: `entered` fires once the first call is in flight, and the
/// call returns after `release` is signalled.
pub(super) struct GateControl {
    pub(super) entered: mpsc::Receiver<()>,
    pub(super) release: mpsc::Sender<()>,
}

impl ScriptedGenerator {
    pub(super) fn replying(text: &str) -> Self {
        let generator = Self::default();
        generator.push(Ok(text.to_string()));
        generator
    }

    pub(super) fn failing(error: GenerationError) -> Self {
        let generator = Self::default();
        generator.push(Err(error));
        generator
    }

    pub(super) fn gated(text: &str) -> (Self, GateControl) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let generator = Self::replying(text);
        *generator.gate.lock().expect("generator mutex poisoned") = Some(Gate {
            entered: entered_tx,
            release: release_rx,
        });
        let control = GateControl {
            entered: entered_rx,
            release: release_tx,
        };
        (generator, control)
    }

    pub(super) fn push(&self, reply: Result<String, GenerationError>) {
        self.replies
            .lock()
            .expect("generator mutex poisoned")
            .push_back(reply);
    }

    pub(super) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("generator mutex poisoned").clone()
    }
}

impl TextGenerator for ScriptedGenerator {
    fn complete(
        &self,
        prompt: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, GenerationError> {
        let gate = self.gate.lock().expect("generator mutex poisoned").take();
        if let Some(gate) = gate {
            let _ = gate.entered.send(());
            let _ = gate.release.recv();
        }
        self.prompts
            .lock()
            .expect("generator mutex poisoned")
            .push(prompt.to_string());
        self.replies
            .lock()
            .expect("generator mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::Unreachable("no scripted reply".to_string())))
    }
}

pub(super) struct FixedClock(pub(super) DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub(super) struct Harness {
    pub(super) lifecycle: Arc<TestLifecycle>,
    pub(super) store: Arc<MemoryStore>,
    pub(super) blobs: Arc<MemoryBlobs>,
    pub(super) generator: Arc<ScriptedGenerator>,
}

pub(super) fn harness() -> Harness {
    harness_with(ScriptedGenerator::default(), LifecycleConfig::default())
}

pub(super) fn harness_with(generator: ScriptedGenerator, config: LifecycleConfig) -> Harness {
    let store = Arc::new(MemoryStore::seeded());
    let blobs = Arc::new(MemoryBlobs::default());
    let generator = Arc::new(generator);
    let lifecycle = Arc::new(NumberingLifecycle::with_clock(
        store.clone(),
        blobs.clone(),
        generator.clone(),
        config,
        Arc::new(FixedClock(fixed_now())),
    ));
    Harness {
        lifecycle,
        store,
        blobs,
        generator,
    }
}

const BODY_OPEN: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;
const BODY_CLOSE: &str = "</w:body></w:document>";

/// Minimal DOCX whose body holds one paragraph per line.
pub(super) fn brief_template_docx(lines: &[&str]) -> Vec<u8> {
    let paragraphs: String = lines
        .iter()
        .map(|line| format!("<w:p><w:r><w:t>{line}</w:t></w:r></w:p>"))
        .collect();
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("[Content_Types].xml", FileOptions::default())
        .expect("content types");
    writer.write_all(b"<Types/>").expect("write types");
    writer
        .start_file(DOCUMENT_BODY, FileOptions::default())
        .expect("start body");
    writer
        .write_all(format!("{BODY_OPEN}{paragraphs}{BODY_CLOSE}").as_bytes())
        .expect("write body");
    writer.finish().expect("finish docx").into_inner()
}

pub(super) fn document_body(docx: &[u8]) -> String {
    ZipTemplateArchive::open(docx)
        .expect("docx opens")
        .read_entry(DOCUMENT_BODY)
        .expect("body present")
}

/// Registers a template for `provider` backed by a blob in the default template bucket.
pub(super) fn install_template(harness: &Harness, provider: ProviderId, lines: &[&str]) {
    let key = format!("seed-{}.docx", provider.0);
    let bucket = harness.lifecycle.config().buckets.templates.clone();
    harness
        .blobs
        .put(&bucket, &key, brief_template_docx(lines));
    harness.store.put_template(BriefTemplate {
        id: TemplateId(provider.0),
        provider_id: provider,
        did_type: NumberingKind::TollFree,
        blob_key: key,
        placeholders: vec!["ein".to_string()],
        format_version: 1,
        description: None,
    });
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
