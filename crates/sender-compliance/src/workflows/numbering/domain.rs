use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::placeholders::Bindings;

/// Registration class of a numbering record. Both kinds share one lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingKind {
    TenDlc,
    TollFree,
}

impl NumberingKind {
    pub const fn label(self) -> &'static str {
        match self {
            NumberingKind::TenDlc => "10dlc",
            NumberingKind::TollFree => "toll_free",
        }
    }

    /// Accepts the URL segment forms used by the HTTP surface.
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment.trim().to_ascii_lowercase().as_str() {
            "10dlc" | "ten_dlc" | "ten-dlc" => Some(Self::TenDlc),
            "toll_free" | "toll-free" | "tollfree" | "tfn" => Some(Self::TollFree),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Placeholder identity for records the store has not assigned yet.
    pub const UNASSIGNED: RecordId = RecordId(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenderId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub u64);

/// Key into the status lookup. Open-ended; only the canonical ids carry business rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusId(pub u16);

impl StatusId {
    pub const NEW: StatusId = StatusId(1);
    pub const IN_REVIEW: StatusId = StatusId(2);
    pub const APPROVED: StatusId = StatusId(3);
    pub const SUBMITTED: StatusId = StatusId(4);
    pub const LIVE: StatusId = StatusId(5);

    pub const fn canonical_label(self) -> Option<&'static str> {
        match self.0 {
            1 => Some("New"),
            2 => Some("In Review"),
            3 => Some("Approved"),
            4 => Some("Submitted"),
            5 => Some("Live"),
            _ => None,
        }
    }
}

impl std::fmt::Display for StatusId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.canonical_label() {
            Some(label) => write!(f, "{label} ({})", self.0),
            None => write!(f, "status {}", self.0),
        }
    }
}

/// A 10DLC or toll-free registration tracked through the compliance lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberingRecord {
    pub id: RecordId,
    pub kind: NumberingKind,
    pub did: Option<String>,
    pub sender_id: SenderId,
    pub status_id: StatusId,
    pub provider_id: Option<ProviderId>,
    pub campaign_id: Option<String>,
    pub use_case: Option<String>,
    pub brief: Option<String>,
    pub submitted_date: Option<NaiveDate>,
    pub notes: Option<String>,
    /// Set once a DID is held while approved; never cleared.
    #[serde(default)]
    pub did_locked: bool,
    pub last_modified: DateTime<Utc>,
    pub modified_by: String,
}

impl NumberingRecord {
    pub fn draft(
        kind: NumberingKind,
        sender_id: SenderId,
        did: Option<String>,
        at: DateTime<Utc>,
        actor: &str,
    ) -> Self {
        Self {
            id: RecordId::UNASSIGNED,
            kind,
            did,
            sender_id,
            status_id: StatusId::NEW,
            provider_id: None,
            campaign_id: None,
            use_case: None,
            brief: None,
            submitted_date: None,
            notes: None,
            did_locked: false,
            last_modified: at,
            modified_by: actor.to_string(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id != RecordId::UNASSIGNED
    }

    pub fn did_is_locked(&self) -> bool {
        self.did_locked || (self.did.is_some() && self.status_id == StatusId::APPROVED)
    }

    pub(crate) fn stamp(&mut self, at: DateTime<Utc>, actor: &str) {
        self.last_modified = at;
        self.modified_by = actor.to_string();
    }
}

/// Fields an update may touch. `None` leaves the stored value alone; an empty string clears
/// optional text (and the DID, where the lock rules allow it).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordPatch {
    pub did: Option<String>,
    pub status_id: Option<StatusId>,
    pub provider_id: Option<ProviderId>,
    pub campaign_id: Option<String>,
    pub use_case: Option<String>,
    pub notes: Option<String>,
    /// Date recorded when this update moves the record into `Submitted`; defaults to today.
    pub submitted_on: Option<NaiveDate>,
}

/// Conjunctive filter for record lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub did: Option<String>,
    pub status_id: Option<StatusId>,
}

impl RecordFilter {
    pub fn by_did(did: &str) -> Self {
        Self {
            did: Some(did.to_string()),
            ..Self::default()
        }
    }

    pub fn by_status(status_id: StatusId) -> Self {
        Self {
            status_id: Some(status_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &NumberingRecord) -> bool {
        self.did
            .as_deref()
            .map_or(true, |did| record.did.as_deref() == Some(did))
            && self
                .status_id
                .map_or(true, |status| record.status_id == status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl SenderAddress {
    pub fn single_line(&self) -> String {
        let locality = format!("{} {}", self.state, self.postal_code);
        [self.street.as_str(), self.city.as_str(), locality.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Messaging brand that numbering records are registered for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: SenderId,
    pub sender: String,
    pub brand: String,
    pub short_url: Option<String>,
    pub company: String,
    pub address: SenderAddress,
    pub cta: Option<String>,
    pub terms_url: Option<String>,
    pub privacy_url: Option<String>,
    #[serde(default)]
    pub verticals: Vec<String>,
}

impl Sender {
    /// `[token]` bindings for SMS sample text.
    pub fn sms_bindings(&self) -> Bindings {
        let mut bindings = Bindings::new();
        bindings.insert("sender", self.sender.as_str());
        bindings.insert("brand", self.brand.as_str());
        bindings.insert("company", self.company.as_str());
        bindings.insert_opt("shorturl", self.short_url.as_deref());
        bindings.insert_opt("cta", self.cta.as_deref());
        bindings.insert_opt("terms", self.terms_url.as_deref());
        bindings.insert_opt("privacy", self.privacy_url.as_deref());
        bindings
    }
}

/// Carrier or aggregator a record is filed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub name: String,
    pub kinds: Vec<NumberingKind>,
}

impl Provider {
    pub fn serves(&self, kind: NumberingKind) -> bool {
        self.kinds.contains(&kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub id: StatusId,
    pub label: String,
}

/// Provider-specific DOCX template used to render carrier briefs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefTemplate {
    pub id: TemplateId,
    pub provider_id: ProviderId,
    pub did_type: NumberingKind,
    pub blob_key: String,
    pub placeholders: Vec<String>,
    pub format_version: u16,
    pub description: Option<String>,
}

/// Metadata supplied when publishing a new template binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefTemplateDraft {
    pub provider_id: ProviderId,
    pub did_type: NumberingKind,
    #[serde(default)]
    pub placeholders: Vec<String>,
    #[serde(default = "default_format_version")]
    pub format_version: u16,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_format_version() -> u16 {
    1
}

/// A rendered brief persisted to the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefArtifact {
    pub record_id: RecordId,
    pub key: String,
    pub url: String,
}
