use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::workflows::generation::GenerationSettings;

/// Lifecycle tuning: field limits, lock policy, generation knobs, and blob buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LifecycleConfig {
    pub limits: FieldLimits,
    pub did_lock: DidLockPolicy,
    pub generation: GenerationSettings,
    pub buckets: StorageBuckets,
}

/// Maximum character counts for user-editable text fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLimits {
    /// Short free text such as the DID and campaign id.
    pub text: usize,
    pub notes: usize,
    pub use_case: usize,
    pub sample_copy: usize,
}

impl Default for FieldLimits {
    fn default() -> Self {
        Self {
            text: 255,
            notes: 2_000,
            use_case: 4_000,
            sample_copy: 1_024,
        }
    }
}

/// What an update does with a DID change on a locked record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DidLockPolicy {
    /// Drop the change, log it, and apply the rest of the update.
    #[default]
    Ignore,
    /// Fail the whole update with a conflict.
    Reject,
}

impl FromStr for DidLockPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown DID lock policy `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageBuckets {
    pub templates: String,
    pub briefs: String,
}

impl Default for StorageBuckets {
    fn default() -> Self {
        Self {
            templates: "brief-templates".to_string(),
            briefs: "briefs".to_string(),
        }
    }
}
