//! SMS sample copies: carrier-seeded initial samples and the finalized copies derived from them.

mod parser;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use parser::parse_sample_copies;

use super::generation::{GenerationError, GenerationSettings, TextGenerator};
use super::placeholders::{Bindings, PlaceholderEngine};

/// Read-only samples captured at provisioning time; may still contain `[token]`s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialSamples {
    pub sample1: String,
    pub sample2: String,
    pub sample3: String,
}

impl InitialSamples {
    pub fn as_array(&self) -> [&str; 3] {
        [
            self.sample1.as_str(),
            self.sample2.as_str(),
            self.sample3.as_str(),
        ]
    }
}

/// Editable copies; every slot is always a string once the set exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedSamples {
    pub copy1: String,
    pub copy2: String,
    pub copy3: String,
}

impl FinalizedSamples {
    pub fn as_array(&self) -> [&str; 3] {
        [
            self.copy1.as_str(),
            self.copy2.as_str(),
            self.copy3.as_str(),
        ]
    }
}

/// Partial edit of finalized copies. Absent slots keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleCopyPatch {
    pub copy1: Option<String>,
    pub copy2: Option<String>,
    pub copy3: Option<String>,
}

impl SampleCopyPatch {
    pub fn apply(&self, current: FinalizedSamples) -> FinalizedSamples {
        FinalizedSamples {
            copy1: self.copy1.clone().unwrap_or(current.copy1),
            copy2: self.copy2.clone().unwrap_or(current.copy2),
            copy3: self.copy3.clone().unwrap_or(current.copy3),
        }
    }

    pub fn provided(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("copy1", self.copy1.as_deref()),
            ("copy2", self.copy2.as_deref()),
            ("copy3", self.copy3.as_deref()),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|value| (field, value)))
    }
}

/// Per-record pair of sample triples as held by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSet {
    pub initial: Option<InitialSamples>,
    pub finalized: Option<FinalizedSamples>,
}

impl SampleSet {
    /// Copies for downstream use: finalized when present, otherwise the resolved initial samples.
    pub fn effective(&self, engine: &PlaceholderEngine, bindings: &Bindings) -> Option<[String; 3]> {
        if let Some(finalized) = &self.finalized {
            return Some(finalized.as_array().map(str::to_string));
        }
        self.initial
            .as_ref()
            .map(|initial| initial.as_array().map(|sample| engine.substitute(sample, bindings)))
    }
}

/// Resolves sender tokens in the initial samples and asks the text generator for rewrites.
pub struct SampleCopyGenerator<G> {
    generator: Arc<G>,
    engine: PlaceholderEngine,
    settings: GenerationSettings,
}

impl<G: TextGenerator> SampleCopyGenerator<G> {
    pub fn new(generator: Arc<G>, settings: GenerationSettings) -> Self {
        Self {
            generator,
            engine: PlaceholderEngine::plain_text(),
            settings,
        }
    }

    pub fn resolve(&self, initial: &InitialSamples, bindings: &Bindings) -> [String; 3] {
        initial
            .as_array()
            .map(|sample| self.engine.substitute(sample, bindings))
    }

    pub fn generate(
        &self,
        initial: &InitialSamples,
        bindings: &Bindings,
        brand: &str,
    ) -> Result<FinalizedSamples, GenerationError> {
        let resolved = self.resolve(initial, bindings);
        for sample in &resolved {
            let unresolved = self.engine.unresolved(sample, bindings);
            if !unresolved.is_empty() {
                debug!(?unresolved, "sample keeps tokens without sender values");
            }
        }

        let prompt = rewrite_prompt(&resolved, brand);
        let completion = self.generator.complete(
            &prompt,
            self.settings.max_tokens,
            self.settings.temperature,
        )?;
        if completion.trim().is_empty() {
            return Err(GenerationError::EmptyCompletion);
        }

        let copies = parse_sample_copies(&completion, &resolved);
        let fallbacks = copies
            .as_array()
            .into_iter()
            .zip(&resolved)
            .filter(|(copy, sample)| *copy == sample.as_str())
            .count();
        if fallbacks > 0 {
            warn!(fallbacks, "completion did not cover every sample slot");
        }

        Ok(copies)
    }
}

fn rewrite_prompt(samples: &[String; 3], brand: &str) -> String {
    let brand = if brand.trim().is_empty() {
        "the sender"
    } else {
        brand.trim()
    };
    format!(
        "Rewrite each of the following SMS sample messages for {brand} so it reads naturally, \
         keeps every link and the opt-out language, and stays under 160 characters.\n\
         Return exactly three lines, one message per line, without numbering or commentary.\n\
         1. {}\n2. {}\n3. {}",
        samples[0], samples[1], samples[2]
    )
}
