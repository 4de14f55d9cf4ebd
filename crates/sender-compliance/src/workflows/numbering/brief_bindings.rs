use chrono::NaiveDate;

use super::domain::{NumberingRecord, Provider, Sender, Status};
use crate::workflows::placeholders::{Bindings, PlaceholderEngine};
use crate::workflows::samples::SampleSet;

/// Keys every brief merge binds, whether or not the template uses them.
pub const FIXED_BRIEF_KEYS: [&str; 12] = [
    "did",
    "sender",
    "provider",
    "use_case",
    "campaign_id",
    "status",
    "submitted_date",
    "notes",
    "sample1",
    "sample2",
    "sample3",
    "date",
];

const BRIEF_DATE_FORMAT: &str = "%B %-d, %Y";

/// Everything a brief draws on. Lookups that failed upstream arrive as `None`.
#[derive(Debug, Clone)]
pub struct BriefContext<'a> {
    pub record: &'a NumberingRecord,
    pub sender: Option<&'a Sender>,
    pub provider: Option<&'a Provider>,
    pub status: Option<&'a Status>,
    pub samples: Option<&'a SampleSet>,
    pub today: NaiveDate,
}

/// Flat binding map for a brief merge: the fixed keys, sender extras, then declared
/// template keys defaulting to the empty string.
pub fn brief_bindings(context: &BriefContext<'_>, declared: &[String]) -> Bindings {
    let record = context.record;
    let mut bindings = Bindings::new();

    bindings.insert_opt("did", record.did.as_deref());
    bindings.insert_opt("sender", context.sender.map(|sender| sender.sender.as_str()));
    bindings.insert_opt(
        "provider",
        context.provider.map(|provider| provider.name.as_str()),
    );
    bindings.insert_opt("use_case", record.use_case.as_deref());
    bindings.insert_opt("campaign_id", record.campaign_id.as_deref());
    bindings.insert_opt("status", context.status.map(|status| status.label.as_str()));
    bindings.insert_opt(
        "submitted_date",
        record
            .submitted_date
            .map(|date| date.format(BRIEF_DATE_FORMAT).to_string()),
    );
    bindings.insert_opt("notes", record.notes.as_deref());
    bindings.insert("date", context.today.format(BRIEF_DATE_FORMAT).to_string());

    let sms = context
        .sender
        .map(Sender::sms_bindings)
        .unwrap_or_default();
    let samples = context
        .samples
        .and_then(|set| set.effective(&PlaceholderEngine::plain_text(), &sms));
    for (index, key) in ["sample1", "sample2", "sample3"].into_iter().enumerate() {
        bindings.insert_opt(key, samples.as_ref().map(|copies| copies[index].as_str()));
    }

    if let Some(sender) = context.sender {
        bindings.insert("brand", sender.brand.as_str());
        bindings.insert("company", sender.company.as_str());
        bindings.insert_opt("short_url", sender.short_url.as_deref());
        bindings.insert_opt("cta", sender.cta.as_deref());
        bindings.insert_opt("terms_url", sender.terms_url.as_deref());
        bindings.insert_opt("privacy_url", sender.privacy_url.as_deref());
        bindings.insert("address", sender.address.single_line());
    }

    for key in declared {
        bindings.insert_default(key.as_str());
    }
    bindings
}
