pub mod briefs;
pub mod generation;
pub mod numbering;
pub mod placeholders;
pub mod samples;
