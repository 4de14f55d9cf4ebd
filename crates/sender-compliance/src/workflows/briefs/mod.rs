//! Carrier brief rendering: DOCX template archives and the brace-token merge engine.

mod archive;
mod merge;

pub use archive::{TemplateArchive, ZipTemplateArchive};
pub use merge::{brief_file_name, DocumentMergeEngine, DOCUMENT_BODY, DOCX_MIME};

/// The template binary cannot be used as a document container.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template is not a valid document container: {source}")]
    InvalidContainer {
        #[source]
        source: zip::result::ZipError,
    },
    #[error("template entry `{name}` could not be read: {source}")]
    UnreadableEntry {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("template is missing the `{name}` entry")]
    MissingEntry { name: String },
    #[error("template entry `{name}` is not valid UTF-8")]
    NotUtf8 { name: String },
    #[error("template entry `{name}` is not well-formed XML: {reason}")]
    MalformedEntry { name: String, reason: String },
}

/// Substitution produced a document that cannot be written back out.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("merged entry `{name}` is not well-formed XML: {reason}")]
    MalformedXml { name: String, reason: String },
    #[error("merged document could not be serialized: {0}")]
    Serialize(String),
}

/// Failure raised by [`DocumentMergeEngine::merge`].
#[derive(Debug, thiserror::Error)]
pub enum BriefError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Render(#[from] RenderError),
}
