use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use super::archive::{TemplateArchive, ZipTemplateArchive};
use super::{BriefError, RenderError, TemplateError};
use crate::workflows::placeholders::{is_token_name, Bindings, Delimiters, PlaceholderEngine};

/// Main body part of a WordprocessingML package.
pub const DOCUMENT_BODY: &str = "word/document.xml";

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// `brief-{recordId}-{unixTimeMillis}.docx`
pub fn brief_file_name(record_id: u64, at: DateTime<Utc>) -> String {
    format!("brief-{record_id}-{}.docx", at.timestamp_millis())
}

/// Merges a flat binding map into the text parts of a DOCX template.
///
/// The engine is stateless; one instance can serve concurrent merges of different documents.
#[derive(Debug, Clone, Copy)]
pub struct DocumentMergeEngine<A = ZipTemplateArchive> {
    substitution: PlaceholderEngine,
    archive: PhantomData<fn() -> A>,
}

impl DocumentMergeEngine<ZipTemplateArchive> {
    pub fn new() -> Self {
        Self::with_archive()
    }
}

impl Default for DocumentMergeEngine<ZipTemplateArchive> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: TemplateArchive> DocumentMergeEngine<A> {
    pub fn with_archive() -> Self {
        Self {
            substitution: PlaceholderEngine::document(),
            archive: PhantomData,
        }
    }

    pub fn merge(&self, template: &[u8], bindings: &Bindings) -> Result<Vec<u8>, BriefError> {
        let mut archive = A::open(template)?;
        let parts = self.text_parts(&archive)?;

        for (name, xml) in parts {
            let joined = rejoin_split_tokens(&xml, self.substitution.delimiters());
            let unresolved = self.substitution.unresolved(&joined, bindings);
            if !unresolved.is_empty() {
                debug!(part = %name, ?unresolved, "template tokens left unbound");
            }

            let merged = self.substitution.substitute(&joined, bindings);
            check_well_formed(&merged)
                .map_err(|reason| RenderError::MalformedXml {
                    name: name.clone(),
                    reason,
                })?;
            archive.write_entry(&name, merged);
        }

        Ok(archive.into_bytes()?)
    }

    /// Validate `template` as mergeable and list the tokens it declares.
    pub fn placeholders(&self, template: &[u8]) -> Result<Vec<String>, TemplateError> {
        let archive = A::open(template)?;
        let mut tokens: Vec<String> = Vec::new();

        for (_, xml) in self.text_parts(&archive)? {
            let joined = rejoin_split_tokens(&xml, self.substitution.delimiters());
            for token in self.substitution.tokens(&joined) {
                if !tokens.iter().any(|known| known == token) {
                    tokens.push(token.to_string());
                }
            }
        }

        Ok(tokens)
    }

    /// Body first, then any header/footer parts, each checked for well-formedness.
    fn text_parts(&self, archive: &A) -> Result<Vec<(String, String)>, TemplateError> {
        let mut names = vec![DOCUMENT_BODY.to_string()];
        names.extend(
            archive
                .entry_names()
                .into_iter()
                .filter(|name| is_header_or_footer(name)),
        );

        names
            .into_iter()
            .map(|name| {
                let xml = archive.read_entry(&name)?;
                check_well_formed(&xml).map_err(|reason| TemplateError::MalformedEntry {
                    name: name.clone(),
                    reason,
                })?;
                Ok((name, xml))
            })
            .collect()
    }
}

fn is_header_or_footer(name: &str) -> bool {
    let Some(file) = name.strip_prefix("word/") else {
        return false;
    };
    (file.starts_with("header") || file.starts_with("footer")) && file.ends_with(".xml")
}

/// Word splits typed text into formatting runs, so `{{did}}` may arrive as
/// `{{</w:t></w:r><w:r><w:t>did}}`. Markup inside a delimited span whose text is a token name
/// is dropped so the token becomes contiguous again. Spans that leave their paragraph are kept
/// verbatim.
pub(crate) fn rejoin_split_tokens(xml: &str, delimiters: Delimiters) -> String {
    let mut text = String::with_capacity(xml.len());
    // xml byte offset for every byte of `text`
    let mut offsets = Vec::with_capacity(xml.len());
    let mut in_tag = false;

    for (offset, ch) in xml.char_indices() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => {
                text.push(ch);
                offsets.extend(std::iter::repeat(offset).take(ch.len_utf8()));
            }
            _ => {}
        }
    }

    let (open, close) = (delimiters.open(), delimiters.close());
    let mut replacements = Vec::new();
    let mut cursor = 0;

    while let Some(found) = text[cursor..].find(open) {
        let start = cursor + found;
        let name_start = start + open.len();
        let Some(name_len) = text[name_start..].find(close) else {
            break;
        };
        let name = &text[name_start..name_start + name_len];
        if !is_token_name(name) {
            cursor = start + 1;
            continue;
        }

        let end = name_start + name_len + close.len();
        let xml_start = offsets[start];
        let xml_end = offsets[end - 1] + 1;
        if crosses_paragraph(&xml[xml_start..xml_end]) {
            cursor = start + 1;
            continue;
        }
        if xml_end - xml_start != end - start {
            replacements.push((xml_start, xml_end, text[start..end].to_string()));
        }
        cursor = end;
    }

    if replacements.is_empty() {
        return xml.to_string();
    }

    let mut joined = xml.to_string();
    for (xml_start, xml_end, token) in replacements.into_iter().rev() {
        joined.replace_range(xml_start..xml_end, &token);
    }
    joined
}

fn crosses_paragraph(markup: &str) -> bool {
    markup.contains("</w:p>") || markup.contains("<w:p>") || markup.contains("<w:p ")
}

fn check_well_formed(xml: &str) -> Result<(), String> {
    let mut reader = Reader::from_str(xml);
    let mut open: Vec<Vec<u8>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => open.push(start.name().as_ref().to_vec()),
            Ok(Event::End(end)) => match open.pop() {
                Some(name) if name.as_slice() == end.name().as_ref() => {}
                Some(name) => {
                    return Err(format!(
                        "expected </{}> at byte {}",
                        String::from_utf8_lossy(&name),
                        reader.buffer_position()
                    ))
                }
                None => {
                    return Err(format!(
                        "unexpected closing tag at byte {}",
                        reader.buffer_position()
                    ))
                }
            },
            Ok(Event::Text(text)) => {
                text.unescape().map_err(|err| {
                    format!("{err} at byte {}", reader.buffer_position())
                })?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(format!("{err} at byte {}", reader.buffer_position())),
        }
    }

    match open.last() {
        Some(name) => Err(format!("unclosed <{}>", String::from_utf8_lossy(name))),
        None => Ok(()),
    }
}
