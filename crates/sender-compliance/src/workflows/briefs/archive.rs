use std::io::{Cursor, Read, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{RenderError, TemplateError};

/// Named-entry view over a document container so merging never touches the archive format.
pub trait TemplateArchive: Sized {
    fn open(bytes: &[u8]) -> Result<Self, TemplateError>;
    fn entry_names(&self) -> Vec<String>;
    fn read_entry(&self, name: &str) -> Result<String, TemplateError>;
    fn write_entry(&mut self, name: &str, contents: String);
    fn into_bytes(self) -> Result<Vec<u8>, RenderError>;
}

#[derive(Debug, Clone)]
struct ArchiveEntry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    is_dir: bool,
}

/// Zip-backed archive holding every entry in memory; templates are small.
#[derive(Debug, Clone)]
pub struct ZipTemplateArchive {
    entries: Vec<ArchiveEntry>,
}

impl ZipTemplateArchive {
    fn entry(&self, name: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }
}

impl TemplateArchive for ZipTemplateArchive {
    fn open(bytes: &[u8]) -> Result<Self, TemplateError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|source| TemplateError::InvalidContainer { source })?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .map_err(|source| TemplateError::InvalidContainer { source })?;
            let name = file.name().to_string();
            let compression = file.compression();
            let is_dir = file.is_dir();

            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .map_err(|source| TemplateError::UnreadableEntry {
                    name: name.clone(),
                    source,
                })?;

            entries.push(ArchiveEntry {
                name,
                data,
                compression,
                is_dir,
            });
        }

        Ok(Self { entries })
    }

    fn entry_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| !entry.is_dir)
            .map(|entry| entry.name.clone())
            .collect()
    }

    fn read_entry(&self, name: &str) -> Result<String, TemplateError> {
        let entry = self.entry(name).ok_or_else(|| TemplateError::MissingEntry {
            name: name.to_string(),
        })?;
        String::from_utf8(entry.data.clone()).map_err(|_| TemplateError::NotUtf8 {
            name: name.to_string(),
        })
    }

    fn write_entry(&mut self, name: &str, contents: String) {
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.data = contents.into_bytes(),
            None => self.entries.push(ArchiveEntry {
                name: name.to_string(),
                data: contents.into_bytes(),
                compression: CompressionMethod::Deflated,
                is_dir: false,
            }),
        }
    }

    fn into_bytes(self) -> Result<Vec<u8>, RenderError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in self.entries {
            // Only stored and deflated entries can be written back out.
            let method = match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = FileOptions::default().compression_method(method);

            if entry.is_dir {
                writer
                    .add_directory(entry.name, options)
                    .map_err(|err| RenderError::Serialize(err.to_string()))?;
                continue;
            }

            writer
                .start_file(entry.name, options)
                .map_err(|err| RenderError::Serialize(err.to_string()))?;
            writer
                .write_all(&entry.data)
                .map_err(|err| RenderError::Serialize(err.to_string()))?;
        }

        let cursor = writer
            .finish()
            .map_err(|err| RenderError::Serialize(err.to_string()))?;
        Ok(cursor.into_inner())
    }
}
