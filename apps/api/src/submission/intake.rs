//! File intake — turns raw uploaded bytes into a `FileDescriptor`.
//!
//! The submission controller never inspects files itself; format and size
//! checks live behind this trait so they can be swapped without touching the
//! controller or handlers. Bytes are measured and dropped, never stored.

use thiserror::Error;
use tracing::debug;

use crate::submission::models::FileDescriptor;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntakeError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("File '{name}' is {size_bytes} bytes, limit is {limit} bytes")]
    TooLarge {
        name: String,
        size_bytes: u64,
        limit: u64,
    },

    #[error("File '{0}' is empty")]
    Empty(String),
}

pub trait FileIntake: Send + Sync {
    fn describe(&self, name: &str, bytes: &[u8]) -> Result<FileDescriptor, IntakeError>;
}

const KNOWN_FORMATS: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
];

/// Extension-based intake restricted to an assignment's accepted formats.
pub struct FormatIntake {
    accepted: Vec<(&'static str, &'static str)>,
    max_bytes: u64,
}

impl FormatIntake {
    /// `formats` are assignment-style extensions ("PDF", "JPG", ...). JPG also
    /// admits the ".jpeg" spelling.
    pub fn new(formats: &[String], max_bytes: u64) -> Self {
        let wanted: Vec<String> = formats.iter().map(|f| f.to_lowercase()).collect();
        let accepted = KNOWN_FORMATS
            .iter()
            .copied()
            .filter(|(ext, _)| {
                wanted
                    .iter()
                    .any(|w| w.as_str() == *ext || (w == "jpg" && *ext == "jpeg"))
            })
            .collect();
        Self {
            accepted,
            max_bytes,
        }
    }

    fn mime_for(&self, name: &str) -> Option<&'static str> {
        let ext = name.rsplit_once('.')?.1.to_lowercase();
        self.accepted
            .iter()
            .find(|(known, _)| *known == ext)
            .map(|(_, mime)| *mime)
    }
}

impl FileIntake for FormatIntake {
    fn describe(&self, name: &str, bytes: &[u8]) -> Result<FileDescriptor, IntakeError> {
        let mime = self
            .mime_for(name)
            .ok_or_else(|| IntakeError::UnsupportedFormat(name.to_string()))?;

        let size_bytes = bytes.len() as u64;
        if size_bytes == 0 {
            return Err(IntakeError::Empty(name.to_string()));
        }
        if size_bytes > self.max_bytes {
            return Err(IntakeError::TooLarge {
                name: name.to_string(),
                size_bytes,
                limit: self.max_bytes,
            });
        }

        debug!(file = name, size_bytes, mime, "Accepted upload");
        Ok(FileDescriptor::new(name, size_bytes, mime))
    }
}
