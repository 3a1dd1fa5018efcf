use std::io;
use std::path::PathBuf;
use std::str::Utf8Error;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DecodeError>;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(
        "Offset {offset}: unexpected end of data while reading {what} (need {need} bytes, have {have})"
    )]
    UnexpectedEndOfData {
        what: &'static str,
        offset: u64,
        need: usize,
        have: usize,
    },

    #[error("Offset {offset}: failed to decode UTF-8 string for {what}, caused by: {source}")]
    MalformedString {
        what: &'static str,
        offset: u64,
        source: Utf8Error,
    },

    /// The embedded population document is not well formed XML.
    #[error("Embedded population XML is malformed: {message}")]
    MalformedXml { message: String },

    #[error("Offset {offset}: invalid {what} `{count}`")]
    InvalidCount {
        what: &'static str,
        offset: u64,
        count: i32,
    },

    #[error("An I/O error has occurred: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to open container {}: {message}", path.display())]
    Container { path: PathBuf, message: String },
}

impl DecodeError {
    /// `true` for the errors that mean "the stream ran out".
    pub fn is_end_of_data(&self) -> bool {
        matches!(self, DecodeError::UnexpectedEndOfData { .. })
    }
}

impl From<quick_xml::Error> for DecodeError {
    fn from(err: quick_xml::Error) -> Self {
        DecodeError::MalformedXml {
            message: err.to_string(),
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for DecodeError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        DecodeError::MalformedXml {
            message: err.to_string(),
        }
    }
}
