// Error types shared by every container parser

use thiserror::Error;

use crate::identify::ContainerType;

/// Errors raised while probing a stream.
///
/// Every parser returns the first error it encounters; nothing here is
/// recovered internally.
#[derive(Debug, Error)]
pub enum Error {
    /// Short read, failed seek or end of stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An expected magic number or marker was absent.
    #[error("expected {expected:?}, found {found:?}")]
    FormatMismatch { expected: &'static str, found: String },

    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// An OGG page flagged as continued arrived for a stream with no pending packet.
    #[error("continued page for stream {serial} without a pending packet")]
    OrphanedContinuation { serial: u32 },

    #[error("no tags found")]
    NoTagsFound,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    pub(crate) fn mismatch(expected: &'static str, found: &[u8]) -> Self {
        Error::FormatMismatch {
            expected,
            found: String::from_utf8_lossy(found).into_owned(),
        }
    }

    /// True when the underlying cause is a clean or partial end of stream.
    pub fn is_eof(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Identification failure, carrying the container the identifier had already
/// committed to when the error happened (`Unknown` if none).
#[derive(Debug, Error)]
#[error("identifying {container}: {source}")]
pub struct IdentifyError {
    pub container: ContainerType,
    #[source]
    pub source: Error,
}

impl From<IdentifyError> for Error {
    fn from(e: IdentifyError) -> Self {
        e.source
    }
}

impl From<Error> for IdentifyError {
    fn from(source: Error) -> Self {
        IdentifyError {
            container: ContainerType::Unknown,
            source,
        }
    }
}

impl From<std::io::Error> for IdentifyError {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e).into()
    }
}
