//! Error type shared by every pipeline stage.

use std::time::Duration;
use thiserror::Error;

/// Broad classification of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A configuration or precondition check failed. Never retried.
    Precondition,
    /// A network call failed, either after exhausting retries or with a
    /// non-retryable status.
    Network,
    /// The remote annotation job timed out or reported an error.
    RemoteJob,
    /// Local data could not be parsed, decoded or encoded.
    Data,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("more than one album titled {title:?} exists ({count}); delete all albums with that title")]
    DuplicateAlbum { title: String, count: usize },

    #[error("no album titled {0:?}")]
    AlbumNotFound(String),

    #[error("annotation batch needs at least one input image")]
    EmptyBatch,

    #[error("invalid trigger payload: {0}")]
    InvalidTrigger(String),

    #[error("credentials unavailable: {0}")]
    Credentials(String),

    #[error("invalid blob locator {0:?}")]
    InvalidLocator(String),

    #[error("{operation} failed after {attempts} attempt(s): {message}")]
    Transport {
        operation: String,
        attempts: u32,
        message: String,
    },

    #[error("{operation} returned HTTP {status}: {body}")]
    Http {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("{operation} rejected: {message}")]
    Rejected { operation: String, message: String },

    #[error("annotation operation {operation} did not finish within {waited:?}")]
    AnnotationTimeout { operation: String, waited: Duration },

    #[error("annotation operation {operation} failed with code {code}: {message}")]
    AnnotationFailed {
        operation: String,
        code: i32,
        message: String,
    },

    #[error("malformed annotation result: {0}")]
    MalformedResult(String),

    #[error("no original bytes retained for {0:?}")]
    MissingOriginal(String),

    #[error("failed to decode {file:?} as an image: {source}")]
    ImageDecode {
        file: String,
        #[source]
        source: image::ImageError,
    },

    #[error("face {index} of {file:?} has an empty crop rectangle")]
    EmptyCrop { file: String, index: usize },

    #[error("embedded metadata is {0} bytes, larger than a JPEG APP1 segment allows")]
    MetadataTooLarge(usize),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateAlbum { .. }
            | Self::AlbumNotFound(_)
            | Self::EmptyBatch
            | Self::InvalidTrigger(_)
            | Self::Credentials(_)
            | Self::InvalidLocator(_) => ErrorKind::Precondition,
            Self::Transport { .. } | Self::Http { .. } | Self::Rejected { .. } => ErrorKind::Network,
            Self::AnnotationTimeout { .. } | Self::AnnotationFailed { .. } => ErrorKind::RemoteJob,
            Self::MalformedResult(_)
            | Self::MissingOriginal(_)
            | Self::ImageDecode { .. }
            | Self::EmptyCrop { .. }
            | Self::MetadataTooLarge(_)
            | Self::Image(_)
            | Self::Exif(_)
            | Self::Json(_)
            | Self::Io(_) => ErrorKind::Data,
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
