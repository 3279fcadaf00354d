use std::path::PathBuf;

use thiserror::Error;

/// Failures of a single translation call. The gateway turns every one of these into the
/// pass-through fallback, so callers above it never observe them.
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("translation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("translation service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed translation response: {0}")]
    MalformedResponse(String),

    #[error("translation backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("image {} has no pixels", path.display())]
    EmptyImage { path: PathBuf },

    #[error("text detection failed for {}: {message}", path.display())]
    Detection { path: PathBuf, message: String },

    #[error("failed to render overlay for {}: {message}", path.display())]
    Render { path: PathBuf, message: String },

    #[error("failed to encode image {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("page worker for {} stopped: {message}", path.display())]
    Worker { path: PathBuf, message: String },

    #[error("batch has no input images")]
    EmptyInput,

    #[error("none of the {attempted} input image(s) could be processed")]
    NoPagesProduced { attempted: usize },

    #[error("failed to assemble document: {0}")]
    Document(String),
}
