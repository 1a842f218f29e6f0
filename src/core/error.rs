use thiserror::Error;

use super::generator::GenerateError;

#[derive(Debug, Error)]
#[error("decode failure: invalid escape {escape:?} at offset {offset}")]
pub struct DecodeError {
    pub escape: String,
    pub offset: usize,
}

/// Every way a `/generate` request can fail. Each variant is reported once.
#[derive(Debug, Error)]
pub enum DiagramError {
    #[error("unsupported image type ({0}) use svg or png")]
    UnsupportedImageType(String),
    #[error("unsupported method {0}, use GET or POST")]
    UnsupportedMethod(String),
    #[error("missing data")]
    MissingData,
    #[error("could not read query param: {0}")]
    Decode(#[from] DecodeError),
    #[error("could not read body: {0}")]
    ReadBody(String),
    #[error("invalid scale ({0}), it must be a number between 1 and 100")]
    InvalidScale(String),
    #[error("could not generate diagram: {0}")]
    Generate(#[from] GenerateError),
    #[error("could not read diagram bytes: {0}")]
    ReadArtifact(#[source] std::io::Error),
}

impl DiagramError {
    /// Malformed input is the caller's fault; anything after validation is ours.
    pub fn is_client_error(&self) -> bool {
        match self {
            DiagramError::UnsupportedImageType(_)
            | DiagramError::UnsupportedMethod(_)
            | DiagramError::MissingData
            | DiagramError::Decode(_)
            | DiagramError::ReadBody(_)
            | DiagramError::InvalidScale(_) => true,
            DiagramError::Generate(_) | DiagramError::ReadArtifact(_) => false,
        }
    }
}
