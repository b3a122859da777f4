//! Face detection provider capability.
//!
//! The provider is an external service: image bytes go in, polygon
//! annotations come out. Implementations live in `facerelay-backends`.

use crate::types::RawAnnotation;
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("detection request failed: {0}")]
    Request(String),
    #[error("detection provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("detection provider error {code}: {message}")]
    Provider { code: i64, message: String },
    #[error("malformed detection response: {0}")]
    Parse(String),
}

/// Detects faces in an encoded image.
///
/// Returns one annotation per detected face, in provider order. An image
/// with no faces yields an empty list, not an error.
pub trait FaceDetector: Send + Sync + 'static {
    fn detect(
        &self,
        image: &[u8],
    ) -> impl Future<Output = Result<Vec<RawAnnotation>, DetectorError>> + Send;

    /// Short provider name for status reporting.
    fn name(&self) -> &str;
}
