//! facerelay-core — Face rectangle normalization and collaborator traits.
//!
//! The normalizer converts detection-provider polygons into left-to-right
//! ordered rectangles. Detection and blob storage are external services,
//! modelled here as the `FaceDetector` and `BlobStore` capabilities.

pub mod detector;
pub mod normalizer;
pub mod storage;
pub mod types;

pub use detector::{DetectorError, FaceDetector};
pub use normalizer::normalize;
pub use storage::{BlobName, BlobReceipt, BlobStore, MemoryBlobStore, StoreError};
pub use types::{RawAnnotation, Rectangle, Vertex};
