//! facerelay-backends — Concrete external collaborators.
//!
//! Google Cloud Vision for face detection and a filesystem directory for
//! blob storage.

pub mod fs_store;
pub mod vision;

pub use fs_store::FsBlobStore;
pub use vision::{VisionClient, VISION_DEFAULT_ENDPOINT};
