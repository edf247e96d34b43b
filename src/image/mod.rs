//! Image lookup, crop geometry and `<picture>` rendering.

pub mod asset;
pub mod crop;
pub mod memory;
pub mod picture;

pub use asset::{
    AssetStore, FileKind, ImageDescriptor, ProcessedImage, ProcessingInstructions, ProcessingSpec, Resolution,
    ResolveError, Unresolved,
};
pub use crop::{Area, CropVariantCollection};
pub use memory::MemoryAssetStore;
pub use picture::{PictureOptions, PictureRenderer};
