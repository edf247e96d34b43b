//! Asset store contract: descriptors, processing instructions, lookups.

use bytes::Bytes;
use serde::Deserialize;

use crate::image::crop::Area;

/// Broad file category as reported by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Document,
    Other,
}

/// A stored file as the renderer sees it.
#[derive(Clone, Debug)]
pub struct ImageDescriptor {
    /// Store-relative identifier, e.g. `fileadmin/team/anna.jpg`.
    pub identifier: String,
    /// URI under which the unprocessed file is served.
    pub public_uri: String,
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
    pub kind: FileKind,
    /// Stored crop JSON, see [`CropVariantCollection`](crate::image::CropVariantCollection).
    pub crop: Option<String>,
    pub alternative: Option<String>,
    pub title: Option<String>,
    pub content: Option<Bytes>,
}

impl ImageDescriptor {
    pub fn is_svg(&self) -> bool {
        is_svg(&self.mime_type)
    }

    pub fn is_image(&self) -> bool {
        self.kind == FileKind::Image
    }
}

pub(crate) fn is_svg(mime_type: &str) -> bool {
    matches!(mime_type, "image/svg" | "image/svg+xml")
}

/// What the template asks for: a target width and an optional crop variant.
///
/// Deserializes from the usual camelCase template configuration:
/// `{"cropVariant": "desktop", "width": 1120}`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingSpec {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub crop_variant: Option<String>,
}

impl ProcessingSpec {
    pub fn width(width: u32) -> Self {
        Self { width: Some(width), ..Self::default() }
    }

    pub fn max_width(max_width: u32) -> Self {
        Self { max_width: Some(max_width), ..Self::default() }
    }

    pub fn crop_variant(mut self, variant: impl Into<String>) -> Self {
        self.crop_variant = Some(variant.into());
        self
    }
}

/// What the store receives: dimensions plus resolved crop and format.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProcessingInstructions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    /// Absolute crop in source pixels.
    pub crop: Option<Area>,
    pub file_extension: Option<String>,
}

impl From<&ProcessingSpec> for ProcessingInstructions {
    fn from(spec: &ProcessingSpec) -> Self {
        Self {
            width: spec.width,
            height: spec.height,
            max_width: spec.max_width,
            max_height: spec.max_height,
            crop: None,
            file_extension: None,
        }
    }
}

/// A derived variant, owned by the store.
#[derive(Clone, Debug)]
pub struct ProcessedImage {
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
    pub uri: String,
    pub content: Option<Bytes>,
}

impl ProcessedImage {
    /// Treats the variant as a source file of its own, keeping the
    /// original's metadata. Documents are rendered through their preview.
    pub fn into_descriptor(self, original: &ImageDescriptor) -> ImageDescriptor {
        let extension = self.uri.rsplit_once('.').map_or("", |(_, ext)| ext);
        let identifier = match original.identifier.rsplit_once('.') {
            Some((stem, _)) if !extension.is_empty() => format!("{stem}.{extension}"),
            _ => original.identifier.clone(),
        };
        ImageDescriptor {
            identifier,
            public_uri: self.uri,
            width: self.width,
            height: self.height,
            mime_type: self.mime_type,
            kind: FileKind::Image,
            crop: None,
            alternative: original.alternative.clone(),
            title: original.title.clone(),
            content: self.content,
        }
    }
}

/// Why a lookup found something unusable.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("`{0}` is a folder, not a file")]
    NotAFile(String),
    #[error("`{0}` is outside of any storage")]
    OutsideStorage(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// Outcome of a store lookup.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution<T> {
    Found(T),
    NotFound,
    Failed(ResolveError),
}

/// A lookup that did not produce a value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Unresolved {
    NotFound,
    Failed(ResolveError),
}

impl<T> Resolution<T> {
    pub fn into_result(self) -> Result<T, Unresolved> {
        match self {
            Self::Found(v) => Ok(v),
            Self::NotFound => Err(Unresolved::NotFound),
            Self::Failed(e) => Err(Unresolved::Failed(e)),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolution<U> {
        match self {
            Self::Found(v) => Resolution::Found(f(v)),
            Self::NotFound => Resolution::NotFound,
            Self::Failed(e) => Resolution::Failed(e),
        }
    }
}

/// Where images come from and where processed variants are made.
///
/// Processing is deterministic: the same descriptor and instructions always
/// yield the same variant. Caching variants is the store's business.
pub trait AssetStore: Send + Sync {
    /// Looks up a file by store-relative path.
    fn resolve(&self, path: &str) -> Resolution<ImageDescriptor>;

    /// Files related to record `uid` of `table` through `field`, in sorting
    /// order (e.g. `pages`, `media`).
    fn find_by_relation(&self, table: &str, field: &str, uid: u64) -> Resolution<Vec<ImageDescriptor>>;

    fn process(&self, image: &ImageDescriptor, instructions: &ProcessingInstructions) -> Resolution<ProcessedImage>;
}
