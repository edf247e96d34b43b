//! In-memory [`AssetStore`].
//!
//! Holds descriptors in a map and derives processed variants arithmetically:
//! dimensions and URIs are exact, pixels are not resampled (a variant carries
//! its source's bytes). Good for demos, tests and sites whose images are
//! already pre-rendered at every size.

use std::collections::HashMap;

use crate::image::asset::{
    AssetStore, FileKind, ImageDescriptor, ProcessedImage, ProcessingInstructions, Resolution,
    ResolveError,
};

enum Entry {
    File(ImageDescriptor),
    Folder,
}

/// A single storage rooted at `storage_root` (e.g. `fileadmin/`).
pub struct MemoryAssetStore {
    storage_root: String,
    processed_folder: String,
    entries: HashMap<String, Entry>,
    relations: HashMap<(String, String, u64), Vec<String>>,
    online: bool,
}

impl MemoryAssetStore {
    pub fn new(storage_root: impl Into<String>) -> Self {
        let storage_root = storage_root.into().trim_matches('/').to_owned() + "/";
        Self {
            processed_folder: format!("/{storage_root}_processed_"),
            storage_root,
            entries: HashMap::new(),
            relations: HashMap::new(),
            online: true,
        }
    }

    pub fn insert(&mut self, image: ImageDescriptor) -> &mut Self {
        self.entries.insert(image.identifier.clone(), Entry::File(image));
        self
    }

    pub fn insert_folder(&mut self, identifier: impl Into<String>) -> &mut Self {
        self.entries.insert(identifier.into(), Entry::Folder);
        self
    }

    /// Relates stored files to a record, e.g. `("pages", "media", 12)`.
    pub fn relate(&mut self, table: &str, field: &str, uid: u64, identifiers: &[&str]) -> &mut Self {
        self.relations.insert(
            (table.to_owned(), field.to_owned(), uid),
            identifiers.iter().map(|s| (*s).to_owned()).collect(),
        );
        self
    }

    /// Simulates the storage going away (unmounted share, missing driver).
    pub fn set_online(&mut self, online: bool) -> &mut Self {
        self.online = online;
        self
    }

    fn check_online(&self) -> Result<(), ResolveError> {
        if self.online {
            Ok(())
        } else {
            Err(ResolveError::StorageUnavailable(self.storage_root.clone()))
        }
    }
}

/// Width and height after crop and scaling, never upscaled.
fn target_size(image: &ImageDescriptor, instructions: &ProcessingInstructions) -> (u32, u32) {
    let (w, h) = match instructions.crop {
        Some(area) => (area.width.round() as u32, area.height.round() as u32),
        None => (image.width, image.height),
    };
    if w == 0 || h == 0 {
        return (w, h);
    }

    let ratio = f64::from(w) / f64::from(h);
    let mut target_w = w;
    if let Some(width) = instructions.width {
        target_w = target_w.min(width);
    } else if let Some(height) = instructions.height {
        target_w = target_w.min((f64::from(height) * ratio).round() as u32);
    }
    if let Some(max) = instructions.max_width {
        target_w = target_w.min(max);
    }
    let mut target_h = (f64::from(target_w) / ratio).round() as u32;
    if let Some(max) = instructions.max_height {
        if target_h > max {
            target_h = max;
            target_w = (f64::from(max) * ratio).round() as u32;
        }
    }
    (target_w.max(1), target_h.max(1))
}

fn stem_and_extension(identifier: &str) -> (&str, &str) {
    let name = identifier.rsplit('/').next().unwrap_or(identifier);
    name.rsplit_once('.').unwrap_or((name, ""))
}

impl AssetStore for MemoryAssetStore {
    fn resolve(&self, path: &str) -> Resolution<ImageDescriptor> {
        let path = path.trim_start_matches('/');
        if !path.starts_with(&self.storage_root) {
            return Resolution::Failed(ResolveError::OutsideStorage(path.to_owned()));
        }
        if let Err(e) = self.check_online() {
            return Resolution::Failed(e);
        }
        match self.entries.get(path) {
            Some(Entry::File(image)) => Resolution::Found(image.clone()),
            Some(Entry::Folder) => Resolution::Failed(ResolveError::NotAFile(path.to_owned())),
            None => Resolution::NotFound,
        }
    }

    fn find_by_relation(&self, table: &str, field: &str, uid: u64) -> Resolution<Vec<ImageDescriptor>> {
        if let Err(e) = self.check_online() {
            return Resolution::Failed(e);
        }
        let key = (table.to_owned(), field.to_owned(), uid);
        let files = self.relations.get(&key)
            .into_iter()
            .flatten()
            .filter_map(|id| match self.entries.get(id) {
                Some(Entry::File(image)) => Some(image.clone()),
                _ => None,
            })
            .collect();
        Resolution::Found(files)
    }

    fn process(&self, image: &ImageDescriptor, instructions: &ProcessingInstructions) -> Resolution<ProcessedImage> {
        if let Err(e) = self.check_online() {
            return Resolution::Failed(e);
        }
        let (width, height) = target_size(image, instructions);

        // Vectors scale in the browser; only their layout size changes.
        if image.is_svg() {
            return Resolution::Found(ProcessedImage {
                width,
                height,
                mime_type: image.mime_type.clone(),
                uri: image.public_uri.clone(),
                content: image.content.clone(),
            });
        }

        let (stem, source_ext) = stem_and_extension(&image.identifier);
        let extension = match (&instructions.file_extension, image.kind) {
            (Some(ext), _) => ext.trim_start_matches('.').to_ascii_lowercase(),
            (None, FileKind::Image) => source_ext.to_ascii_lowercase(),
            // Documents are rendered to a preview image.
            (None, _) => "png".to_owned(),
        };
        let mime_type = mime_guess::from_ext(&extension)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_owned();

        let crop_tag = instructions.crop.map_or_else(String::new, |a| {
            format!("_c{}-{}-{}-{}", a.x.round(), a.y.round(), a.width.round(), a.height.round())
        });
        let uri = format!("{}/{stem}_{width}x{height}{crop_tag}.{extension}", self.processed_folder);

        Resolution::Found(ProcessedImage {
            width,
            height,
            mime_type,
            uri,
            content: image.content.clone(),
        })
    }
}
