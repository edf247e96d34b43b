//! Responsive `<picture>` markup.
//!
//! ```text
//! <picture class="…" style="--aspect-ratio: 1.78%;--width: 1120px;">
//! <source media="(min-width: 1200px)" srcset="/…/hero_1920x1080.jpg" />
//! <source media="(min-width: 800px)" srcset="/…/hero_1200x675.jpg" />
//! <img width="1120" height="630" class="img-fluid" itemprop="image" alt="…" title="…" src="…" loading="lazy" … />
//! </picture>
//! ```
//!
//! Browsers take the first `<source>` whose media query matches, so sources
//! are emitted widest breakpoint first.
//!
//! Missing media is a content problem, not a template bug: when the image
//! cannot be resolved or processed the renderer returns an empty string.
//! Asking for zero or several image sources at once is a template bug and
//! fails with [`Error::InvalidImageSource`].

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use crate::config::PageTypes;
use crate::context::RenderContext;
use crate::error::Error;
use crate::html::TagBuilder;
use crate::image::asset::{
    AssetStore, ImageDescriptor, ProcessedImage, ProcessingInstructions, ProcessingSpec, Unresolved,
    is_svg,
};
use crate::image::crop::CropVariantCollection;

/// Placeholders up to this many bytes are inlined as data URIs.
pub const PLACEHOLDER_INLINE_LIMIT: usize = 4096;

/// Everything a template can say about one picture.
#[derive(Clone, Debug)]
pub struct PictureOptions {
    /// Store-relative path. Empty means "not given".
    pub path: String,
    /// An already resolved file.
    pub image: Option<ImageDescriptor>,
    /// Page uid whose first `media` relation is rendered.
    pub page: Option<u64>,
    /// Processing for the `<img>` fallback and the layout metadata.
    pub src: ProcessingSpec,
    /// Crop variant used when a [`ProcessingSpec`] names none.
    pub crop_variant: String,
    /// Breakpoint min-width in px → processing for that `<source>`.
    pub srcset: BTreeMap<u32, ProcessingSpec>,
    pub lazy: bool,
    pub eager: bool,
    pub file_extension: Option<String>,
    pub aspect_ratio: Option<f64>,
    /// Low-resolution variant shown while a lazy image loads.
    pub placeholder: Option<ProcessingSpec>,
    pub class: Option<String>,
    pub style: Option<String>,
    pub title: Option<String>,
    pub image_title: Option<String>,
    pub alt: Option<String>,
    /// Extra attributes for the `<picture>` element.
    pub attributes: Vec<(String, String)>,
    /// Markup appended after the `<img>`.
    pub content: String,
}

impl Default for PictureOptions {
    fn default() -> Self {
        Self {
            path: String::new(),
            image: None,
            page: None,
            src: ProcessingSpec::width(1120).crop_variant("desktop"),
            crop_variant: "default".to_owned(),
            srcset: BTreeMap::new(),
            lazy: true,
            eager: false,
            file_extension: None,
            aspect_ratio: None,
            placeholder: None,
            class: None,
            style: None,
            title: None,
            image_title: None,
            alt: None,
            attributes: Vec::new(),
            content: String::new(),
        }
    }
}

impl PictureOptions {
    pub fn path(path: impl Into<String>) -> Self {
        Self { path: path.into(), ..Self::default() }
    }

    pub fn image(image: ImageDescriptor) -> Self {
        Self { image: Some(image), ..Self::default() }
    }

    pub fn page(uid: u64) -> Self {
        Self { page: Some(uid), ..Self::default() }
    }

    pub fn src(mut self, spec: ProcessingSpec) -> Self {
        self.src = spec;
        self
    }

    pub fn breakpoint(mut self, min_width: u32, spec: ProcessingSpec) -> Self {
        self.srcset.insert(min_width, spec);
        self
    }

    fn source_count(&self) -> usize {
        usize::from(!self.path.is_empty())
            + usize::from(self.image.is_some())
            + usize::from(self.page.is_some())
    }
}

/// Renders [`PictureOptions`] against an [`AssetStore`].
#[derive(Clone)]
pub struct PictureRenderer {
    store: Arc<dyn AssetStore>,
    page_types: PageTypes,
}

impl PictureRenderer {
    pub fn new(store: Arc<dyn AssetStore>, page_types: PageTypes) -> Self {
        Self { store, page_types }
    }

    /// Renders the picture, or `""` if its image cannot be resolved.
    pub fn render(&self, ctx: &RenderContext, options: &PictureOptions) -> Result<String, Error> {
        let given = options.source_count();
        if given != 1 {
            return Err(Error::InvalidImageSource { given });
        }

        match self.try_render(ctx, options) {
            Ok(markup) => Ok(markup),
            Err(Unresolved::NotFound) => {
                debug!(path = %options.path, "picture source not found, rendering nothing");
                Ok(String::new())
            }
            Err(Unresolved::Failed(e)) => {
                debug!(
                    path = %options.path,
                    error = %e,
                    "picture source unusable, rendering nothing"
                );
                Ok(String::new())
            }
        }
    }

    fn try_render(
        &self,
        ctx: &RenderContext,
        options: &PictureOptions,
    ) -> Result<String, Unresolved> {
        let Some(mut image) = self.resolve(options)? else {
            return Ok(String::new());
        };

        let mut tag = TagBuilder::new("picture");
        for (name, value) in &options.attributes {
            tag.add_attribute(name, value.as_str());
        }
        let class = options.class.as_deref().unwrap_or("");
        if options.aspect_ratio.is_some() {
            tag.add_attribute("class", format!("{class} ratio"));
        } else {
            tag.add_attribute("class", class);
        }

        let (width, aspect_ratio) = if image.is_svg() {
            let natural = image.width;
            let limit = options.src.width.or(options.src.max_width).unwrap_or(natural);
            let ratio = options
                .aspect_ratio
                .unwrap_or_else(|| aspect_ratio(image.width, image.height));
            (natural.min(limit), ratio)
        } else {
            let processed = self.process(&image, &options.src, options)?;
            let ratio = options
                .aspect_ratio
                .unwrap_or_else(|| aspect_ratio(processed.width, processed.height));
            (processed.width, ratio)
        };

        // Documents (PDF, …) are only processed once into a preview.
        if !image.is_image() {
            let preview = self.process(&image, &options.src, options)?;
            image = preview.into_descriptor(&image);
        }

        let style = format!(
            "--aspect-ratio: {aspect_ratio}%;--width: {width}px; {}",
            options.style.as_deref().unwrap_or("")
        );
        tag.add_attribute("style", style.trim_end());

        let parts = [
            self.source_tags(&image, options)?,
            self.img_tag(ctx, &image, options)?,
            options.content.clone(),
        ];
        let content: Vec<&str> = parts
            .iter()
            .map(String::as_str)
            .filter(|p| !p.is_empty())
            .collect();
        tag.set_content(content.join("\n"));

        Ok(tag.render())
    }

    fn resolve(&self, options: &PictureOptions) -> Result<Option<ImageDescriptor>, Unresolved> {
        if let Some(image) = &options.image {
            return Ok(Some(image.clone()));
        }
        if let Some(uid) = options.page {
            let files = self.store.find_by_relation("pages", "media", uid).into_result()?;
            return Ok(files.into_iter().next());
        }
        self.store.resolve(&options.path).into_result().map(Some)
    }

    fn process(
        &self,
        image: &ImageDescriptor,
        spec: &ProcessingSpec,
        options: &PictureOptions,
    ) -> Result<ProcessedImage, Unresolved> {
        let mut instructions = ProcessingInstructions::from(spec);

        if let Some(crop) = image.crop.as_deref().filter(|c| !c.is_empty()) {
            let variant = spec.crop_variant.as_deref().unwrap_or(&options.crop_variant);
            let area = CropVariantCollection::parse(crop).crop_area(variant);
            instructions.crop =
                (!area.is_empty()).then(|| area.make_absolute(image.width, image.height));
        }
        if let Some(ext) = options.file_extension.as_deref().filter(|e| !e.is_empty()) {
            instructions.file_extension = Some(ext.to_owned());
        }

        self.store.process(image, &instructions).into_result()
    }

    fn source_tags(
        &self,
        image: &ImageDescriptor,
        options: &PictureOptions,
    ) -> Result<String, Unresolved> {
        if image.is_svg() {
            return Ok(source_tag(&image.public_uri, 1));
        }

        let mut tags = Vec::with_capacity(options.srcset.len());
        for (&min_width, spec) in options.srcset.iter().rev() {
            let processed = self.process(image, spec, options)?;
            tags.push(source_tag(&processed.uri, min_width));
        }
        Ok(tags.join("\n"))
    }

    fn img_tag(
        &self,
        ctx: &RenderContext,
        image: &ImageDescriptor,
        options: &PictureOptions,
    ) -> Result<String, Unresolved> {
        let processed = self.process(image, &options.src, options)?;

        let mut tag = TagBuilder::new("img");
        tag.add_attribute("width", processed.width.to_string())
            .add_attribute("height", processed.height.to_string())
            .add_attribute("class", "img-fluid")
            .add_attribute("itemprop", "image")
            .add_attribute("alt", image_alt(image, options))
            .add_attribute("title", image_title(image, options))
            .add_attribute("src", processed.uri.as_str());

        if ctx.page_type() == self.page_types.print || options.eager {
            tag.add_attribute("loading", "eager")
                .add_attribute("fetchpriority", "high")
                .remove_attribute("decoding");
        } else if options.lazy {
            tag.add_attribute("loading", "lazy")
                .add_attribute("decoding", "async")
                .add_attribute("fetchpriority", "low");
            if let Some(spec) = &options.placeholder {
                let placeholder = self.process(image, spec, options)?;
                let uri = placeholder_uri(&placeholder);
                tag.add_attribute(
                    "style",
                    format!("background-image: url({uri}); background-size: cover;"),
                );
            }
        }

        Ok(tag.render())
    }
}

fn source_tag(uri: &str, min_width: u32) -> String {
    let mut tag = TagBuilder::new("source");
    tag.add_attribute("media", format!("(min-width: {min_width}px)"))
        .add_attribute("srcset", uri);
    tag.render()
}

/// Inline small raster placeholders, reference everything else.
fn placeholder_uri(placeholder: &ProcessedImage) -> String {
    let raster = placeholder.mime_type.starts_with("image/") && !is_svg(&placeholder.mime_type);
    match &placeholder.content {
        Some(bytes) if raster && bytes.len() <= PLACEHOLDER_INLINE_LIMIT => {
            format!("data:{};base64,{}", placeholder.mime_type, STANDARD.encode(bytes))
        }
        _ => placeholder.uri.clone(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn image_title(image: &ImageDescriptor, options: &PictureOptions) -> String {
    non_empty(options.image_title.as_deref())
        .or(non_empty(options.title.as_deref()))
        .or(non_empty(image.title.as_deref()))
        .unwrap_or("")
        .to_owned()
}

fn image_alt(image: &ImageDescriptor, options: &PictureOptions) -> String {
    match non_empty(options.alt.as_deref()).or(non_empty(image.alternative.as_deref())) {
        Some(alt) => alt.to_owned(),
        None => image_title(image, options),
    }
}

/// `width / height` rounded to two decimals, `1.0` for degenerate sizes.
fn aspect_ratio(width: u32, height: u32) -> f64 {
    if width == 0 || height == 0 {
        return 1.0;
    }
    (f64::from(width) / f64::from(height) * 100.0).round() / 100.0
}
