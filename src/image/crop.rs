//! Stored crop geometry.
//!
//! Editors store crops as a JSON object keyed by variant name, each with a
//! `cropArea` relative to the image (all values in `0.0..=1.0`):
//!
//! ```json
//! {"desktop": {"cropArea": {"x": 0.1, "y": 0, "width": 0.8, "height": 1}}}
//! ```

use std::collections::HashMap;

use serde::Deserialize;

/// A rectangle, either relative (fractions) or absolute (pixels).
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
pub struct Area {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Area {
    /// The all-zero area stands for "no crop".
    pub fn is_empty(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.width == 0.0 && self.height == 0.0
    }

    /// Scales a relative area to pixels of a `width` × `height` image.
    pub fn make_absolute(&self, width: u32, height: u32) -> Area {
        let (w, h) = (f64::from(width), f64::from(height));
        Area {
            x: self.x * w,
            y: self.y * h,
            width: self.width * w,
            height: self.height * h,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CropVariant {
    #[serde(rename = "cropArea", default)]
    crop_area: Area,
}

/// All crop variants stored for one image.
#[derive(Debug, Default)]
pub struct CropVariantCollection {
    variants: HashMap<String, CropVariant>,
}

impl CropVariantCollection {
    /// Parses a stored crop string. Anything that is not the JSON shape
    /// above (legacy formats, empty strings) yields an empty collection.
    pub fn parse(raw: &str) -> Self {
        let variants = serde_json::from_str::<HashMap<String, CropVariant>>(raw)
            .unwrap_or_default();
        Self { variants }
    }

    /// The relative area of `variant`, empty if there is none.
    pub fn crop_area(&self, variant: &str) -> Area {
        self.variants.get(variant).map(|v| v.crop_area).unwrap_or_default()
    }
}
