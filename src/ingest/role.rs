//! Content-based role inference and slot resolution.

use tracing::debug;

use super::SceneImage;
use crate::data::Image;

/// An integer image with at most this many distinct values is a label map.
pub const LABEL_DISTINCT_VALUE_THRESHOLD: usize = 64;

/// Slot an image is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    /// Primary (background) image
    Image,

    /// Label map
    LabelImage,
}

/// Decide whether a decoded image looks like a label map.
///
/// Floating-point images are never label maps. Integer images are label
/// maps when they hold at most [`LABEL_DISTINCT_VALUE_THRESHOLD`] distinct
/// sample values.
pub fn infer_role(image: &Image) -> ImageRole {
    if image.image_type.component_type.is_floating() {
        return ImageRole::Image;
    }
    let distinct = image
        .data
        .count_distinct_up_to(LABEL_DISTINCT_VALUE_THRESHOLD);
    if distinct <= LABEL_DISTINCT_VALUE_THRESHOLD {
        ImageRole::LabelImage
    } else {
        ImageRole::Image
    }
}

/// Fills the primary and label slots from a sequence of decoded images.
///
/// Explicitly supplied images occupy their slot up front. Once the label slot
/// is occupied, later images only contend for the primary slot. A slot is
/// never overwritten: the first candidate wins and later ones are dropped.
#[derive(Debug, Default)]
pub struct SlotResolver {
    image: Option<SceneImage>,
    label_image: Option<SceneImage>,
}

impl SlotResolver {
    pub fn new(image: Option<SceneImage>, label_image: Option<SceneImage>) -> Self {
        Self { image, label_image }
    }

    /// Offer one image; returns the slot it landed in, if any.
    pub fn offer(&mut self, image: Image) -> Option<ImageRole> {
        let role = if self.label_image.is_none() {
            infer_role(&image)
        } else {
            ImageRole::Image
        };

        match role {
            ImageRole::LabelImage => {
                self.label_image = Some(SceneImage::Image(image));
                Some(ImageRole::LabelImage)
            }
            ImageRole::Image if self.image.is_none() => {
                self.image = Some(SceneImage::Image(image));
                Some(ImageRole::Image)
            }
            ImageRole::Image => {
                debug!(name = %image.name, "primary image slot already filled, dropping image");
                None
            }
        }
    }

    #[cfg(test)]
    pub fn image(&self) -> Option<&SceneImage> {
        self.image.as_ref()
    }

    #[cfg(test)]
    pub fn label_image(&self) -> Option<&SceneImage> {
        self.label_image.as_ref()
    }

    /// Consume the resolver, returning `(image, label_image)`.
    pub fn into_slots(self) -> (Option<SceneImage>, Option<SceneImage>) {
        (self.image, self.label_image)
    }
}
