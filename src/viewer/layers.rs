//! Layer interface: one entry per image layer, laid out two per row.

use std::str::FromStr;

use crate::data::ImageType;
use crate::error::LayerError;

/// Entries per layer row.
pub const LAYERS_PER_ROW: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerType {
    Image,
    LabelImage,
}

impl LayerType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            LayerType::Image => "image",
            LayerType::LabelImage => "labelImage",
        }
    }
}

impl FromStr for LayerType {
    type Err = LayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(LayerType::Image),
            "labelImage" => Ok(LayerType::LabelImage),
            other => Err(LayerError::UnsupportedLayerType(other.to_string())),
        }
    }
}

/// UI state of one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerEntry {
    pub name: String,
    pub layer_type: LayerType,
    pub visible: bool,
    pub selected: bool,
    pub tooltip: String,
}

/// Events emitted by layer entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerEvent {
    ToggleLayerVisibility(String),
    SelectLayer(String),
}

impl LayerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LayerEvent::ToggleLayerVisibility(_) => "TOGGLE_LAYER_VISIBILITY",
            LayerEvent::SelectLayer(_) => "SELECT_LAYER",
        }
    }

    fn layer(&self) -> &str {
        match self {
            LayerEvent::ToggleLayerVisibility(name) | LayerEvent::SelectLayer(name) => name,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LayerInterface {
    entries: Vec<LayerEntry>,
}

impl LayerInterface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer by type name.
    ///
    /// Fails with [`LayerError::UnsupportedLayerType`] for anything other
    /// than `image` or `labelImage`.
    pub fn add_layer(
        &mut self,
        name: &str,
        layer_type: &str,
        image_type: &ImageType,
    ) -> Result<&LayerEntry, LayerError> {
        let layer_type = layer_type.parse()?;
        Ok(self.add(name, layer_type, image_type))
    }

    /// Add a layer, replacing any entry with the same name.
    pub fn add(&mut self, name: &str, layer_type: LayerType, image_type: &ImageType) -> &LayerEntry {
        let description = serde_json::to_string(image_type).unwrap_or_default();
        let tooltip = match layer_type {
            LayerType::Image => format!("Image: {} Type: {}", name, description),
            LayerType::LabelImage => format!("Label image: {} Type: {}", name, description),
        };
        let entry = LayerEntry {
            name: name.to_string(),
            layer_type,
            visible: true,
            selected: false,
            tooltip,
        };

        let index = match self.entries.iter().position(|e| e.name == name) {
            Some(index) => {
                self.entries[index] = entry;
                index
            }
            None => {
                self.entries.push(entry);
                self.entries.len() - 1
            }
        };
        &self.entries[index]
    }

    /// Apply a layer event.
    pub fn handle(&mut self, event: &LayerEvent) -> Result<&LayerEntry, LayerError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.name == event.layer())
            .ok_or_else(|| LayerError::UnknownLayer(event.layer().to_string()))?;

        match event {
            LayerEvent::ToggleLayerVisibility(_) => {
                self.entries[index].visible = !self.entries[index].visible;
            }
            LayerEvent::SelectLayer(_) => {
                for (i, entry) in self.entries.iter_mut().enumerate() {
                    entry.selected = i == index;
                }
            }
        }
        Ok(&self.entries[index])
    }

    pub fn get(&self, name: &str) -> Option<&LayerEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn entries(&self) -> &[LayerEntry] {
        &self.entries
    }

    pub fn rows(&self) -> impl Iterator<Item = &[LayerEntry]> {
        self.entries.chunks(LAYERS_PER_ROW)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
