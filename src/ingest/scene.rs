//! Scene description produced by the ingestion pipeline.

use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::chunked::ChunkedMultiscaleImage;
use crate::data::{Image, ImageType, PolyData};
use crate::error::IngestError;

// =============================================================================
// SceneImage
// =============================================================================

/// Image occupying the primary or label slot.
#[derive(Clone)]
pub enum SceneImage {
    /// Fully decoded image
    Image(Image),

    /// Remote multiscale image, materialized lazily
    Chunked(Arc<ChunkedMultiscaleImage>),
}

impl SceneImage {
    pub fn name(&self) -> String {
        match self {
            SceneImage::Image(image) => image.name.clone(),
            SceneImage::Chunked(chunked) => chunked.name(),
        }
    }

    pub fn image_type(&self) -> ImageType {
        match self {
            SceneImage::Image(image) => image.image_type,
            SceneImage::Chunked(chunked) => chunked.image_type(),
        }
    }

    pub fn is_3d(&self) -> bool {
        self.image_type().is_3d()
    }

    pub fn as_image(&self) -> Option<&Image> {
        match self {
            SceneImage::Image(image) => Some(image),
            SceneImage::Chunked(_) => None,
        }
    }
}

impl fmt::Debug for SceneImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneImage::Image(image) => f
                .debug_struct("Image")
                .field("name", &image.name)
                .field("image_type", &image.image_type)
                .field("size", &image.size)
                .finish(),
            SceneImage::Chunked(chunked) => f
                .debug_struct("Chunked")
                .field("locator", &chunked.locator().to_string())
                .field("image_type", &chunked.image_type())
                .field("scales", &chunked.scale_count())
                .finish(),
        }
    }
}

// =============================================================================
// Label names
// =============================================================================

/// Mapping from label value to display name, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelImageNames {
    entries: Vec<(i64, String)>,
}

impl LabelImageNames {
    pub fn new(entries: Vec<(i64, String)>) -> Self {
        Self { entries }
    }

    /// Parse `[[label, name], ...]` or `{"label": name, ...}`.
    pub fn from_json(value: &Value) -> Result<Self, IngestError> {
        let invalid = |what: &str| IngestError::LabelNames(what.to_string());
        let entries = match value {
            Value::Array(pairs) => pairs
                .iter()
                .map(|pair| {
                    let label = pair
                        .get(0)
                        .and_then(Value::as_i64)
                        .ok_or_else(|| invalid("label must be an integer"))?;
                    let name = pair
                        .get(1)
                        .and_then(Value::as_str)
                        .ok_or_else(|| invalid("name must be a string"))?;
                    Ok((label, name.to_string()))
                })
                .collect::<Result<Vec<_>, IngestError>>()?,
            Value::Object(map) => map
                .iter()
                .map(|(label, name)| {
                    let label = label
                        .parse::<i64>()
                        .map_err(|_| invalid("label must be an integer"))?;
                    let name = name.as_str().ok_or_else(|| invalid("name must be a string"))?;
                    Ok((label, name.to_string()))
                })
                .collect::<Result<Vec<_>, IngestError>>()?,
            _ => return Err(invalid("expected an array of [label, name] pairs")),
        };
        Ok(Self { entries })
    }

    pub fn get(&self, label: i64) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, name)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &str)> {
        self.entries.iter().map(|(l, n)| (*l, n.as_str()))
    }
}

impl Serialize for LabelImageNames {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for entry in &self.entries {
            seq.serialize_element(entry)?;
        }
        seq.end()
    }
}

// =============================================================================
// SceneDescription
// =============================================================================

/// Structured, renderable scene assembled from a set of inputs.
#[derive(Debug, Clone, Default)]
pub struct SceneDescription {
    pub image: Option<SceneImage>,
    pub label_image: Option<SceneImage>,

    /// Polydata with at least one polygon, line or strip
    pub geometries: Vec<PolyData>,

    /// Polydata made of bare points
    pub point_sets: Vec<PolyData>,

    pub label_image_names: Option<LabelImageNames>,

    pub use_2d: bool,
}

impl SceneDescription {
    /// Serializable overview of the scene, without sample data.
    pub fn summary(&self) -> SceneSummary {
        SceneSummary {
            image: self.image.as_ref().map(LayerSummary::from),
            label_image: self.label_image.as_ref().map(LayerSummary::from),
            geometries: self.geometries.iter().map(GeometrySummary::from).collect(),
            point_sets: self.point_sets.iter().map(GeometrySummary::from).collect(),
            label_image_names: self.label_image_names.clone(),
            use_2d: self.use_2d,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSummary {
    pub image: Option<LayerSummary>,
    pub label_image: Option<LayerSummary>,
    pub geometries: Vec<GeometrySummary>,
    pub point_sets: Vec<GeometrySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_image_names: Option<LabelImageNames>,
    #[serde(rename = "use2D")]
    pub use_2d: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSummary {
    pub name: String,
    pub image_type: ImageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scales: Option<usize>,
}

impl From<&SceneImage> for LayerSummary {
    fn from(image: &SceneImage) -> Self {
        match image {
            SceneImage::Image(image) => Self {
                name: image.name.clone(),
                image_type: image.image_type,
                size: Some(image.size.clone()),
                scales: None,
            },
            SceneImage::Chunked(chunked) => Self {
                name: chunked.name(),
                image_type: chunked.image_type(),
                size: None,
                scales: Some(chunked.scale_count()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometrySummary {
    pub name: String,
    pub number_of_points: usize,
    pub number_of_cells: usize,
}

impl From<&PolyData> for GeometrySummary {
    fn from(poly_data: &PolyData) -> Self {
        Self {
            name: poly_data.name.clone(),
            number_of_points: poly_data.number_of_points(),
            number_of_cells: poly_data.verts.number_of_cells()
                + poly_data.lines.number_of_cells()
                + poly_data.polys.number_of_cells()
                + poly_data.strips.number_of_cells(),
        }
    }
}
