//! OME-Zarr (v2 storage) multiscale metadata.
//!
//! A multiscale dataset is a directory holding a `.zattrs` document with a
//! `multiscales` list and one array per scale, each described by `.zarray`:
//!
//! ```text
//! head.zarr/
//! ├── .zattrs          multiscales[0]: axes, datasets[path, transforms]
//! ├── 0/.zarray        finest scale: shape, chunks, dtype, fill_value
//! ├── 0/0.0.0          chunk (C order, uncompressed)
//! └── 1/.zarray        next coarser scale
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data::{ComponentType, ImageType};
use crate::error::ChunkedImageError;

/// Axis order assumed when `.zattrs` predates explicit axes.
const DEFAULT_AXES: [&str; 5] = ["t", "c", "z", "y", "x"];

// =============================================================================
// Axes
// =============================================================================

/// Role of an array axis in the materialized image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AxisRole {
    X,
    Y,
    Z,
    Channel,
    Time,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub name: String,

    /// `space`, `channel`, `time` or a custom type, when declared
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Axis {
    pub fn role(&self) -> AxisRole {
        match self.name.to_lowercase().as_str() {
            "x" => AxisRole::X,
            "y" => AxisRole::Y,
            "z" => AxisRole::Z,
            "c" => AxisRole::Channel,
            "t" => AxisRole::Time,
            _ => match self.kind.as_deref() {
                Some("channel") => AxisRole::Channel,
                Some("time") => AxisRole::Time,
                _ => AxisRole::Other,
            },
        }
    }
}

// =============================================================================
// Array metadata
// =============================================================================

/// Parsed `dtype` string such as `<u2` or `>f4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dtype {
    pub component_type: ComponentType,
    pub little_endian: bool,
}

impl Dtype {
    pub fn parse(s: &str) -> Result<Self, ChunkedImageError> {
        let unsupported = || ChunkedImageError::UnsupportedDtype(s.to_string());
        let mut chars = s.chars();
        let little_endian = match chars.next() {
            Some('<') | Some('|') => true,
            Some('>') => false,
            _ => return Err(unsupported()),
        };
        let rest = chars.as_str();
        let component_type = match rest {
            "i1" => ComponentType::Int8,
            "u1" => ComponentType::UInt8,
            "i2" => ComponentType::Int16,
            "u2" => ComponentType::UInt16,
            "i4" => ComponentType::Int32,
            "u4" => ComponentType::UInt32,
            "i8" => ComponentType::Int64,
            "u8" => ComponentType::UInt64,
            "f4" => ComponentType::Float32,
            "f8" => ComponentType::Float64,
            _ => return Err(unsupported()),
        };
        Ok(Self {
            component_type,
            little_endian,
        })
    }
}

/// One scale level's array description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayMetadata {
    pub shape: Vec<usize>,
    pub chunks: Vec<usize>,
    pub dtype: Dtype,
    pub fill_value: f64,
    pub dimension_separator: String,
}

#[derive(Deserialize)]
struct RawArray {
    shape: Vec<usize>,
    chunks: Vec<usize>,
    dtype: String,
    #[serde(default)]
    compressor: Option<Value>,
    #[serde(default)]
    order: Option<String>,
    #[serde(default)]
    fill_value: Value,
    #[serde(default)]
    dimension_separator: Option<String>,
}

impl ArrayMetadata {
    /// Parse and validate a `.zarray` document.
    pub fn from_json(value: &Value) -> Result<Self, ChunkedImageError> {
        let raw: RawArray = serde_json::from_value(value.clone())
            .map_err(|e| ChunkedImageError::Metadata(format!(".zarray: {}", e)))?;

        if let Some(compressor) = raw.compressor {
            let id = compressor
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            return Err(ChunkedImageError::UnsupportedCompressor(id));
        }
        match raw.order.as_deref() {
            None | Some("C") => {}
            Some(other) => return Err(ChunkedImageError::UnsupportedOrder(other.to_string())),
        }
        if raw.shape.len() != raw.chunks.len() {
            return Err(ChunkedImageError::Metadata(format!(
                "shape has {} axes but chunks has {}",
                raw.shape.len(),
                raw.chunks.len()
            )));
        }
        if raw.chunks.iter().any(|&c| c == 0) {
            return Err(ChunkedImageError::Metadata("zero chunk extent".to_string()));
        }

        let fill_value = match &raw.fill_value {
            Value::Null => 0.0,
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| ChunkedImageError::Metadata(format!("fill_value {}", n)))?,
            Value::String(s) if s == "NaN" => f64::NAN,
            Value::String(s) if s == "Infinity" => f64::INFINITY,
            Value::String(s) if s == "-Infinity" => f64::NEG_INFINITY,
            other => {
                return Err(ChunkedImageError::Metadata(format!(
                    "unsupported fill_value {}",
                    other
                )))
            }
        };

        let dimension_separator = match raw.dimension_separator.as_deref() {
            None | Some(".") => ".".to_string(),
            Some("/") => "/".to_string(),
            Some(other) => {
                return Err(ChunkedImageError::Metadata(format!(
                    "dimension_separator {:?}",
                    other
                )))
            }
        };

        Ok(Self {
            shape: raw.shape,
            chunks: raw.chunks,
            dtype: Dtype::parse(&raw.dtype)?,
            fill_value,
            dimension_separator,
        })
    }

    /// Storage key of the chunk at the given grid position.
    pub fn chunk_key(&self, grid: &[usize]) -> String {
        grid.iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(&self.dimension_separator)
    }

    /// Number of chunks along each axis.
    pub fn chunk_grid(&self) -> Vec<usize> {
        self.shape
            .iter()
            .zip(&self.chunks)
            .map(|(s, c)| s.div_ceil(*c))
            .collect()
    }
}

// =============================================================================
// Multiscale metadata
// =============================================================================

/// One entry of `multiscales[0].datasets`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleDataset {
    pub path: String,

    /// Per-axis scale, empty when not declared
    pub scale: Vec<f64>,

    /// Per-axis translation, empty when not declared
    pub translation: Vec<f64>,
}

#[derive(Deserialize)]
struct RawAttrs {
    multiscales: Vec<RawMultiscale>,
}

#[derive(Deserialize)]
struct RawMultiscale {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    axes: Option<Vec<RawAxis>>,
    datasets: Vec<RawDataset>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAxis {
    Name(String),
    Object {
        name: String,
        #[serde(rename = "type", default)]
        kind: Option<String>,
    },
}

#[derive(Deserialize)]
struct RawDataset {
    path: String,
    #[serde(rename = "coordinateTransformations", default)]
    transforms: Vec<RawTransform>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawTransform {
    Scale {
        scale: Vec<f64>,
    },
    Translation {
        translation: Vec<f64>,
    },
    #[serde(other)]
    Other,
}

/// Parsed multiscale description, finest scale first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiscaleMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub axes: Vec<Axis>,

    pub datasets: Vec<ScaleDataset>,

    /// Array description per dataset, same order as `datasets`
    pub arrays: Vec<ArrayMetadata>,
}

/// Parse the `datasets` of `.zattrs` without the per-scale arrays.
pub(crate) fn parse_attrs(
    attrs: &Value,
) -> Result<(Option<String>, Option<Vec<Axis>>, Vec<ScaleDataset>), ChunkedImageError> {
    let raw: RawAttrs = serde_json::from_value(attrs.clone())
        .map_err(|e| ChunkedImageError::Metadata(format!(".zattrs: {}", e)))?;
    let multiscale = raw
        .multiscales
        .into_iter()
        .next()
        .ok_or_else(|| ChunkedImageError::Metadata("empty multiscales".to_string()))?;
    if multiscale.datasets.is_empty() {
        return Err(ChunkedImageError::Metadata("no datasets".to_string()));
    }

    let axes = multiscale.axes.map(|axes| {
        axes.into_iter()
            .map(|axis| match axis {
                RawAxis::Name(name) => Axis { name, kind: None },
                RawAxis::Object { name, kind } => Axis { name, kind },
            })
            .collect()
    });

    let datasets = multiscale
        .datasets
        .into_iter()
        .map(|dataset| {
            let mut scale = Vec::new();
            let mut translation = Vec::new();
            for transform in dataset.transforms {
                match transform {
                    RawTransform::Scale { scale: s } => scale = s,
                    RawTransform::Translation { translation: t } => translation = t,
                    RawTransform::Other => {}
                }
            }
            ScaleDataset {
                path: dataset.path,
                scale,
                translation,
            }
        })
        .collect();

    Ok((multiscale.name, axes, datasets))
}

impl MultiscaleMetadata {
    /// Assemble metadata from a `.zattrs` document and one `.zarray`
    /// document per dataset.
    pub fn from_documents(attrs: &Value, arrays: &[Value]) -> Result<Self, ChunkedImageError> {
        let (name, axes, datasets) = parse_attrs(attrs)?;
        if arrays.len() != datasets.len() {
            return Err(ChunkedImageError::Metadata(format!(
                "{} datasets but {} array documents",
                datasets.len(),
                arrays.len()
            )));
        }
        let arrays = arrays
            .iter()
            .map(ArrayMetadata::from_json)
            .collect::<Result<Vec<_>, _>>()?;
        Self::assemble(name, axes, datasets, arrays)
    }

    pub(crate) fn assemble(
        name: Option<String>,
        axes: Option<Vec<Axis>>,
        datasets: Vec<ScaleDataset>,
        arrays: Vec<ArrayMetadata>,
    ) -> Result<Self, ChunkedImageError> {
        let ndim = arrays.first().map(|a| a.shape.len()).unwrap_or(0);
        let axes = match axes {
            Some(axes) => axes,
            None if ndim <= DEFAULT_AXES.len() => DEFAULT_AXES[DEFAULT_AXES.len() - ndim..]
                .iter()
                .map(|name| Axis {
                    name: name.to_string(),
                    kind: None,
                })
                .collect(),
            None => {
                return Err(ChunkedImageError::Metadata(format!(
                    "{} dimensional array without axes",
                    ndim
                )))
            }
        };

        for (dataset, array) in datasets.iter().zip(&arrays) {
            if array.shape.len() != axes.len() {
                return Err(ChunkedImageError::Metadata(format!(
                    "dataset {} has {} axes, expected {}",
                    dataset.path,
                    array.shape.len(),
                    axes.len()
                )));
            }
            for transform in [&dataset.scale, &dataset.translation] {
                if !transform.is_empty() && transform.len() != axes.len() {
                    return Err(ChunkedImageError::Metadata(format!(
                        "dataset {} transform has {} values, expected {}",
                        dataset.path,
                        transform.len(),
                        axes.len()
                    )));
                }
            }
        }

        Ok(Self {
            name,
            axes,
            datasets,
            arrays,
        })
    }

    /// Index of the first axis with the given role.
    pub fn axis_index(&self, role: AxisRole) -> Option<usize> {
        self.axes.iter().position(|axis| axis.role() == role)
    }

    /// Infer the image type of a materialized scale.
    ///
    /// Spatial axes give the dimension, the channel axis extent gives the
    /// component count and the dtype gives the component type.
    pub fn image_type(&self) -> Result<ImageType, ChunkedImageError> {
        let array = self
            .arrays
            .first()
            .ok_or_else(|| ChunkedImageError::Metadata("no arrays".to_string()))?;

        let dimension = self
            .axes
            .iter()
            .filter(|axis| matches!(axis.role(), AxisRole::X | AxisRole::Y | AxisRole::Z))
            .count();
        if self.axis_index(AxisRole::X).is_none() || self.axis_index(AxisRole::Y).is_none() {
            return Err(ChunkedImageError::Metadata(
                "x and y axes are required".to_string(),
            ));
        }

        let components = self
            .axis_index(AxisRole::Channel)
            .map(|i| array.shape[i])
            .unwrap_or(1);

        Ok(ImageType::new(
            dimension,
            array.dtype.component_type,
            components,
        ))
    }
}
