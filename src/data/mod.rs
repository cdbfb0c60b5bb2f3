//! Data model shared by the decoders, the ingestion pipeline and the viewer.
//!
//! - [`InputItem`]: a named blob of bytes, immutable once received
//! - [`Image`], [`ImageType`], [`PixelData`]: decoded raster data
//! - [`Mesh`], [`PolyData`]: decoded geometry
//! - [`DecodedDataset`]: the tagged result of decoding one input

mod image;
mod mesh;

use std::path::Path;

use bytes::Bytes;

use crate::error::IoError;

pub use self::image::{ComponentType, Image, ImageType, PixelData, PixelType};
pub use self::mesh::{CellArray, CellKind, Mesh, MeshCell, PolyData};

// =============================================================================
// InputItem
// =============================================================================

/// One input to the ingestion pipeline: a name (file name or URL tail) and
/// its raw content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputItem {
    name: String,
    data: Bytes,
}

impl InputItem {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Read a local file into an input item named after the file.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IoError::NotFound(path.display().to_string())
            } else {
                IoError::Local(format!("{}: {}", path.display(), e))
            }
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

// =============================================================================
// DecodedDataset
// =============================================================================

/// Payload of a decoded dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetData {
    Image(Image),
    PolyData(PolyData),
}

/// Result of decoding one input item.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedDataset {
    /// Whether this dataset asks for a 3D view
    pub is_3d: bool,

    pub data: DatasetData,
}

impl DecodedDataset {
    pub fn image(is_3d: bool, image: Image) -> Self {
        Self {
            is_3d,
            data: DatasetData::Image(image),
        }
    }

    pub fn poly_data(poly_data: PolyData) -> Self {
        Self {
            is_3d: true,
            data: DatasetData::PolyData(poly_data),
        }
    }
}
