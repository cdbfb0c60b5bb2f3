use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::metadata::{parse_attrs, ArrayMetadata, AxisRole, MultiscaleMetadata};
use crate::data::{ComponentType, Image, ImageType, PixelData};
use crate::error::{ChunkedImageError, IoError};
use crate::io::{ChunkCache, Fetcher, Locator};

/// Remote multiscale image that materializes scale levels on demand.
///
/// Construction is two-step: [`ChunkedMultiscaleImage::parse_metadata`]
/// fetches and validates the metadata documents, then [`new`](Self::new)
/// wraps them. Chunks are fetched through a shared [`ChunkCache`].
pub struct ChunkedMultiscaleImage {
    locator: Locator,
    metadata: MultiscaleMetadata,
    image_type: ImageType,
    chunks: ChunkCache,
    top_level: OnceCell<Image>,
}

impl ChunkedMultiscaleImage {
    /// Fetch `.zattrs` and every dataset's `.zarray` below `locator`.
    ///
    /// Any failure is fatal for this locator.
    pub async fn parse_metadata(
        fetcher: &dyn Fetcher,
        locator: &Locator,
    ) -> Result<(MultiscaleMetadata, ImageType), ChunkedImageError> {
        let attrs = fetcher.fetch_json(&locator.join(".zattrs")?).await?;
        let (name, axes, datasets) = parse_attrs(&attrs)?;

        let mut arrays = Vec::with_capacity(datasets.len());
        for dataset in &datasets {
            let key = format!("{}/.zarray", dataset.path.trim_end_matches('/'));
            let document = fetcher.fetch_json(&locator.join(&key)?).await?;
            arrays.push(ArrayMetadata::from_json(&document)?);
        }

        let metadata = MultiscaleMetadata::assemble(name, axes, datasets, arrays)?;
        let image_type = metadata.image_type()?;
        debug!(
            %locator,
            scales = metadata.datasets.len(),
            dimension = image_type.dimension,
            "parsed multiscale metadata"
        );
        Ok((metadata, image_type))
    }

    pub fn new(
        locator: Locator,
        metadata: MultiscaleMetadata,
        image_type: ImageType,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            locator,
            metadata,
            image_type,
            chunks: ChunkCache::new(fetcher),
            top_level: OnceCell::new(),
        }
    }

    /// Parse metadata and construct the adapter in one call.
    pub async fn open(
        fetcher: Arc<dyn Fetcher>,
        locator: Locator,
    ) -> Result<Self, ChunkedImageError> {
        let (metadata, image_type) = Self::parse_metadata(fetcher.as_ref(), &locator).await?;
        Ok(Self::new(locator, metadata, image_type, fetcher))
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn metadata(&self) -> &MultiscaleMetadata {
        &self.metadata
    }

    pub fn image_type(&self) -> ImageType {
        self.image_type
    }

    pub fn scale_count(&self) -> usize {
        self.metadata.datasets.len()
    }

    /// Display name: the multiscale name, or the locator's last segment.
    pub fn name(&self) -> String {
        self.metadata
            .name
            .clone()
            .unwrap_or_else(|| self.locator.file_name())
    }

    /// Materialize the coarsest scale. The result is memoized.
    pub async fn top_level_largest_image(&self) -> Result<Image, ChunkedImageError> {
        let coarsest = self.scale_count().saturating_sub(1);
        let image = self
            .top_level
            .get_or_try_init(|| self.scale_image(coarsest))
            .await?;
        Ok(image.clone())
    }

    /// Materialize one scale level (0 is the finest).
    ///
    /// Time and unnamed axes are fixed at index 0. Chunks that do not exist
    /// take the array's fill value.
    pub async fn scale_image(&self, scale: usize) -> Result<Image, ChunkedImageError> {
        let count = self.scale_count();
        let (dataset, array) = self
            .metadata
            .datasets
            .get(scale)
            .zip(self.metadata.arrays.get(scale))
            .ok_or(ChunkedImageError::ScaleOutOfRange { scale, count })?;

        let layout = OutputLayout::new(&self.metadata, array)?;
        let element_size = array.dtype.component_type.size();
        let fill = encode_scalar(
            array.dtype.component_type,
            array.fill_value,
            array.dtype.little_endian,
        );
        let mut out = filled_buffer(&fill, layout.total_elements())?;

        let chunk_bytes = checked_product(array.chunks.iter().copied().chain([element_size]))
            .ok_or_else(|| ChunkedImageError::Metadata("chunk shape is too large".to_string()))?;
        let base = self
            .locator
            .join(dataset.path.trim_end_matches('/'))?;

        for grid in chunk_positions(&layout.grid_extent(array)) {
            let key = array.chunk_key(&grid);
            let bytes = match self.chunks.get(&base.join(&key)?).await {
                Ok(bytes) => bytes,
                Err(IoError::NotFound(_)) => {
                    debug!(chunk = %key, "missing chunk, using fill value");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if bytes.len() != chunk_bytes {
                return Err(ChunkedImageError::InvalidChunk {
                    key,
                    expected: chunk_bytes,
                    actual: bytes.len(),
                });
            }
            layout.copy_chunk(array, &grid, &bytes, element_size, &mut out);
        }

        let data = PixelData::from_bytes(
            array.dtype.component_type,
            &out,
            array.dtype.little_endian,
        );

        let spatial = layout.spatial_axes();
        let pick = |values: &[f64], default: f64| -> Vec<f64> {
            spatial
                .iter()
                .map(|&axis| values.get(axis).copied().unwrap_or(default))
                .collect()
        };
        let size: Vec<usize> = spatial.iter().map(|&axis| array.shape[axis]).collect();

        info!(
            locator = %self.locator,
            scale,
            size = ?size,
            "materialized scale"
        );

        Ok(Image::new(self.name(), size, layout.components, data)
            .with_spacing(pick(&dataset.scale, 1.0))
            .with_origin(pick(&dataset.translation, 0.0)))
    }
}

// =============================================================================
// Output Layout
// =============================================================================

/// Maps array coordinates to the interleaved x-fastest output buffer.
struct OutputLayout {
    roles: Vec<AxisRole>,

    /// Output stride per array axis, in elements; `None` for fixed axes
    strides: Vec<Option<usize>>,

    components: usize,
    total: usize,
}

impl OutputLayout {
    fn new(metadata: &MultiscaleMetadata, array: &ArrayMetadata) -> Result<Self, ChunkedImageError> {
        let roles: Vec<AxisRole> = metadata.axes.iter().map(|axis| axis.role()).collect();
        let extent = |role: AxisRole| {
            roles
                .iter()
                .position(|&r| r == role)
                .map(|i| array.shape[i])
                .unwrap_or(1)
        };
        let components = extent(AxisRole::Channel);
        let x = extent(AxisRole::X);
        let y = extent(AxisRole::Y);
        let z = extent(AxisRole::Z);

        let total = checked_product([components, x, y, z]).ok_or_else(|| {
            ChunkedImageError::Metadata(format!("array shape {:?} is too large", array.shape))
        })?;

        // Every partial product divides `total`, so none of these overflow
        let strides = roles
            .iter()
            .map(|role| match role {
                AxisRole::Channel => Some(1),
                AxisRole::X => Some(components),
                AxisRole::Y => Some(components * x),
                AxisRole::Z => Some(components * x * y),
                AxisRole::Time | AxisRole::Other => None,
            })
            .collect();

        Ok(Self {
            roles,
            strides,
            components,
            total,
        })
    }

    fn total_elements(&self) -> usize {
        self.total
    }

    /// Array axis indices of x, y and z (when present), in that order.
    fn spatial_axes(&self) -> Vec<usize> {
        [AxisRole::X, AxisRole::Y, AxisRole::Z]
            .iter()
            .filter_map(|role| self.roles.iter().position(|r| r == role))
            .collect()
    }

    /// Chunk grid extent, restricted to the first chunk along fixed axes.
    fn grid_extent(&self, array: &ArrayMetadata) -> Vec<usize> {
        array
            .chunk_grid()
            .into_iter()
            .zip(&self.strides)
            .map(|(n, stride)| if stride.is_some() { n } else { n.min(1) })
            .collect()
    }

    fn copy_chunk(
        &self,
        array: &ArrayMetadata,
        grid: &[usize],
        bytes: &[u8],
        element_size: usize,
        out: &mut [u8],
    ) {
        let ndim = array.shape.len();
        let mut local = vec![0usize; ndim];

        for element in 0..array.chunks.iter().product::<usize>() {
            // C order: last axis varies fastest
            let mut rest = element;
            for axis in (0..ndim).rev() {
                local[axis] = rest % array.chunks[axis];
                rest /= array.chunks[axis];
            }

            let mut target = 0;
            let mut inside = true;
            for axis in 0..ndim {
                let coord = grid[axis] * array.chunks[axis] + local[axis];
                match self.strides[axis] {
                    _ if coord >= array.shape[axis] => inside = false,
                    Some(stride) => target += coord * stride,
                    None if coord != 0 => inside = false,
                    None => {}
                }
                if !inside {
                    break;
                }
            }
            if inside {
                let src = element * element_size;
                let dst = target * element_size;
                out[dst..dst + element_size].copy_from_slice(&bytes[src..src + element_size]);
            }
        }
    }
}

fn checked_product(values: impl IntoIterator<Item = usize>) -> Option<usize> {
    values
        .into_iter()
        .try_fold(1usize, |acc, n| acc.checked_mul(n))
}

/// Output buffer of `count` copies of the encoded fill value.
fn filled_buffer(fill: &[u8], count: usize) -> Result<Vec<u8>, ChunkedImageError> {
    let too_large = || ChunkedImageError::Metadata(format!("{} elements do not fit in memory", count));
    let len = fill.len().checked_mul(count).ok_or_else(too_large)?;
    let mut out = Vec::new();
    out.try_reserve_exact(len).map_err(|_| too_large())?;
    for _ in 0..count {
        out.extend_from_slice(fill);
    }
    Ok(out)
}

/// Every position of an n-dimensional grid, last axis fastest.
fn chunk_positions(extent: &[usize]) -> Vec<Vec<usize>> {
    if extent.iter().any(|&n| n == 0) {
        return Vec::new();
    }
    let mut positions = Vec::new();
    let mut current = vec![0usize; extent.len()];
    loop {
        positions.push(current.clone());
        let mut axis = extent.len();
        loop {
            if axis == 0 {
                return positions;
            }
            axis -= 1;
            current[axis] += 1;
            if current[axis] < extent[axis] {
                break;
            }
            current[axis] = 0;
        }
    }
}

/// Encode one sample in the array's byte order.
fn encode_scalar(component_type: ComponentType, value: f64, little_endian: bool) -> Vec<u8> {
    macro_rules! encode {
        ($ty:ty) => {{
            let v = value as $ty;
            if little_endian {
                v.to_le_bytes().to_vec()
            } else {
                v.to_be_bytes().to_vec()
            }
        }};
    }
    match component_type {
        ComponentType::Int8 => encode!(i8),
        ComponentType::UInt8 => encode!(u8),
        ComponentType::Int16 => encode!(i16),
        ComponentType::UInt16 => encode!(u16),
        ComponentType::Int32 => encode!(i32),
        ComponentType::UInt32 => encode!(u32),
        ComponentType::Int64 => encode!(i64),
        ComponentType::UInt64 => encode!(u64),
        ComponentType::Float32 => encode!(f32),
        ComponentType::Float64 => encode!(f64),
    }
}
