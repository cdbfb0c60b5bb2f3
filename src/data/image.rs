//! Decoded image representation.
//!
//! Images are stored the way the rendering engine consumes them: a flat,
//! component-interleaved sample buffer in x-fastest order, plus the geometry
//! (size, spacing, origin) of the sampling grid.

use std::collections::HashSet;
use std::hash::Hash;

use serde::Serialize;

// =============================================================================
// Component and Pixel Types
// =============================================================================

/// Numeric type of a single pixel component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ComponentType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl ComponentType {
    /// Whether this type belongs to the floating-point family.
    pub const fn is_floating(&self) -> bool {
        matches!(self, ComponentType::Float32 | ComponentType::Float64)
    }

    /// Size of one component in bytes.
    pub const fn size(&self) -> usize {
        match self {
            ComponentType::Int8 | ComponentType::UInt8 => 1,
            ComponentType::Int16 | ComponentType::UInt16 => 2,
            ComponentType::Int32 | ComponentType::UInt32 | ComponentType::Float32 => 4,
            ComponentType::Int64 | ComponentType::UInt64 | ComponentType::Float64 => 8,
        }
    }

    /// Parse a VTK XML `type` attribute (`Float32`, `UInt8`, ...).
    pub fn from_vtk_name(name: &str) -> Option<Self> {
        let component_type = match name {
            "Int8" | "Char" => ComponentType::Int8,
            "UInt8" | "UnsignedChar" => ComponentType::UInt8,
            "Int16" | "Short" => ComponentType::Int16,
            "UInt16" | "UnsignedShort" => ComponentType::UInt16,
            "Int32" | "Int" => ComponentType::Int32,
            "UInt32" | "UnsignedInt" => ComponentType::UInt32,
            "Int64" | "Long" | "LongLong" => ComponentType::Int64,
            "UInt64" | "UnsignedLong" | "UnsignedLongLong" => ComponentType::UInt64,
            "Float32" | "Float" => ComponentType::Float32,
            "Float64" | "Double" => ComponentType::Float64,
            _ => return None,
        };
        Some(component_type)
    }
}

/// How components of one pixel are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PixelType {
    Scalar,
    Rgb,
    Rgba,
    Vector,
}

impl PixelType {
    /// Pixel type implied by a component count.
    pub const fn for_components(components: usize) -> Self {
        match components {
            1 => PixelType::Scalar,
            3 => PixelType::Rgb,
            4 => PixelType::Rgba,
            _ => PixelType::Vector,
        }
    }
}

/// Full type description of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageType {
    /// Number of spatial dimensions (2 or 3)
    pub dimension: usize,

    pub component_type: ComponentType,

    pub pixel_type: PixelType,

    /// Components per pixel
    pub components: usize,
}

impl ImageType {
    pub fn new(dimension: usize, component_type: ComponentType, components: usize) -> Self {
        Self {
            dimension,
            component_type,
            pixel_type: PixelType::for_components(components),
            components,
        }
    }

    pub fn is_3d(&self) -> bool {
        self.dimension == 3
    }
}

// =============================================================================
// Pixel Data
// =============================================================================

/// Typed sample buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

macro_rules! from_bytes_as {
    ($bytes:expr, $little_endian:expr, $ty:ty) => {{
        const N: usize = std::mem::size_of::<$ty>();
        $bytes
            .chunks_exact(N)
            .map(|chunk| {
                let mut raw = [0u8; N];
                raw.copy_from_slice(chunk);
                if $little_endian {
                    <$ty>::from_le_bytes(raw)
                } else {
                    <$ty>::from_be_bytes(raw)
                }
            })
            .collect::<Vec<$ty>>()
    }};
}

impl PixelData {
    /// Decode a packed byte buffer into typed samples.
    ///
    /// Trailing bytes that do not form a whole sample are ignored.
    pub fn from_bytes(component_type: ComponentType, bytes: &[u8], little_endian: bool) -> Self {
        match component_type {
            ComponentType::Int8 => PixelData::Int8(bytes.iter().map(|&b| b as i8).collect()),
            ComponentType::UInt8 => PixelData::UInt8(bytes.to_vec()),
            ComponentType::Int16 => PixelData::Int16(from_bytes_as!(bytes, little_endian, i16)),
            ComponentType::UInt16 => PixelData::UInt16(from_bytes_as!(bytes, little_endian, u16)),
            ComponentType::Int32 => PixelData::Int32(from_bytes_as!(bytes, little_endian, i32)),
            ComponentType::UInt32 => PixelData::UInt32(from_bytes_as!(bytes, little_endian, u32)),
            ComponentType::Int64 => PixelData::Int64(from_bytes_as!(bytes, little_endian, i64)),
            ComponentType::UInt64 => PixelData::UInt64(from_bytes_as!(bytes, little_endian, u64)),
            ComponentType::Float32 => {
                PixelData::Float32(from_bytes_as!(bytes, little_endian, f32))
            }
            ComponentType::Float64 => {
                PixelData::Float64(from_bytes_as!(bytes, little_endian, f64))
            }
        }
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            PixelData::Int8(_) => ComponentType::Int8,
            PixelData::UInt8(_) => ComponentType::UInt8,
            PixelData::Int16(_) => ComponentType::Int16,
            PixelData::UInt16(_) => ComponentType::UInt16,
            PixelData::Int32(_) => ComponentType::Int32,
            PixelData::UInt32(_) => ComponentType::UInt32,
            PixelData::Int64(_) => ComponentType::Int64,
            PixelData::UInt64(_) => ComponentType::UInt64,
            PixelData::Float32(_) => ComponentType::Float32,
            PixelData::Float64(_) => ComponentType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PixelData::Int8(v) => v.len(),
            PixelData::UInt8(v) => v.len(),
            PixelData::Int16(v) => v.len(),
            PixelData::UInt16(v) => v.len(),
            PixelData::Int32(v) => v.len(),
            PixelData::UInt32(v) => v.len(),
            PixelData::Int64(v) => v.len(),
            PixelData::UInt64(v) => v.len(),
            PixelData::Float32(v) => v.len(),
            PixelData::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count distinct sample values, stopping once the count exceeds `limit`.
    ///
    /// The returned value is exact when it is `<= limit`; otherwise it is
    /// `limit + 1`. Floating-point samples are compared by bit pattern.
    pub fn count_distinct_up_to(&self, limit: usize) -> usize {
        match self {
            PixelData::Int8(v) => count_distinct(v.iter().copied(), limit),
            PixelData::UInt8(v) => count_distinct(v.iter().copied(), limit),
            PixelData::Int16(v) => count_distinct(v.iter().copied(), limit),
            PixelData::UInt16(v) => count_distinct(v.iter().copied(), limit),
            PixelData::Int32(v) => count_distinct(v.iter().copied(), limit),
            PixelData::UInt32(v) => count_distinct(v.iter().copied(), limit),
            PixelData::Int64(v) => count_distinct(v.iter().copied(), limit),
            PixelData::UInt64(v) => count_distinct(v.iter().copied(), limit),
            PixelData::Float32(v) => count_distinct(v.iter().map(|x| x.to_bits()), limit),
            PixelData::Float64(v) => count_distinct(v.iter().map(|x| x.to_bits()), limit),
        }
    }

    /// Convert every sample to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            PixelData::Int8(v) => v.iter().map(|&x| x as f64).collect(),
            PixelData::UInt8(v) => v.iter().map(|&x| x as f64).collect(),
            PixelData::Int16(v) => v.iter().map(|&x| x as f64).collect(),
            PixelData::UInt16(v) => v.iter().map(|&x| x as f64).collect(),
            PixelData::Int32(v) => v.iter().map(|&x| x as f64).collect(),
            PixelData::UInt32(v) => v.iter().map(|&x| x as f64).collect(),
            PixelData::Int64(v) => v.iter().map(|&x| x as f64).collect(),
            PixelData::UInt64(v) => v.iter().map(|&x| x as f64).collect(),
            PixelData::Float32(v) => v.iter().map(|&x| x as f64).collect(),
            PixelData::Float64(v) => v.clone(),
        }
    }
}

fn count_distinct<T, I>(values: I, limit: usize) -> usize
where
    T: Eq + Hash,
    I: Iterator<Item = T>,
{
    let mut seen = HashSet::new();
    for value in values {
        seen.insert(value);
        if seen.len() > limit {
            break;
        }
    }
    seen.len()
}

// =============================================================================
// Image
// =============================================================================

/// A decoded image.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    /// Display name, usually the source file name
    pub name: String,

    pub image_type: ImageType,

    /// Extent along each spatial axis, x first
    pub size: Vec<usize>,

    pub spacing: Vec<f64>,

    pub origin: Vec<f64>,

    /// Component-interleaved samples, x fastest
    pub data: PixelData,
}

impl Image {
    /// Create an image with unit spacing and zero origin.
    pub fn new(
        name: impl Into<String>,
        size: Vec<usize>,
        components: usize,
        data: PixelData,
    ) -> Self {
        let dimension = size.len();
        let image_type = ImageType::new(dimension, data.component_type(), components);
        Self {
            name: name.into(),
            image_type,
            spacing: vec![1.0; dimension],
            origin: vec![0.0; dimension],
            size,
            data,
        }
    }

    pub fn with_spacing(mut self, spacing: Vec<f64>) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_origin(mut self, origin: Vec<f64>) -> Self {
        self.origin = origin;
        self
    }

    /// Number of pixels (not samples).
    pub fn pixel_count(&self) -> usize {
        self.size.iter().product()
    }
}
