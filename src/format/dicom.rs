//! DICOM files and series, read with dicom-rs.
//!
//! Parsing goes through `dicom-object`, so every transfer syntax it knows
//! (implicit/explicit VR, either byte order, deflated) is accepted. Pixel
//! data is decoded by `dicom-pixeldata`, which also handles the encapsulated
//! JPEG and RLE syntaxes it was built with.
//!
//! # Series assembly
//!
//! ```text
//! files ──► parse each ──► keep first SeriesInstanceUID ──► sort ──► stack
//!                                                           │
//!                               InstanceNumber, then z position
//! ```
//!
//! When any slice carries a non-identity rescale (slope/intercept), the
//! stacked volume is converted to `Float32` modality values.

use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_object::{from_reader, DefaultDicomObject};
use dicom_pixeldata::PixelDecoder;

use crate::data::{ComponentType, Image, InputItem, PixelData};
use crate::error::DecodeError;

const FORMAT: &str = "DICOM";

const PREAMBLE_LEN: usize = 128;
const MAGIC: &[u8] = b"DICM";

// =============================================================================
// Public API
// =============================================================================

/// Decode a single DICOM file. Multi-frame files become 3D images.
pub fn read_dicom_image(name: &str, bytes: &[u8]) -> Result<Image, DecodeError> {
    let slice = DicomSlice::parse(bytes)?;
    assemble(name, vec![slice])
}

/// Decode a set of files as one DICOM series.
///
/// Only files sharing the first file's SeriesInstanceUID are stacked. Any
/// file that is not valid DICOM fails the whole series.
pub fn read_dicom_series(items: &[InputItem]) -> Result<Image, DecodeError> {
    let first = items
        .first()
        .ok_or_else(|| DecodeError::unsupported("empty DICOM series"))?;

    let mut slices = items
        .iter()
        .map(|item| DicomSlice::parse(item.data()))
        .collect::<Result<Vec<_>, _>>()?;

    let series_uid = slices[0].series_uid.clone();
    slices.retain(|slice| slice.series_uid == series_uid);

    slices.sort_by(|a, b| {
        let by_instance = match (a.instance_number, b.instance_number) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        by_instance.then_with(|| a.z().total_cmp(&b.z()))
    });

    assemble(first.name(), slices)
}

// =============================================================================
// Slice parsing
// =============================================================================

#[derive(Debug, Clone)]
struct DicomSlice {
    series_uid: Option<String>,
    instance_number: Option<i64>,
    position: Option<[f64; 3]>,
    rows: usize,
    columns: usize,
    samples: usize,
    frames: usize,
    pixel_spacing: [f64; 2],
    slice_thickness: Option<f64>,
    component_type: ComponentType,
    rescale: Option<(f64, f64)>,
    pixels: Vec<u8>,
}

impl DicomSlice {
    fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        // from_reader expects the stream to start at the DICM magic
        let body = if bytes.len() >= PREAMBLE_LEN + MAGIC.len()
            && &bytes[PREAMBLE_LEN..PREAMBLE_LEN + MAGIC.len()] == MAGIC
        {
            &bytes[PREAMBLE_LEN..]
        } else if bytes.starts_with(MAGIC) {
            bytes
        } else {
            return Err(DecodeError::unsupported("missing DICM preamble"));
        };

        let object =
            from_reader(body).map_err(|e| DecodeError::malformed(FORMAT, e.to_string()))?;
        Self::from_object(&object)
    }

    fn from_object(object: &DefaultDicomObject) -> Result<Self, DecodeError> {
        let rows = u16_attr(object, tags::ROWS)?
            .ok_or_else(|| DecodeError::malformed(FORMAT, "missing Rows"))?;
        let columns = u16_attr(object, tags::COLUMNS)?
            .ok_or_else(|| DecodeError::malformed(FORMAT, "missing Columns"))?;
        let samples = u16_attr(object, tags::SAMPLES_PER_PIXEL)?.unwrap_or(1);
        let bits = u16_attr(object, tags::BITS_ALLOCATED)?.unwrap_or(16);
        let signed = u16_attr(object, tags::PIXEL_REPRESENTATION)?.unwrap_or(0) == 1;
        let frames = text_attr(object, tags::NUMBER_OF_FRAMES)
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(1)
            .max(1);

        let component_type = match (bits, signed) {
            (8, false) => ComponentType::UInt8,
            (8, true) => ComponentType::Int8,
            (16, false) => ComponentType::UInt16,
            (16, true) => ComponentType::Int16,
            (32, false) => ComponentType::UInt32,
            (32, true) => ComponentType::Int32,
            _ => {
                return Err(DecodeError::unsupported(format!(
                    "{} bits allocated",
                    bits
                )))
            }
        };

        let expected = [rows, columns, samples, frames, component_type.size()]
            .into_iter()
            .try_fold(1usize, |acc, n| acc.checked_mul(n))
            .ok_or_else(|| {
                DecodeError::malformed(
                    FORMAT,
                    format!("{} frames of {}x{} pixels is too large", frames, columns, rows),
                )
            })?;

        if object.get(tags::PIXEL_DATA).is_none() {
            return Err(DecodeError::malformed(FORMAT, "missing PixelData"));
        }
        let decoded = object
            .decode_pixel_data()
            .map_err(|e| DecodeError::malformed(FORMAT, e.to_string()))?;
        let pixels = decoded.data();
        if pixels.len() < expected {
            return Err(DecodeError::malformed(
                FORMAT,
                format!("PixelData has {} bytes, expected {}", pixels.len(), expected),
            ));
        }

        let spacing = numbers_attr(object, tags::PIXEL_SPACING);
        let pixel_spacing = if spacing.len() == 2 {
            [spacing[0], spacing[1]]
        } else {
            [1.0, 1.0]
        };
        let position = numbers_attr(object, tags::IMAGE_POSITION_PATIENT);
        let slope = numbers_attr(object, tags::RESCALE_SLOPE)
            .first()
            .copied()
            .unwrap_or(1.0);
        let intercept = numbers_attr(object, tags::RESCALE_INTERCEPT)
            .first()
            .copied()
            .unwrap_or(0.0);

        Ok(Self {
            series_uid: text_attr(object, tags::SERIES_INSTANCE_UID),
            instance_number: text_attr(object, tags::INSTANCE_NUMBER).and_then(|s| s.parse().ok()),
            position: (position.len() == 3).then(|| [position[0], position[1], position[2]]),
            rows,
            columns,
            samples,
            frames,
            pixel_spacing,
            slice_thickness: numbers_attr(object, tags::SLICE_THICKNESS).first().copied(),
            component_type,
            rescale: (slope != 1.0 || intercept != 0.0).then_some((slope, intercept)),
            pixels: pixels[..expected].to_vec(),
        })
    }

    fn z(&self) -> f64 {
        self.position.map(|p| p[2]).unwrap_or(0.0)
    }
}

fn u16_attr(
    object: &DefaultDicomObject,
    tag: Tag,
) -> Result<Option<usize>, DecodeError> {
    object
        .get(tag)
        .map(|element| {
            element
                .to_int::<u16>()
                .map(usize::from)
                .map_err(|e| DecodeError::malformed(FORMAT, format!("{}: {}", tag, e)))
        })
        .transpose()
}

/// String value with DICOM padding removed.
fn text_attr(object: &DefaultDicomObject, tag: Tag) -> Option<String> {
    let element = object.get(tag)?;
    let value = element.to_str().ok()?;
    Some(
        value
            .trim_matches(|c: char| c == '\0' || c.is_whitespace())
            .to_string(),
    )
}

/// Backslash separated decimal values; unparsable parts are skipped.
fn numbers_attr(object: &DefaultDicomObject, tag: Tag) -> Vec<f64> {
    text_attr(object, tag)
        .map(|s| s.split('\\').filter_map(|p| p.trim().parse().ok()).collect())
        .unwrap_or_default()
}

fn assemble(name: &str, slices: Vec<DicomSlice>) -> Result<Image, DecodeError> {
    let first = slices
        .first()
        .ok_or_else(|| DecodeError::malformed(FORMAT, "no slices"))?;
    if slices.iter().any(|s| {
        s.rows != first.rows
            || s.columns != first.columns
            || s.samples != first.samples
            || s.component_type != first.component_type
    }) {
        return Err(DecodeError::malformed(FORMAT, "inconsistent slice geometry"));
    }

    let depth = slices
        .iter()
        .try_fold(0usize, |acc, s| acc.checked_add(s.frames))
        .ok_or_else(|| DecodeError::malformed(FORMAT, "too many frames"))?;
    let z_spacing = match (slices.first(), slices.get(1)) {
        (Some(DicomSlice { position: Some(a), .. }), Some(DicomSlice { position: Some(b), .. })) => {
            let distance = ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2) + (b[2] - a[2]).powi(2)).sqrt();
            (distance > 0.0).then_some(distance)
        }
        _ => None,
    }
    .or(first.slice_thickness)
    .unwrap_or(1.0);

    let mut size = vec![first.columns, first.rows];
    let mut spacing = vec![first.pixel_spacing[1], first.pixel_spacing[0]];
    let mut origin = first.position.map(|p| p.to_vec()).unwrap_or(vec![0.0; 3]);
    if depth > 1 {
        size.push(depth);
        spacing.push(z_spacing);
    } else {
        origin.truncate(2);
    }

    // Decoded samples are in native byte order
    let native_le = cfg!(target_endian = "little");
    let data = if slices.iter().any(|s| s.rescale.is_some()) {
        let mut values = Vec::new();
        for slice in &slices {
            let (slope, intercept) = slice.rescale.unwrap_or((1.0, 0.0));
            let raw = PixelData::from_bytes(slice.component_type, &slice.pixels, native_le);
            values.extend(
                raw.to_f64_vec()
                    .into_iter()
                    .map(|v| (v * slope + intercept) as f32),
            );
        }
        PixelData::Float32(values)
    } else {
        let bytes: Vec<u8> = slices.iter().flat_map(|s| s.pixels.iter().copied()).collect();
        PixelData::from_bytes(first.component_type, &bytes, native_le)
    };

    Ok(Image::new(name, size, first.samples, data)
        .with_spacing(spacing)
        .with_origin(origin))
}

// =============================================================================
// Tests
// =============================================================================
