//! Native readers for VTK XML ImageData (`.vti`) and PolyData (`.vtp`).
//!
//! These formats are read in-process, without a decode worker. Supported
//! array encodings:
//!
//! - `format="ascii"`: whitespace separated values
//! - `format="binary"`: base64 inline blocks with a UInt32 or UInt64 size header
//! - `format="appended"`: raw or base64 `<AppendedData>` addressed by `offset`
//!
//! Compressed files (a `compressor` attribute on `VTKFile`) are rejected.

use std::collections::HashMap;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::data::{CellArray, ComponentType, Image, ImageType, PixelData, PolyData};
use crate::error::DecodeError;

const FORMAT_VTI: &str = "VTK XML ImageData";
const FORMAT_VTP: &str = "VTK XML PolyData";

const APPENDED_START: &[u8] = b"<AppendedData";
const APPENDED_END: &[u8] = b"</AppendedData>";

// =============================================================================
// Public Readers
// =============================================================================

/// Read a `.vti` document into an image.
///
/// VTK image data is always treated as 3-dimensional; a single-slice volume
/// keeps a z extent of one.
pub fn read_vtk_image(name: &str, bytes: &[u8]) -> Result<Image, DecodeError> {
    let document = VtkDocument::parse(bytes, FORMAT_VTI)?;
    document.expect_type("ImageData")?;

    let image_data = document
        .find("ImageData")
        .ok_or_else(|| DecodeError::malformed(FORMAT_VTI, "missing ImageData element"))?;

    let extent: Vec<i64> = parse_list(document.attr(image_data, "WholeExtent").unwrap_or(""))
        .map_err(|e| DecodeError::malformed(FORMAT_VTI, format!("WholeExtent: {}", e)))?;
    if extent.len() != 6 {
        return Err(DecodeError::malformed(
            FORMAT_VTI,
            format!("WholeExtent needs 6 values, got {}", extent.len()),
        ));
    }
    let size = (0..3)
        .map(|axis| axis_length(extent[2 * axis], extent[2 * axis + 1]))
        .collect::<Result<Vec<usize>, _>>()?;

    let origin = parse_triplet(document.attr(image_data, "Origin"), 0.0)?;
    let spacing = parse_triplet(document.attr(image_data, "Spacing"), 1.0)?;

    let point_data = document
        .find("PointData")
        .ok_or_else(|| DecodeError::malformed(FORMAT_VTI, "missing PointData element"))?;
    let arrays = document.children_named(point_data, "DataArray");
    let array = match document.attr(point_data, "Scalars") {
        Some(scalars) => arrays
            .iter()
            .copied()
            .find(|&idx| document.attr(idx, "Name") == Some(scalars)),
        None => arrays.first().copied(),
    }
    .ok_or_else(|| DecodeError::malformed(FORMAT_VTI, "no point data array"))?;

    let decoded = document.decode_array(array)?;
    let pixel_count = size
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| DecodeError::malformed(FORMAT_VTI, "WholeExtent is too large"))?;
    let expected = pixel_count
        .checked_mul(decoded.components)
        .ok_or_else(|| DecodeError::malformed(FORMAT_VTI, "NumberOfComponents is too large"))?;
    if decoded.data.len() != expected {
        return Err(DecodeError::malformed(
            FORMAT_VTI,
            format!(
                "array has {} values, expected {} pixels x {} components",
                decoded.data.len(),
                pixel_count,
                decoded.components
            ),
        ));
    }

    Ok(Image {
        name: name.to_string(),
        image_type: ImageType::new(3, decoded.data.component_type(), decoded.components),
        size,
        spacing,
        origin,
        data: decoded.data,
    })
}

/// Read a `.vtp` document into polydata.
pub fn read_vtk_poly_data(name: &str, bytes: &[u8]) -> Result<PolyData, DecodeError> {
    let document = VtkDocument::parse(bytes, FORMAT_VTP)?;
    document.expect_type("PolyData")?;

    let mut poly_data = PolyData {
        name: name.to_string(),
        ..Default::default()
    };

    if let Some(points) = document.find("Points") {
        if let Some(&array) = document.children_named(points, "DataArray").first() {
            let decoded = document.decode_array(array)?;
            poly_data.points = decoded.data.to_f64_vec().into_iter().map(|v| v as f32).collect();
        }
    }

    for (section, target) in [
        ("Verts", &mut poly_data.verts),
        ("Lines", &mut poly_data.lines),
        ("Strips", &mut poly_data.strips),
        ("Polys", &mut poly_data.polys),
    ] {
        if let Some(node) = document.find(section) {
            *target = document.decode_cells(node)?;
        }
    }

    Ok(poly_data)
}

// =============================================================================
// Document Model
// =============================================================================

/// One element of the parsed XML tree.
#[derive(Debug, Default)]
struct Node {
    name: String,
    attrs: HashMap<String, String>,
    text: String,
    children: Vec<usize>,
}

/// Decoded data array.
struct DecodedArray {
    data: PixelData,
    components: usize,
}

/// Encoding of the `<AppendedData>` block.
#[derive(Clone, Copy, PartialEq, Eq)]
enum AppendedEncoding {
    Raw,
    Base64,
}

/// A parsed VTK XML file.
struct VtkDocument<'a> {
    format: &'static str,
    nodes: Vec<Node>,
    little_endian: bool,
    header_size: usize,
    appended: Option<(AppendedEncoding, &'a [u8])>,
}

impl<'a> VtkDocument<'a> {
    fn parse(bytes: &'a [u8], format: &'static str) -> Result<Self, DecodeError> {
        // Raw appended data is not valid XML, so it is split off before parsing
        let (xml, appended) = split_appended(bytes);
        let nodes = parse_nodes(xml, format)?;

        let root = nodes
            .first()
            .filter(|n| n.name == "VTKFile")
            .ok_or_else(|| DecodeError::malformed(format, "root element is not VTKFile"))?;

        if root.attrs.contains_key("compressor") {
            return Err(DecodeError::unsupported(format!(
                "compressed {} files are not supported",
                format
            )));
        }

        let little_endian = root.attrs.get("byte_order").map(String::as_str) != Some("BigEndian");
        let header_size = match root.attrs.get("header_type").map(String::as_str) {
            None | Some("UInt32") => 4,
            Some("UInt64") => 8,
            Some(other) => {
                return Err(DecodeError::malformed(
                    format,
                    format!("unknown header_type {}", other),
                ))
            }
        };

        Ok(Self {
            format,
            nodes,
            little_endian,
            header_size,
            appended,
        })
    }

    fn expect_type(&self, expected: &str) -> Result<(), DecodeError> {
        match self.nodes[0].attrs.get("type") {
            Some(t) if t == expected => Ok(()),
            other => Err(DecodeError::malformed(
                self.format,
                format!("expected type {}, found {:?}", expected, other),
            )),
        }
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    fn children_named(&self, parent: usize, name: &str) -> Vec<usize> {
        self.nodes[parent]
            .children
            .iter()
            .copied()
            .filter(|&idx| self.nodes[idx].name == name)
            .collect()
    }

    fn attr(&self, node: usize, key: &str) -> Option<&str> {
        self.nodes[node].attrs.get(key).map(String::as_str)
    }

    fn decode_array(&self, node: usize) -> Result<DecodedArray, DecodeError> {
        let type_name = self.attr(node, "type").unwrap_or("");
        let component_type = ComponentType::from_vtk_name(type_name).ok_or_else(|| {
            DecodeError::malformed(self.format, format!("unknown array type {:?}", type_name))
        })?;
        let components = match self.attr(node, "NumberOfComponents") {
            Some(n) => n.trim().parse::<usize>().map_err(|_| {
                DecodeError::malformed(self.format, format!("NumberOfComponents {:?}", n))
            })?,
            None => 1,
        };

        let data = match self.attr(node, "format").unwrap_or("ascii") {
            "ascii" => parse_ascii_array(component_type, &self.nodes[node].text)
                .map_err(|e| DecodeError::malformed(self.format, e))?,
            "binary" => {
                let raw = STANDARD
                    .decode(strip_whitespace(&self.nodes[node].text))
                    .map_err(|e| DecodeError::malformed(self.format, e.to_string()))?;
                let payload = self.split_header(&raw)?;
                PixelData::from_bytes(component_type, payload, self.little_endian)
            }
            "appended" => {
                let offset = self
                    .attr(node, "offset")
                    .and_then(|o| o.trim().parse::<usize>().ok())
                    .ok_or_else(|| DecodeError::malformed(self.format, "appended array without offset"))?;
                let payload = self.read_appended(offset)?;
                PixelData::from_bytes(component_type, &payload, self.little_endian)
            }
            other => {
                return Err(DecodeError::malformed(
                    self.format,
                    format!("unknown array format {:?}", other),
                ))
            }
        };

        Ok(DecodedArray {
            data,
            components: components.max(1),
        })
    }

    fn decode_cells(&self, section: usize) -> Result<CellArray, DecodeError> {
        let mut connectivity = None;
        let mut offsets = None;
        for idx in self.children_named(section, "DataArray") {
            match self.attr(idx, "Name") {
                Some("connectivity") => connectivity = Some(self.decode_array(idx)?.data),
                Some("offsets") => offsets = Some(self.decode_array(idx)?.data),
                _ => {}
            }
        }
        let (connectivity, offsets) = match (connectivity, offsets) {
            (Some(c), Some(o)) => (c.to_f64_vec(), o.to_f64_vec()),
            _ => return Ok(CellArray::new()),
        };

        let mut cells = CellArray::new();
        let mut start = 0usize;
        for end in offsets {
            let end = end as usize;
            if end < start || end > connectivity.len() {
                return Err(DecodeError::malformed(
                    self.format,
                    format!("cell offset {} out of range", end),
                ));
            }
            let ids: Vec<u32> = connectivity[start..end].iter().map(|&v| v as u32).collect();
            cells.push_cell(&ids);
            start = end;
        }
        Ok(cells)
    }

    fn read_header(&self, bytes: &[u8]) -> Result<usize, DecodeError> {
        if bytes.len() < self.header_size {
            return Err(DecodeError::malformed(self.format, "truncated block header"));
        }
        let header = &bytes[..self.header_size];
        let value = match (self.header_size, self.little_endian) {
            (4, true) => u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as u64,
            (4, false) => u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64,
            (_, true) => u64::from_le_bytes(header.try_into().unwrap_or([0; 8])),
            (_, false) => u64::from_be_bytes(header.try_into().unwrap_or([0; 8])),
        };
        Ok(value as usize)
    }

    fn split_header<'b>(&self, raw: &'b [u8]) -> Result<&'b [u8], DecodeError> {
        let len = self.read_header(raw)?;
        let payload = &raw[self.header_size..];
        if payload.len() < len {
            return Err(DecodeError::malformed(
                self.format,
                format!("block declares {} bytes, only {} present", len, payload.len()),
            ));
        }
        Ok(&payload[..len])
    }

    fn read_appended(&self, offset: usize) -> Result<Vec<u8>, DecodeError> {
        let (encoding, block) = self
            .appended
            .ok_or_else(|| DecodeError::malformed(self.format, "missing AppendedData"))?;
        if offset > block.len() {
            return Err(DecodeError::malformed(
                self.format,
                format!("appended offset {} beyond data", offset),
            ));
        }
        let block = &block[offset..];

        match encoding {
            AppendedEncoding::Raw => Ok(self.split_header(block)?.to_vec()),
            AppendedEncoding::Base64 => {
                // Header and payload are encoded as separate base64 runs
                let header_chars = base64_len(self.header_size);
                let header = decode_base64_prefix(block, header_chars, self.format)?;
                let len = self.read_header(&header)?;
                let body = &block[header_chars.min(block.len())..];
                let payload = decode_base64_prefix(body, base64_len(len), self.format)?;
                if payload.len() < len {
                    return Err(DecodeError::malformed(self.format, "truncated appended payload"));
                }
                Ok(payload[..len].to_vec())
            }
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn split_appended(bytes: &[u8]) -> (&[u8], Option<(AppendedEncoding, &[u8])>) {
    let start = match find(bytes, APPENDED_START) {
        Some(s) => s,
        None => return (bytes, None),
    };
    let tag_end = match bytes[start..].iter().position(|&b| b == b'>') {
        Some(p) => start + p,
        None => return (&bytes[..start], None),
    };
    let tag = &bytes[start..tag_end];
    let encoding = if find(tag, b"base64").is_some() {
        AppendedEncoding::Base64
    } else {
        AppendedEncoding::Raw
    };

    let data_start = match bytes[tag_end..].iter().position(|&b| b == b'_') {
        Some(p) => tag_end + p + 1,
        None => return (&bytes[..start], None),
    };
    let data_end = rfind(bytes, APPENDED_END)
        .filter(|&end| end >= data_start)
        .unwrap_or(bytes.len());

    (&bytes[..start], Some((encoding, &bytes[data_start..data_end])))
}

fn parse_nodes(xml: &[u8], format: &'static str) -> Result<Vec<Node>, DecodeError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut nodes: Vec<Node> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| DecodeError::malformed(format, e.to_string()))?
        {
            Event::Start(start) => {
                let idx = push_node(&mut nodes, &stack, &start, format)?;
                stack.push(idx);
            }
            Event::Empty(start) => {
                push_node(&mut nodes, &stack, &start, format)?;
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(text) => {
                if let Some(&current) = stack.last() {
                    let text = text
                        .unescape()
                        .map_err(|e| DecodeError::malformed(format, e.to_string()))?;
                    nodes[current].text.push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(nodes)
}

fn push_node(
    nodes: &mut Vec<Node>,
    stack: &[usize],
    start: &BytesStart<'_>,
    format: &'static str,
) -> Result<usize, DecodeError> {
    let mut node = Node {
        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        ..Default::default()
    };
    for attr in start.attributes() {
        let attr = attr.map_err(|e| DecodeError::malformed(format, e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| DecodeError::malformed(format, e.to_string()))?
            .into_owned();
        node.attrs.insert(key, value);
    }

    let idx = nodes.len();
    nodes.push(node);
    if let Some(&parent) = stack.last() {
        nodes[parent].children.push(idx);
    }
    Ok(idx)
}

fn parse_ascii_array(component_type: ComponentType, text: &str) -> Result<PixelData, String> {
    let data = match component_type {
        ComponentType::Int8 => PixelData::Int8(parse_list(text)?),
        ComponentType::UInt8 => PixelData::UInt8(parse_list(text)?),
        ComponentType::Int16 => PixelData::Int16(parse_list(text)?),
        ComponentType::UInt16 => PixelData::UInt16(parse_list(text)?),
        ComponentType::Int32 => PixelData::Int32(parse_list(text)?),
        ComponentType::UInt32 => PixelData::UInt32(parse_list(text)?),
        ComponentType::Int64 => PixelData::Int64(parse_list(text)?),
        ComponentType::UInt64 => PixelData::UInt64(parse_list(text)?),
        ComponentType::Float32 => PixelData::Float32(parse_list(text)?),
        ComponentType::Float64 => PixelData::Float64(parse_list(text)?),
    };
    Ok(data)
}

fn parse_list<T: FromStr>(text: &str) -> Result<Vec<T>, String> {
    text.split_whitespace()
        .map(|token| {
            token
                .parse::<T>()
                .map_err(|_| format!("invalid value {:?}", token))
        })
        .collect()
}

/// Number of samples along one axis of an inclusive `lo..=hi` extent.
fn axis_length(lo: i64, hi: i64) -> Result<usize, DecodeError> {
    let length = hi
        .checked_sub(lo)
        .and_then(|d| d.checked_add(1))
        .ok_or_else(|| DecodeError::malformed(FORMAT_VTI, format!("extent {} {} overflows", lo, hi)))?;
    usize::try_from(length.max(0))
        .map_err(|_| DecodeError::malformed(FORMAT_VTI, format!("extent {} {} overflows", lo, hi)))
}

fn parse_triplet(value: Option<&str>, default: f64) -> Result<Vec<f64>, DecodeError> {
    match value {
        None => Ok(vec![default; 3]),
        Some(text) => {
            let values: Vec<f64> =
                parse_list(text).map_err(|e| DecodeError::malformed(FORMAT_VTI, e))?;
            if values.len() != 3 {
                return Err(DecodeError::malformed(
                    FORMAT_VTI,
                    format!("expected 3 values, got {:?}", text),
                ));
            }
            Ok(values)
        }
    }
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn base64_len(bytes: usize) -> usize {
    bytes.div_ceil(3).saturating_mul(4)
}

fn decode_base64_prefix(
    block: &[u8],
    chars: usize,
    format: &'static str,
) -> Result<Vec<u8>, DecodeError> {
    let end = chars.min(block.len());
    STANDARD
        .decode(&block[..end])
        .map_err(|e| DecodeError::malformed(format, e.to_string()))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

// =============================================================================
// Tests
// =============================================================================
