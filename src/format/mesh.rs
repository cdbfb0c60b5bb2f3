//! Mesh file readers: Wavefront OBJ, OFF and STL (ASCII and binary).
//!
//! Readers produce a [`Mesh`] with typed cells. Files that only contain
//! vertex coordinates yield a mesh without cells, which the ingestion
//! pipeline later treats as a point set.

use crate::data::{CellKind, Mesh, MeshCell};
use crate::error::DecodeError;

use super::detect::MeshIo;

/// Decode a mesh using the reader selected for its extension.
pub fn read_mesh(io: MeshIo, name: &str, bytes: &[u8]) -> Result<Mesh, DecodeError> {
    let mut mesh = match io {
        MeshIo::Obj => read_obj(bytes)?,
        MeshIo::Off => read_off(bytes)?,
        MeshIo::Stl => read_stl(bytes)?,
        other => {
            return Err(DecodeError::unsupported(format!(
                "no native reader for {}",
                other.name()
            )))
        }
    };
    mesh.name = name.to_string();
    Ok(mesh)
}

fn polygon_kind(len: usize) -> CellKind {
    match len {
        3 => CellKind::Triangle,
        4 => CellKind::Quadrilateral,
        _ => CellKind::Polygon,
    }
}

fn parse_f32(token: Option<&str>, format: &'static str, line: usize) -> Result<f32, DecodeError> {
    token
        .and_then(|t| t.parse::<f32>().ok())
        .ok_or_else(|| DecodeError::malformed(format, format!("invalid coordinate on line {}", line)))
}

fn as_text<'a>(bytes: &'a [u8], format: &'static str) -> Result<&'a str, DecodeError> {
    std::str::from_utf8(bytes).map_err(|_| DecodeError::malformed(format, "invalid UTF-8"))
}

// =============================================================================
// OBJ
// =============================================================================

const FORMAT_OBJ: &str = "OBJ";

/// Parse a Wavefront OBJ file.
///
/// Supports `v`, `f`, `l` and `p` records; face indices may carry texture and
/// normal references (`1/2/3`) and may be negative (relative to the end).
pub fn read_obj(bytes: &[u8]) -> Result<Mesh, DecodeError> {
    let text = as_text(bytes, FORMAT_OBJ)?;
    let mut mesh = Mesh {
        dimension: 3,
        ..Default::default()
    };

    for (line_no, line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };
        match keyword {
            "v" => {
                for _ in 0..3 {
                    mesh.points.push(parse_f32(tokens.next(), FORMAT_OBJ, line_no)?);
                }
            }
            "f" | "l" | "p" => {
                let vertex_count = mesh.number_of_points();
                let ids = tokens
                    .map(|token| obj_index(token, vertex_count, line_no))
                    .collect::<Result<Vec<u32>, DecodeError>>()?;
                if ids.is_empty() {
                    continue;
                }
                match keyword {
                    "f" => mesh.cells.push(MeshCell::new(polygon_kind(ids.len()), ids)),
                    "l" => {
                        let kind = if ids.len() == 2 {
                            CellKind::Line
                        } else {
                            CellKind::PolyLine
                        };
                        mesh.cells.push(MeshCell::new(kind, ids));
                    }
                    _ => {
                        for id in ids {
                            mesh.cells.push(MeshCell::new(CellKind::Vertex, vec![id]));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(mesh)
}

fn obj_index(token: &str, vertex_count: usize, line: usize) -> Result<u32, DecodeError> {
    let raw = token.split('/').next().unwrap_or_default();
    let index: i64 = raw.parse().map_err(|_| {
        DecodeError::malformed(FORMAT_OBJ, format!("invalid index {:?} on line {}", token, line))
    })?;
    let resolved = if index < 0 {
        vertex_count as i64 + index
    } else {
        index - 1
    };
    if resolved < 0 || resolved >= vertex_count as i64 {
        return Err(DecodeError::malformed(
            FORMAT_OBJ,
            format!("index {} out of range on line {}", index, line),
        ));
    }
    Ok(resolved as u32)
}

// =============================================================================
// OFF
// =============================================================================

const FORMAT_OFF: &str = "OFF";

/// Parse an Object File Format mesh.
pub fn read_off(bytes: &[u8]) -> Result<Mesh, DecodeError> {
    let text = as_text(bytes, FORMAT_OFF)?;
    let mut tokens = text
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .flat_map(str::split_whitespace);

    let header = tokens
        .next()
        .ok_or_else(|| DecodeError::malformed(FORMAT_OFF, "empty file"))?;
    if !header.ends_with("OFF") {
        return Err(DecodeError::malformed(FORMAT_OFF, "missing OFF header"));
    }

    let vertex_count: usize = next_off_value(&mut tokens, "vertex count")?;
    let face_count: usize = next_off_value(&mut tokens, "face count")?;
    let _edge_count: usize = next_off_value(&mut tokens, "edge count")?;

    let mut mesh = Mesh {
        dimension: 3,
        points: Vec::with_capacity(vertex_count * 3),
        ..Default::default()
    };
    for _ in 0..vertex_count * 3 {
        mesh.points.push(next_off_value(&mut tokens, "vertex coordinate")?);
    }
    for face in 0..face_count {
        let n: usize = next_off_value(&mut tokens, "face size")?;
        let mut ids = Vec::with_capacity(n);
        for _ in 0..n {
            let id: usize = next_off_value(&mut tokens, "face index")?;
            if id >= vertex_count {
                return Err(DecodeError::malformed(
                    FORMAT_OFF,
                    format!("face {} references vertex {}", face, id),
                ));
            }
            ids.push(id as u32);
        }
        let kind = match n {
            1 => CellKind::Vertex,
            2 => CellKind::Line,
            _ => polygon_kind(n),
        };
        mesh.cells.push(MeshCell::new(kind, ids));
    }

    Ok(mesh)
}

fn next_off_value<'a, T: std::str::FromStr>(
    tokens: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<T, DecodeError> {
    tokens
        .next()
        .and_then(|t| t.parse::<T>().ok())
        .ok_or_else(|| DecodeError::malformed(FORMAT_OFF, format!("invalid {}", what)))
}

// =============================================================================
// STL
// =============================================================================

const FORMAT_STL: &str = "STL";

/// Parse an STL file, detecting ASCII versus binary layout.
pub fn read_stl(bytes: &[u8]) -> Result<Mesh, DecodeError> {
    if is_ascii_stl(bytes) {
        read_ascii_stl(bytes)
    } else {
        read_binary_stl(bytes)
    }
}

fn is_ascii_stl(data: &[u8]) -> bool {
    // Binary headers may also begin with "solid", so require a facet keyword
    if !data.starts_with(b"solid") {
        return false;
    }
    let check_len = data.len().min(1024);
    data[..check_len].windows(5).any(|window| window == b"facet")
}

fn read_binary_stl(data: &[u8]) -> Result<Mesh, DecodeError> {
    if data.len() < 84 {
        return Err(DecodeError::malformed(FORMAT_STL, "binary STL too short"));
    }
    let triangle_count = u32::from_le_bytes([data[80], data[81], data[82], data[83]]) as usize;

    // 12 bytes normal + 36 bytes vertices + 2 bytes attribute
    let expected_size = 84 + triangle_count * 50;
    if data.len() < expected_size {
        return Err(DecodeError::malformed(FORMAT_STL, "binary STL truncated"));
    }

    let mut mesh = Mesh {
        dimension: 3,
        points: Vec::with_capacity(triangle_count * 9),
        cells: Vec::with_capacity(triangle_count),
        ..Default::default()
    };
    for triangle in 0..triangle_count {
        let base = 84 + triangle * 50 + 12;
        for i in 0..9 {
            let offset = base + i * 4;
            mesh.points.push(f32::from_le_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ]));
        }
        let first = (triangle * 3) as u32;
        mesh.cells.push(MeshCell::new(
            CellKind::Triangle,
            vec![first, first + 1, first + 2],
        ));
    }
    Ok(mesh)
}

fn read_ascii_stl(data: &[u8]) -> Result<Mesh, DecodeError> {
    let text = as_text(data, FORMAT_STL)?;
    let mut mesh = Mesh {
        dimension: 3,
        ..Default::default()
    };
    let mut pending = 0u32;

    for (line_no, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("vertex") {
            continue;
        }
        for _ in 0..3 {
            mesh.points.push(parse_f32(tokens.next(), FORMAT_STL, line_no + 1)?);
        }
        pending += 1;
        if pending == 3 {
            let last = mesh.number_of_points() as u32;
            mesh.cells.push(MeshCell::new(
                CellKind::Triangle,
                vec![last - 3, last - 2, last - 1],
            ));
            pending = 0;
        }
    }
    Ok(mesh)
}

// =============================================================================
// Tests
// =============================================================================
