//! Mesh and polydata representations.
//!
//! A [`Mesh`] is what a mesh decoder produces: points plus typed cells.
//! [`PolyData`] is the surface form the rendering engine consumes, with cells
//! split into vertex, line, polygon and strip arrays in the legacy VTK
//! `[n, id0, .., idn-1, ...]` layout.

/// Kind of a mesh cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Vertex,
    Line,
    PolyLine,
    Triangle,
    Quadrilateral,
    Polygon,
    TriangleStrip,
}

/// A single mesh cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshCell {
    pub kind: CellKind,
    pub point_ids: Vec<u32>,
}

impl MeshCell {
    pub fn new(kind: CellKind, point_ids: Vec<u32>) -> Self {
        Self { kind, point_ids }
    }
}

/// A decoded mesh.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    pub name: String,

    /// Spatial dimension of the points
    pub dimension: usize,

    /// Flat `x, y, z` coordinates
    pub points: Vec<f32>,

    pub cells: Vec<MeshCell>,
}

impl Mesh {
    pub fn number_of_points(&self) -> usize {
        self.points.len() / 3
    }
}

// =============================================================================
// PolyData
// =============================================================================

/// Cell array in the legacy VTK connectivity layout.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CellArray {
    values: Vec<u32>,
}

impl CellArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already-encoded `[n, ids...]` buffer.
    pub fn from_values(values: Vec<u32>) -> Self {
        Self { values }
    }

    /// Append one cell.
    pub fn push_cell(&mut self, point_ids: &[u32]) {
        self.values.push(point_ids.len() as u32);
        self.values.extend_from_slice(point_ids);
    }

    /// Total number of stored values, counts included.
    pub fn number_of_values(&self) -> usize {
        self.values.len()
    }

    /// Number of cells.
    pub fn number_of_cells(&self) -> usize {
        let mut count = 0;
        let mut index = 0;
        while index < self.values.len() {
            index += self.values[index] as usize + 1;
            count += 1;
        }
        count
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }
}

/// Surface data: points plus four cell arrays.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolyData {
    pub name: String,

    /// Flat `x, y, z` coordinates
    pub points: Vec<f32>,

    pub verts: CellArray,
    pub lines: CellArray,
    pub polys: CellArray,
    pub strips: CellArray,
}

impl PolyData {
    pub fn number_of_points(&self) -> usize {
        self.points.len() / 3
    }

    /// Whether any polygon, line or strip is present.
    ///
    /// Polydata without any of them is a bare point set; vertex cells do not
    /// count.
    pub fn has_surface_cells(&self) -> bool {
        self.polys.number_of_values() > 0
            || self.lines.number_of_values() > 0
            || self.strips.number_of_values() > 0
    }

    /// Convert a mesh into polydata, routing each cell by kind.
    pub fn from_mesh(mesh: Mesh) -> Self {
        let mut poly_data = PolyData {
            name: mesh.name,
            points: mesh.points,
            ..Default::default()
        };
        for cell in &mesh.cells {
            let target = match cell.kind {
                CellKind::Vertex => &mut poly_data.verts,
                CellKind::Line | CellKind::PolyLine => &mut poly_data.lines,
                CellKind::Triangle | CellKind::Quadrilateral | CellKind::Polygon => {
                    &mut poly_data.polys
                }
                CellKind::TriangleStrip => &mut poly_data.strips,
            };
            target.push_cell(&cell.point_ids);
        }
        poly_data
    }
}
