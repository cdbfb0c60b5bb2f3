//! Reader category classification from file names.
//!
//! Classification is a pure function of the extension. Content is never
//! inspected here; the ingestion pipeline decides roles after decoding.
//!
//! - **Native raster XML** (`vti`): VTK XML ImageData, read in-process
//! - **Native polydata XML** (`vtp`): VTK XML PolyData, read in-process
//! - **Mesh** (`obj`, `stl`, `off`, ...): handed to the mesh decoder
//! - **Chunked multiscale** (`zarr`): opened through the chunked image adapter
//! - **DICOM** (`dcm`): decoded as an image; series handling is set-level
//! - **Image**: everything else, tried with the generic image decoder
//!
//! Unknown extensions are not an error; they fall through to [`ReaderCategory::Image`].

// =============================================================================
// Mesh IO
// =============================================================================

/// Mesh reader implementation selected for a mesh extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshIo {
    VtkPolyData,
    Byu,
    FreeSurferAscii,
    FreeSurferBinary,
    Obj,
    Off,
    Stl,
    Wasm,
    WasmZstd,
}

impl MeshIo {
    /// Get the reader name.
    pub const fn name(&self) -> &'static str {
        match self {
            MeshIo::VtkPolyData => "VTKPolyDataMeshIO",
            MeshIo::Byu => "BYUMeshIO",
            MeshIo::FreeSurferAscii => "FreeSurferAsciiMeshIO",
            MeshIo::FreeSurferBinary => "FreeSurferBinaryMeshIO",
            MeshIo::Obj => "OBJMeshIO",
            MeshIo::Off => "OFFMeshIO",
            MeshIo::Stl => "STLMeshIO",
            MeshIo::Wasm => "WASMMeshIO",
            MeshIo::WasmZstd => "WASMZstdMeshIO",
        }
    }
}

/// Extension to mesh reader table.
///
/// Lookups are exact: each extension is listed in lowercase and uppercase,
/// mixed case spellings fall through to the image decoder.
const EXTENSION_TO_MESH_IO: &[(&str, MeshIo)] = &[
    ("vtk", MeshIo::VtkPolyData),
    ("VTK", MeshIo::VtkPolyData),
    ("byu", MeshIo::Byu),
    ("BYU", MeshIo::Byu),
    ("fsa", MeshIo::FreeSurferAscii),
    ("FSA", MeshIo::FreeSurferAscii),
    ("fsb", MeshIo::FreeSurferBinary),
    ("FSB", MeshIo::FreeSurferBinary),
    ("obj", MeshIo::Obj),
    ("OBJ", MeshIo::Obj),
    ("off", MeshIo::Off),
    ("OFF", MeshIo::Off),
    ("stl", MeshIo::Stl),
    ("STL", MeshIo::Stl),
    ("iwm", MeshIo::Wasm),
    ("iwm.cbor", MeshIo::Wasm),
    ("iwm.cbor.zstd", MeshIo::WasmZstd),
];

/// Look up the mesh reader for an extension.
pub fn mesh_io_for_extension(extension: &str) -> Option<MeshIo> {
    EXTENSION_TO_MESH_IO
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, io)| *io)
}

// =============================================================================
// ReaderCategory
// =============================================================================

/// Decode strategy family selected for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderCategory {
    /// VTK XML ImageData (`.vti`)
    VtkImageXml,

    /// VTK XML PolyData (`.vtp`)
    VtkPolyDataXml,

    /// Mesh format handled by the mesh decoder
    Mesh(MeshIo),

    /// Remote chunked multiscale image (`.zarr`)
    ChunkedMultiscale,

    /// DICOM file (`.dcm`)
    Dicom,

    /// Generic raster image, the catch-all
    Image,
}

impl ReaderCategory {
    /// Get a human-readable name for the category.
    pub const fn name(&self) -> &'static str {
        match self {
            ReaderCategory::VtkImageXml => "VTK XML ImageData",
            ReaderCategory::VtkPolyDataXml => "VTK XML PolyData",
            ReaderCategory::Mesh(_) => "Mesh",
            ReaderCategory::ChunkedMultiscale => "Chunked Multiscale Image",
            ReaderCategory::Dicom => "DICOM",
            ReaderCategory::Image => "Image",
        }
    }
}

/// Classify a file name or URL into a reader category.
pub fn classify(name: &str) -> ReaderCategory {
    let extension = file_extension(name);
    match extension.as_str() {
        "vti" => ReaderCategory::VtkImageXml,
        "vtp" => ReaderCategory::VtkPolyDataXml,
        "zarr" => ReaderCategory::ChunkedMultiscale,
        "dcm" | "DCM" => ReaderCategory::Dicom,
        ext => match mesh_io_for_extension(ext) {
            Some(io) => ReaderCategory::Mesh(io),
            None => ReaderCategory::Image,
        },
    }
}

/// Suffixes that are part of a compound extension together with the
/// extension before them.
const COMPOUND_SUFFIXES: &[&str] = &["gz", "zst", "zstd", "cbor"];

/// Extract the extension of a file name or URL.
///
/// Query strings, fragments and trailing slashes are ignored. Compression
/// and container suffixes keep the preceding extension, so `brain.nii.gz`
/// yields `nii.gz` and `mesh.iwm.cbor.zstd` yields `iwm.cbor.zstd`.
/// Returns an empty string when there is no extension.
pub fn file_extension(name: &str) -> String {
    let path = name
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    let file_name = path.rsplit('/').next().unwrap_or(path);

    let mut parts: Vec<&str> = file_name.split('.').collect();
    if parts.len() < 2 {
        return String::new();
    }
    // A leading dot marks a hidden file, not an extension
    if parts[0].is_empty() {
        parts.remove(0);
        if parts.len() < 2 {
            return String::new();
        }
    }

    let mut start = parts.len() - 1;
    while start > 1 && COMPOUND_SUFFIXES.contains(&parts[start].to_lowercase().as_str()) {
        start -= 1;
    }
    parts[start..].join(".")
}

// =============================================================================
// Tests
// =============================================================================
