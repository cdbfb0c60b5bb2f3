//! Format classification and native readers.
//!
//! # Classification
//!
//! Use [`detect::classify`] to map a file name or URL to a [`ReaderCategory`].
//! Classification only looks at the extension; content-based decisions
//! (label map versus image, surface versus point set) happen after decoding.
//!
//! # Readers
//!
//! - [`vtk_xml`]: VTK XML ImageData and PolyData, read inline
//! - [`mesh`]: OBJ, OFF and STL meshes
//! - [`raster`]: PNG, JPEG, TIFF and BMP rasters via the `image` crate
//! - [`dicom`]: DICOM files and series through dicom-rs

pub mod detect;
pub mod dicom;
pub mod mesh;
pub mod raster;
pub mod vtk_xml;

pub use detect::{classify, file_extension, mesh_io_for_extension, MeshIo, ReaderCategory};
pub use vtk_xml::{read_vtk_image, read_vtk_poly_data};
