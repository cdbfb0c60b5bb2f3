//! # scene-ingest
//!
//! Ingestion core for a scientific image and mesh viewer.
//!
//! Given a heterogeneous set of inputs (volumetric images, label maps,
//! meshes, point sets, DICOM series, remote chunked multiscale images), the
//! library decides what each input is, decodes it, and assembles a scene
//! description: at most one primary image, at most one label image, and any
//! number of geometries and point sets.
//!
//! ## Features
//!
//! - **Format classification**: extension-based routing to native readers,
//!   mesh readers, DICOM and chunked multiscale images
//! - **Role inference**: integer images with few distinct values become label
//!   images
//! - **Concurrent ingestion**: one decode task per input, joined in input order
//! - **Chunked remote images**: OME-Zarr multiscale metadata and chunk reads
//!   over HTTP, S3 or the local filesystem, with an LRU chunk cache
//! - **Rendering coordination**: a small state machine keeping the UI theme
//!   in sync with the background color
//!
//! ## Architecture
//!
//! - [`data`] - Inputs, images, meshes and polydata
//! - [`mod@format`] - Format classifier and native readers
//! - [`decode`] - Decoder library contract and scoped workers
//! - [`ingest`] - Role inference and the multi-file pipeline
//! - [`io`] - Locators, fetchers and the chunk cache
//! - [`chunked`] - Chunked multiscale image adapter
//! - [`render`] - Rendering coordination state machine
//! - [`viewer`] - Viewer assembly, layers and the embedding surface
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scene_ingest::{ingest, InputItem, IngestOptions, NativeDecoder};
//!
//! #[tokio::main]
//! async fn main() {
//!     let items = vec![
//!         InputItem::from_path("head.vti").await.unwrap(),
//!         InputItem::from_path("vessels.obj").await.unwrap(),
//!     ];
//!     let decoder = Arc::new(NativeDecoder::new(4));
//!     let scene = ingest(items, IngestOptions::default(), decoder).await.unwrap();
//!     println!("{}", serde_json::to_string_pretty(&scene.summary()).unwrap());
//! }
//! ```

pub mod chunked;
pub mod config;
pub mod data;
pub mod decode;
pub mod error;
pub mod format;
pub mod ingest;
pub mod io;
pub mod render;
pub mod viewer;

// Re-export commonly used types
pub use chunked::{ChunkedMultiscaleImage, MultiscaleMetadata};
pub use config::{Cli, Command, LoadConfig, Viewport};
pub use data::{
    ComponentType, DatasetData, DecodedDataset, Image, ImageType, InputItem, Mesh, PixelData,
    PixelType, PolyData,
};
pub use decode::{Decoded, DecoderLibrary, NativeDecoder, Worker, WorkerPool};
pub use error::{
    ChunkedImageError, DecodeError, IngestError, IoError, LayerError, ViewerError,
};
pub use format::{classify, file_extension, ReaderCategory};
pub use ingest::{
    infer_role, ingest, ImageRole, IngestOptions, LabelImageNames, SceneDescription, SceneImage,
    SceneSummary,
};
pub use io::{create_s3_client, ChunkCache, DefaultFetcher, Fetcher, Locator};
pub use render::{MainRenderingMachine, MachineState, RenderingEvent, Rgb};
pub use viewer::{
    EmbeddedElement, HeadlessEngine, InitMode, RenderingEngine, UrlRequest, Viewer, ViewerConfig,
    ViewerFactory, ViewerHandle,
};
