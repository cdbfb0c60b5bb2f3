//! Decoder library boundary.
//!
//! The ingestion pipeline talks to decoders only through [`DecoderLibrary`].
//! Every successful call hands back a [`Worker`] that the caller must
//! terminate; a failed call has already released its worker.
//!
//! [`NativeDecoder`] is the in-process implementation.

mod native;
mod worker;

use async_trait::async_trait;

use crate::data::{Image, InputItem, Mesh, PolyData};
use crate::error::DecodeError;

pub use native::NativeDecoder;
pub use worker::{Decoded, Worker, WorkerPool, DEFAULT_WORKERS};

/// Asynchronous decode operations backed by scoped workers.
#[async_trait]
pub trait DecoderLibrary: Send + Sync {
    /// Decode one input as an image.
    async fn decode_image(&self, item: &InputItem) -> Result<Decoded<Image>, DecodeError>;

    /// Decode one input as a mesh.
    async fn decode_mesh(&self, item: &InputItem) -> Result<Decoded<Mesh>, DecodeError>;

    /// Decode a set of inputs as one DICOM series.
    async fn decode_dicom_series(&self, items: &[InputItem])
        -> Result<Decoded<Image>, DecodeError>;

    /// Convert a mesh to polydata on the worker that decoded it.
    async fn mesh_to_poly_data(&self, worker: &Worker, mesh: Mesh)
        -> Result<PolyData, DecodeError>;
}
