use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use super::{Decoded, DecoderLibrary, Worker, WorkerPool};
use crate::data::{Image, InputItem, Mesh, PolyData};
use crate::error::DecodeError;
use crate::format::{self, dicom, mesh, raster, ReaderCategory};

/// In-process decoder library.
///
/// Each decode acquires a worker from the pool and runs the CPU-bound
/// parsing on tokio's blocking thread pool. The worker is released before
/// returning on failure and handed to the caller on success.
#[derive(Debug, Clone, Default)]
pub struct NativeDecoder {
    pool: WorkerPool,
}

impl NativeDecoder {
    pub fn new(workers: usize) -> Self {
        Self {
            pool: WorkerPool::new(workers),
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    async fn run<T, F>(&self, what: &str, decode: F) -> Result<Decoded<T>, DecodeError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, DecodeError> + Send + 'static,
    {
        let worker = self.pool.acquire().await?;
        let started = Instant::now();
        let data = tokio::task::spawn_blocking(decode)
            .await
            .map_err(|e| DecodeError::Worker(e.to_string()))??;
        debug!(
            worker = worker.id(),
            what,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "decode finished"
        );
        Ok(Decoded { data, worker })
    }
}

#[async_trait]
impl DecoderLibrary for NativeDecoder {
    async fn decode_image(&self, item: &InputItem) -> Result<Decoded<Image>, DecodeError> {
        let name = item.name().to_string();
        let data = item.data().clone();
        self.run("image", move || match format::classify(&name) {
            ReaderCategory::Dicom => dicom::read_dicom_image(&name, &data),
            ReaderCategory::VtkImageXml => format::read_vtk_image(&name, &data),
            _ => raster::read_raster(&name, &data),
        })
        .await
    }

    async fn decode_mesh(&self, item: &InputItem) -> Result<Decoded<Mesh>, DecodeError> {
        let io = match format::classify(item.name()) {
            ReaderCategory::Mesh(io) => io,
            other => {
                return Err(DecodeError::unsupported(format!(
                    "{} is not a mesh ({})",
                    item.name(),
                    other.name()
                )))
            }
        };
        let name = item.name().to_string();
        let data = item.data().clone();
        self.run("mesh", move || mesh::read_mesh(io, &name, &data))
            .await
    }

    async fn decode_dicom_series(
        &self,
        items: &[InputItem],
    ) -> Result<Decoded<Image>, DecodeError> {
        let items = items.to_vec();
        self.run("dicom series", move || dicom::read_dicom_series(&items))
            .await
    }

    async fn mesh_to_poly_data(&self, worker: &Worker, mesh: Mesh) -> Result<PolyData, DecodeError> {
        if !worker.is_live() {
            return Err(DecodeError::Worker(format!(
                "worker {} already terminated",
                worker.id()
            )));
        }
        tokio::task::spawn_blocking(move || PolyData::from_mesh(mesh))
            .await
            .map_err(|e| DecodeError::Worker(e.to_string()))
    }
}
