//! Test utilities for integration tests.
//!
//! This module provides mock implementations of the decoder library and the
//! fetcher, plus helpers producing small VTK XML, OBJ, PNG and OME-Zarr
//! fixtures.

use async_trait::async_trait;
use bytes::Bytes;
use image::{GrayImage, ImageFormat, Luma};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use scene_ingest::data::{Image, InputItem, Mesh, PolyData};
use scene_ingest::decode::{Decoded, DecoderLibrary, NativeDecoder, Worker, WorkerPool};
use scene_ingest::error::{DecodeError, IoError};
use scene_ingest::io::{Fetcher, Locator, Progress};

// =============================================================================
// Mock Decoder
// =============================================================================

/// Decoder that delegates to the native decoder while counting calls.
///
/// It can also pretend a set of items forms a DICOM series, and panic on a
/// chosen item name to simulate a crashing decode task, or stall forever on
/// one while holding a worker.
pub struct MockDecoder {
    native: NativeDecoder,
    dicom_series: Option<Image>,
    panic_on: Option<String>,
    stall_on: Option<String>,
    image_calls: AtomicUsize,
    mesh_calls: AtomicUsize,
    dicom_calls: AtomicUsize,
}

impl MockDecoder {
    pub fn new() -> Self {
        Self {
            native: NativeDecoder::new(2),
            dicom_series: None,
            panic_on: None,
            stall_on: None,
            image_calls: AtomicUsize::new(0),
            mesh_calls: AtomicUsize::new(0),
            dicom_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_dicom_series(mut self, series: Image) -> Self {
        self.dicom_series = Some(series);
        self
    }

    pub fn panicking_on(mut self, name: impl Into<String>) -> Self {
        self.panic_on = Some(name.into());
        self
    }

    /// Hold a worker and never finish when decoding `name`.
    pub fn stalling_on(mut self, name: impl Into<String>) -> Self {
        self.stall_on = Some(name.into());
        self
    }

    pub fn pool(&self) -> &WorkerPool {
        self.native.pool()
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn mesh_calls(&self) -> usize {
        self.mesh_calls.load(Ordering::SeqCst)
    }

    pub fn dicom_calls(&self) -> usize {
        self.dicom_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecoderLibrary for MockDecoder {
    async fn decode_image(&self, item: &InputItem) -> Result<Decoded<Image>, DecodeError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on.as_deref() == Some(item.name()) {
            panic!("decoder crashed on {}", item.name());
        }
        if self.stall_on.as_deref() == Some(item.name()) {
            let _worker = self.native.pool().acquire().await?;
            std::future::pending::<()>().await;
        }
        self.native.decode_image(item).await
    }

    async fn decode_mesh(&self, item: &InputItem) -> Result<Decoded<Mesh>, DecodeError> {
        self.mesh_calls.fetch_add(1, Ordering::SeqCst);
        self.native.decode_mesh(item).await
    }

    async fn decode_dicom_series(
        &self,
        _items: &[InputItem],
    ) -> Result<Decoded<Image>, DecodeError> {
        self.dicom_calls.fetch_add(1, Ordering::SeqCst);
        match &self.dicom_series {
            Some(series) => {
                let worker = self.native.pool().acquire().await?;
                Ok(Decoded {
                    data: series.clone(),
                    worker,
                })
            }
            None => Err(DecodeError::Unsupported {
                reason: "not a DICOM series".to_string(),
            }),
        }
    }

    async fn mesh_to_poly_data(&self, worker: &Worker, mesh: Mesh) -> Result<PolyData, DecodeError> {
        self.native.mesh_to_poly_data(worker, mesh).await
    }
}

// =============================================================================
// Mock Fetcher
// =============================================================================

/// In-memory fetcher keyed by the locator's string form.
#[derive(Default)]
pub struct MockFetcher {
    resources: HashMap<String, Bytes>,
    fetch_count: AtomicUsize,
    fetched: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `data` at `key` below `base`.
    pub fn with(mut self, base: &str, key: &str, data: impl Into<Bytes>) -> Self {
        let locator: Locator = base.parse().unwrap();
        let locator = if key.is_empty() {
            locator
        } else {
            locator.join(key).unwrap()
        };
        self.resources.insert(locator.to_string(), data.into());
        self
    }

    pub fn with_json(self, base: &str, key: &str, document: &Value) -> Self {
        self.with(base, key, serde_json::to_vec(document).unwrap())
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Number of fetches whose locator ends with `suffix`.
    pub fn fetches_ending_with(&self, suffix: &str) -> usize {
        self.fetched
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.ends_with(suffix))
            .count()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch_binary(
        &self,
        locator: &Locator,
        progress: Option<Progress<'_>>,
    ) -> Result<Bytes, IoError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let key = locator.to_string();
        self.fetched.lock().unwrap().push(key.clone());

        let data = self
            .resources
            .get(&key)
            .cloned()
            .ok_or(IoError::NotFound(key))?;
        if let Some(progress) = progress {
            progress(data.len() as u64, Some(data.len() as u64));
        }
        Ok(data)
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// ASCII VTK XML ImageData with the given extent and values.
pub fn vti(type_name: &str, size: [usize; 3], values: &str) -> Vec<u8> {
    let extent = format!(
        "0 {} 0 {} 0 {}",
        size[0] - 1,
        size[1] - 1,
        size[2] - 1
    );
    format!(
        r#"<?xml version="1.0"?>
<VTKFile type="ImageData" version="1.0" byte_order="LittleEndian">
  <ImageData WholeExtent="{extent}" Origin="0 0 0" Spacing="1 1 1">
    <Piece Extent="{extent}">
      <PointData Scalars="values">
        <DataArray type="{type_name}" Name="values" format="ascii">{values}</DataArray>
      </PointData>
    </Piece>
  </ImageData>
</VTKFile>"#
    )
    .into_bytes()
}

/// A 2x2x2 float volume.
pub fn scan_vti() -> InputItem {
    InputItem::new(
        "scan.vti",
        vti("Float32", [2, 2, 2], "0.1 0.2 0.3 0.4 0.5 0.6 0.7 0.8"),
    )
}

/// A 2x2x2 label volume with two labels.
pub fn mask_vti() -> InputItem {
    InputItem::new("mask.vti", vti("UInt8", [2, 2, 2], "0 0 1 1 0 1 1 0"))
}

/// Triangle mesh.
pub fn surface_obj() -> InputItem {
    InputItem::new(
        "surface.obj",
        "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3\nf 1 3 4\n",
    )
}

/// Vertices only.
pub fn points_obj() -> InputItem {
    InputItem::new("points.obj", "v 0 0 0\nv 1 0 0\nv 0 1 0\n")
}

/// 8-bit grayscale PNG where every pixel has a distinct value when
/// `distinct` is set, or only two values otherwise.
pub fn gray_png(name: &str, width: u32, height: u32, distinct: bool) -> InputItem {
    let image = GrayImage::from_fn(width, height, |x, y| {
        let value = if distinct {
            ((y * width + x) % 256) as u8
        } else {
            ((x + y) % 2) as u8
        };
        Luma([value])
    });
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    InputItem::new(name, bytes)
}

/// Register a two-scale OME-Zarr store (`y`, `x` axes, uint8) below `base`.
///
/// Scale 0 is 4x4 in 2x2 chunks with chunk `1.1` missing (fill value 7);
/// scale 1 is 2x2 in a single chunk holding `1 2 3 4`.
pub fn zarr_store(fetcher: MockFetcher, base: &str) -> MockFetcher {
    let attrs = json!({
        "multiscales": [{
            "name": "brain",
            "axes": [
                {"name": "y", "type": "space"},
                {"name": "x", "type": "space"}
            ],
            "datasets": [
                {"path": "0", "coordinateTransformations": [{"type": "scale", "scale": [1.0, 1.0]}]},
                {"path": "1", "coordinateTransformations": [{"type": "scale", "scale": [2.0, 2.0]}]}
            ]
        }]
    });
    let array = |shape: [usize; 2]| {
        json!({
            "zarr_format": 2,
            "shape": shape,
            "chunks": [2, 2],
            "dtype": "|u1",
            "compressor": null,
            "fill_value": 7,
            "order": "C",
            "filters": null
        })
    };

    fetcher
        .with_json(base, ".zattrs", &attrs)
        .with_json(base, "0/.zarray", &array([4, 4]))
        .with_json(base, "1/.zarray", &array([2, 2]))
        .with(base, "0/0.0", vec![0u8, 1, 4, 5])
        .with(base, "0/0.1", vec![2u8, 3, 6, 7])
        .with(base, "0/1.0", vec![8u8, 9, 12, 13])
        .with(base, "1/0.0", vec![1u8, 2, 3, 4])
}
