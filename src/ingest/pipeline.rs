use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::role::SlotResolver;
use super::scene::{LabelImageNames, SceneDescription, SceneImage};
use crate::data::{DatasetData, DecodedDataset, InputItem, PolyData};
use crate::decode::{Decoded, DecoderLibrary};
use crate::error::{DecodeError, IngestError};
use crate::format::{self, ReaderCategory};

/// Caller-supplied overrides for one ingestion.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Explicit primary image; also enables the DICOM series attempt
    pub image: Option<SceneImage>,

    /// Explicit label image; disables label inference
    pub label_image: Option<SceneImage>,

    pub label_image_names: Option<LabelImageNames>,

    /// Force a 2D view regardless of the data
    pub use_2d: bool,
}

/// Per-item decode task, aborted if dropped before it is joined.
struct ItemTask<T>(JoinHandle<T>);

impl<T> Drop for ItemTask<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Turn a set of inputs into a scene description.
///
/// 1. With two or more items and an explicit image, try the whole set as a
///    DICOM series; success ends the pipeline, failure falls through.
/// 2. Decode every item concurrently, one task per item.
/// 3. Join in input order. Decode errors drop the item; a task that
///    panics aborts the whole ingestion.
/// 4. Bucket images, geometries and point sets, and fill the image slots.
/// 5. Resolve the 2D flag.
///
/// Fails with [`IngestError::AllDecodesFailed`] only when every item failed.
pub async fn ingest(
    items: Vec<InputItem>,
    options: IngestOptions,
    decoder: Arc<dyn DecoderLibrary>,
) -> Result<SceneDescription, IngestError> {
    let IngestOptions {
        image,
        label_image,
        label_image_names,
        use_2d,
    } = options;

    if items.len() >= 2 && image.is_some() {
        match decoder.decode_dicom_series(&items).await {
            Ok(decoded) => {
                let mut series = decoded.into_data();
                series.name = items[0].name().to_string();
                let is_3d = series.image_type.is_3d() && !use_2d;
                info!(name = %series.name, slices = items.len(), "read DICOM series");
                return Ok(SceneDescription {
                    image: Some(SceneImage::Image(series)),
                    label_image,
                    geometries: Vec::new(),
                    point_sets: Vec::new(),
                    label_image_names,
                    use_2d: !is_3d,
                });
            }
            Err(e) => debug!(error = %e, "not a DICOM series, decoding items individually"),
        }
    }

    let tasks: Vec<_> = items
        .into_iter()
        .map(|item| {
            let name = item.name().to_string();
            let decoder = decoder.clone();
            (name, ItemTask(tokio::spawn(decode_item(item, decoder, use_2d))))
        })
        .collect();

    // Returning early drops the unjoined tasks, which aborts them
    let total = tasks.len();
    let mut datasets = Vec::with_capacity(total);
    let mut failures = Vec::new();
    for (name, mut task) in tasks {
        match (&mut task.0).await {
            Ok(Ok(dataset)) => datasets.push(dataset),
            Ok(Err(e)) => {
                warn!(%name, error = %e, "failed to decode input");
                failures.push((name, e));
            }
            Err(e) => {
                return Err(IngestError::TaskAborted {
                    name,
                    message: e.to_string(),
                })
            }
        }
    }
    if total > 0 && datasets.is_empty() {
        return Err(IngestError::AllDecodesFailed { failures });
    }

    let any_dataset_3d = datasets.iter().any(|dataset| dataset.is_3d);
    let mut slots = SlotResolver::new(image, label_image);
    let mut geometries = Vec::new();
    let mut point_sets = Vec::new();
    for dataset in datasets {
        match dataset.data {
            DatasetData::Image(image) => {
                slots.offer(image);
            }
            DatasetData::PolyData(poly_data) if poly_data.has_surface_cells() => {
                geometries.push(poly_data)
            }
            DatasetData::PolyData(poly_data) => point_sets.push(poly_data),
        }
    }
    let (image, label_image) = slots.into_slots();

    let any_3d = any_dataset_3d
        || image.as_ref().is_some_and(SceneImage::is_3d)
        || label_image.as_ref().is_some_and(SceneImage::is_3d);

    let scene = SceneDescription {
        image,
        label_image,
        geometries,
        point_sets,
        label_image_names,
        use_2d: use_2d || !any_3d,
    };
    info!(
        image = scene.image.is_some(),
        label_image = scene.label_image.is_some(),
        geometries = scene.geometries.len(),
        point_sets = scene.point_sets.len(),
        failed = failures.len(),
        use_2d = scene.use_2d,
        "ingested inputs"
    );
    Ok(scene)
}

/// Decode one item according to its reader category.
async fn decode_item(
    item: InputItem,
    decoder: Arc<dyn DecoderLibrary>,
    use_2d: bool,
) -> Result<DecodedDataset, DecodeError> {
    match format::classify(item.name()) {
        ReaderCategory::VtkImageXml => {
            let image = format::read_vtk_image(item.name(), item.data())?;
            Ok(DecodedDataset::image(true, image))
        }
        ReaderCategory::VtkPolyDataXml => {
            let poly_data = format::read_vtk_poly_data(item.name(), item.data())?;
            Ok(DecodedDataset::poly_data(poly_data))
        }
        ReaderCategory::Mesh(io) => match decode_mesh(&item, decoder.as_ref()).await {
            Ok(poly_data) => Ok(DecodedDataset::poly_data(poly_data)),
            Err(e) => {
                debug!(name = item.name(), mesh_io = io.name(), error = %e, "mesh decode failed, trying image decode");
                decode_image(&item, decoder.as_ref(), use_2d).await
            }
        },
        _ => decode_image(&item, decoder.as_ref(), use_2d).await,
    }
}

async fn decode_mesh(
    item: &InputItem,
    decoder: &dyn DecoderLibrary,
) -> Result<PolyData, DecodeError> {
    let Decoded { data: mesh, worker } = decoder.decode_mesh(item).await?;
    let poly_data = decoder.mesh_to_poly_data(&worker, mesh).await;
    worker.terminate();
    poly_data
}

async fn decode_image(
    item: &InputItem,
    decoder: &dyn DecoderLibrary,
    use_2d: bool,
) -> Result<DecodedDataset, DecodeError> {
    let mut image = decoder.decode_image(item).await?.into_data();
    image.name = item.name().to_string();
    let is_3d = image.image_type.is_3d() && !use_2d;
    Ok(DecodedDataset::image(is_3d, image))
}
