//! End-to-end ingestion tests through the native readers and decoders.

use std::sync::Arc;

use scene_ingest::data::{ComponentType, Image, InputItem, PixelData};
use scene_ingest::error::IngestError;
use scene_ingest::ingest::{ingest, IngestOptions, LabelImageNames, SceneImage};

use super::test_utils::*;

fn names(scene_image: &Option<SceneImage>) -> Option<String> {
    scene_image.as_ref().map(SceneImage::name)
}

// =============================================================================
// Slot assignment
// =============================================================================

#[tokio::test]
async fn test_scan_and_mask_fill_both_slots() {
    let decoder = Arc::new(MockDecoder::new());
    let scene = ingest(
        vec![scan_vti(), mask_vti()],
        IngestOptions::default(),
        decoder.clone(),
    )
    .await
    .unwrap();

    assert_eq!(names(&scene.image).as_deref(), Some("scan.vti"));
    assert_eq!(names(&scene.label_image).as_deref(), Some("mask.vti"));
    assert!(scene.geometries.is_empty());
    assert!(scene.point_sets.is_empty());
    assert!(!scene.use_2d);

    // VTK XML is read inline, never through the decoder
    assert_eq!(decoder.image_calls(), 0);
}

#[tokio::test]
async fn test_mask_first_still_fills_both_slots() {
    let decoder = Arc::new(MockDecoder::new());
    let scene = ingest(
        vec![mask_vti(), scan_vti()],
        IngestOptions::default(),
        decoder,
    )
    .await
    .unwrap();

    assert_eq!(names(&scene.image).as_deref(), Some("scan.vti"));
    assert_eq!(names(&scene.label_image).as_deref(), Some("mask.vti"));
}

#[tokio::test]
async fn test_first_image_wins_primary_slot() {
    let decoder = Arc::new(MockDecoder::new());
    let second = InputItem::new(
        "second.vti",
        vti("Float32", [2, 1, 1], "5.5 6.5"),
    );
    let scene = ingest(
        vec![scan_vti(), second],
        IngestOptions::default(),
        decoder,
    )
    .await
    .unwrap();

    assert_eq!(names(&scene.image).as_deref(), Some("scan.vti"));
    assert!(scene.label_image.is_none());
}

#[tokio::test]
async fn test_explicit_label_image_disables_inference() {
    let decoder = Arc::new(MockDecoder::new());
    let explicit = Image::new(
        "explicit-labels",
        vec![2, 2, 2],
        1,
        PixelData::UInt8(vec![0, 1, 0, 1, 0, 1, 0, 1]),
    );
    let options = IngestOptions {
        label_image: Some(SceneImage::Image(explicit)),
        ..IngestOptions::default()
    };

    let scene = ingest(vec![mask_vti()], options, decoder).await.unwrap();

    // The mask would be inferred as labels, but the label slot is taken
    assert_eq!(
        names(&scene.label_image).as_deref(),
        Some("explicit-labels")
    );
    assert_eq!(names(&scene.image).as_deref(), Some("mask.vti"));
}

#[tokio::test]
async fn test_many_distinct_values_is_an_image() {
    let decoder = Arc::new(MockDecoder::new());
    let scene = ingest(
        vec![gray_png("photo.png", 16, 16, true)],
        IngestOptions::default(),
        decoder.clone(),
    )
    .await
    .unwrap();

    let image = scene.image.as_ref().unwrap();
    assert_eq!(image.name(), "photo.png");
    assert_eq!(image.image_type().component_type, ComponentType::UInt8);
    assert!(scene.label_image.is_none());
    assert!(scene.use_2d);
    assert_eq!(decoder.image_calls(), 1);
    assert_eq!(decoder.pool().live_workers(), 0);
}

#[tokio::test]
async fn test_few_distinct_values_is_a_label_image() {
    let decoder = Arc::new(MockDecoder::new());
    let scene = ingest(
        vec![gray_png("segmentation.png", 8, 8, false)],
        IngestOptions::default(),
        decoder,
    )
    .await
    .unwrap();

    assert!(scene.image.is_none());
    assert_eq!(
        names(&scene.label_image).as_deref(),
        Some("segmentation.png")
    );
}

// =============================================================================
// Geometry
// =============================================================================

#[tokio::test]
async fn test_surface_mesh_is_a_geometry() {
    let decoder = Arc::new(MockDecoder::new());
    let scene = ingest(vec![surface_obj()], IngestOptions::default(), decoder.clone())
        .await
        .unwrap();

    assert_eq!(scene.geometries.len(), 1);
    assert!(scene.point_sets.is_empty());
    assert_eq!(scene.geometries[0].polys.number_of_cells(), 2);
    assert!(!scene.use_2d);
    assert_eq!(decoder.mesh_calls(), 1);
    assert_eq!(decoder.pool().live_workers(), 0);
}

#[tokio::test]
async fn test_bare_points_are_a_point_set() {
    let decoder = Arc::new(MockDecoder::new());
    let scene = ingest(vec![points_obj()], IngestOptions::default(), decoder)
        .await
        .unwrap();

    assert!(scene.geometries.is_empty());
    assert_eq!(scene.point_sets.len(), 1);
    assert_eq!(scene.point_sets[0].number_of_points(), 3);
}

#[tokio::test]
async fn test_unsupported_mesh_io_falls_back_to_image_decode() {
    let decoder = Arc::new(MockDecoder::new());
    let result = ingest(
        vec![InputItem::new("brain.fsa", "not a mesh")],
        IngestOptions::default(),
        decoder.clone(),
    )
    .await;

    // Both attempts fail, so the only item fails
    assert!(matches!(result, Err(IngestError::AllDecodesFailed { .. })));
    assert_eq!(decoder.mesh_calls(), 1);
    assert_eq!(decoder.image_calls(), 1);
    assert_eq!(decoder.pool().live_workers(), 0);
}

// =============================================================================
// 2D resolution
// =============================================================================

#[tokio::test]
async fn test_forced_2d_wins_over_volumes() {
    let decoder = Arc::new(MockDecoder::new());
    let options = IngestOptions {
        use_2d: true,
        ..IngestOptions::default()
    };
    let scene = ingest(vec![scan_vti(), surface_obj()], options, decoder)
        .await
        .unwrap();

    assert!(scene.use_2d);
    assert!(scene.image.is_some());
    assert_eq!(scene.geometries.len(), 1);
}

#[tokio::test]
async fn test_empty_input_is_an_empty_2d_scene() {
    let decoder = Arc::new(MockDecoder::new());
    let scene = ingest(Vec::new(), IngestOptions::default(), decoder)
        .await
        .unwrap();

    assert!(scene.image.is_none());
    assert!(scene.label_image.is_none());
    assert!(scene.geometries.is_empty());
    assert!(scene.use_2d);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_failed_item_is_omitted() {
    let decoder = Arc::new(MockDecoder::new());
    let broken = InputItem::new("broken.png", "definitely not a png");
    let scene = ingest(
        vec![broken, scan_vti()],
        IngestOptions::default(),
        decoder.clone(),
    )
    .await
    .unwrap();

    assert_eq!(names(&scene.image).as_deref(), Some("scan.vti"));
    assert_eq!(decoder.pool().live_workers(), 0);
}

#[tokio::test]
async fn test_all_failures_are_reported() {
    let decoder = Arc::new(MockDecoder::new());
    let result = ingest(
        vec![
            InputItem::new("a.png", "garbage"),
            InputItem::new("b.vti", "<VTKFile type=\"PolyData\"/>"),
        ],
        IngestOptions::default(),
        decoder,
    )
    .await;

    match result {
        Err(IngestError::AllDecodesFailed { failures }) => {
            let failed: Vec<&str> = failures.iter().map(|(name, _)| name.as_str()).collect();
            assert_eq!(failed, vec!["a.png", "b.vti"]);
        }
        other => panic!("expected AllDecodesFailed, got {:?}", other.map(|s| s.summary())),
    }
}

#[tokio::test]
async fn test_panicking_decode_aborts_ingestion() {
    let decoder = Arc::new(MockDecoder::new().panicking_on("crash.png"));
    let result = ingest(
        vec![scan_vti(), gray_png("crash.png", 4, 4, true)],
        IngestOptions::default(),
        decoder,
    )
    .await;

    match result {
        Err(IngestError::TaskAborted { name, .. }) => assert_eq!(name, "crash.png"),
        other => panic!("expected TaskAborted, got {:?}", other.map(|s| s.summary())),
    }
}

#[tokio::test]
async fn test_aborted_ingestion_cancels_remaining_decodes() {
    let decoder = Arc::new(
        MockDecoder::new()
            .panicking_on("crash.png")
            .stalling_on("slow.png"),
    );
    let result = ingest(
        vec![
            gray_png("crash.png", 4, 4, true),
            gray_png("slow.png", 4, 4, true),
        ],
        IngestOptions::default(),
        decoder.clone(),
    )
    .await;

    assert!(matches!(result, Err(IngestError::TaskAborted { .. })));
    assert_eq!(decoder.image_calls(), 2);

    // The stalled decode is aborted and hands its worker back
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(decoder.pool().live_workers(), 0);
}

#[tokio::test]
async fn test_malformed_vti_is_dropped_alone() {
    let decoder = Arc::new(MockDecoder::new());
    let bad = InputItem::new(
        "bad.vti",
        r#"<VTKFile type="ImageData" version="1.0">
  <ImageData WholeExtent="0 4294967295 0 4294967295 0 1">
    <PointData><DataArray type="UInt8" Name="v" format="ascii">1 2</DataArray></PointData>
  </ImageData>
</VTKFile>"#,
    );
    let scene = ingest(vec![scan_vti(), bad], IngestOptions::default(), decoder)
        .await
        .unwrap();

    assert_eq!(names(&scene.image).as_deref(), Some("scan.vti"));
}

// =============================================================================
// DICOM series
// =============================================================================

fn series_volume() -> Image {
    Image::new(
        "volume",
        vec![2, 2, 3],
        1,
        PixelData::Int16(vec![0; 12]),
    )
}

fn slices() -> Vec<InputItem> {
    vec![
        InputItem::new("IM0001.dcm", "slice"),
        InputItem::new("IM0002.dcm", "slice"),
        InputItem::new("IM0003.dcm", "slice"),
    ]
}

fn explicit_image() -> SceneImage {
    SceneImage::Image(Image::new(
        "placeholder",
        vec![2, 2],
        1,
        PixelData::Float32(vec![0.0; 4]),
    ))
}

#[tokio::test]
async fn test_dicom_series_short_circuits() {
    let decoder = Arc::new(MockDecoder::new().with_dicom_series(series_volume()));
    let names_doc = serde_json::json!([[1, "liver"]]);
    let options = IngestOptions {
        image: Some(explicit_image()),
        label_image_names: Some(LabelImageNames::from_json(&names_doc).unwrap()),
        ..IngestOptions::default()
    };

    let scene = ingest(slices(), options, decoder.clone()).await.unwrap();

    let image = scene.image.as_ref().unwrap();
    assert_eq!(image.name(), "IM0001.dcm");
    assert!(image.is_3d());
    assert!(!scene.use_2d);
    assert_eq!(scene.label_image_names.as_ref().unwrap().get(1), Some("liver"));
    assert_eq!(decoder.dicom_calls(), 1);
    assert_eq!(decoder.image_calls(), 0);
    assert_eq!(decoder.pool().live_workers(), 0);
}

#[tokio::test]
async fn test_dicom_series_respects_forced_2d() {
    let decoder = Arc::new(MockDecoder::new().with_dicom_series(series_volume()));
    let options = IngestOptions {
        image: Some(explicit_image()),
        use_2d: true,
        ..IngestOptions::default()
    };

    let scene = ingest(slices(), options, decoder).await.unwrap();
    assert!(scene.use_2d);
}

#[tokio::test]
async fn test_dicom_series_attempt_needs_explicit_image() {
    let decoder = Arc::new(MockDecoder::new().with_dicom_series(series_volume()));
    let _ = ingest(slices(), IngestOptions::default(), decoder.clone()).await;
    assert_eq!(decoder.dicom_calls(), 0);
}

#[tokio::test]
async fn test_failed_dicom_series_attempt_falls_through() {
    let decoder = Arc::new(MockDecoder::new());
    let options = IngestOptions {
        image: Some(explicit_image()),
        ..IngestOptions::default()
    };

    let scene = ingest(vec![scan_vti(), mask_vti()], options, decoder.clone())
        .await
        .unwrap();

    assert_eq!(decoder.dicom_calls(), 1);
    // The explicit image keeps the primary slot; the scan is dropped
    assert_eq!(names(&scene.image).as_deref(), Some("placeholder"));
    assert_eq!(names(&scene.label_image).as_deref(), Some("mask.vti"));
    assert!(!scene.use_2d);
}
