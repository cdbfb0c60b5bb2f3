//! Viewer factory tests: local files, URLs, embedded elements and page URL
//! parameters, all rendered through the headless engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use url::Url;

use scene_ingest::ingest::SceneImage;
use scene_ingest::render::{ParentSignal, Rgb};
use scene_ingest::viewer::{
    EmbeddedElement, HeadlessEngine, InitMode, LayerEvent, LayerType, UrlRequest, ViewerFactory,
};
use scene_ingest::Viewport;

use super::test_utils::*;

const HOST: &str = "https://data.example.com";

struct Harness {
    engine: Arc<HeadlessEngine>,
    decoder: Arc<MockDecoder>,
    factory: ViewerFactory,
}

fn harness(fetcher: MockFetcher) -> Harness {
    let engine = Arc::new(HeadlessEngine::new());
    let decoder = Arc::new(MockDecoder::new());
    let factory = ViewerFactory::new(engine.clone(), decoder.clone(), Arc::new(fetcher));
    Harness {
        engine,
        decoder,
        factory,
    }
}

fn remote_fixtures() -> MockFetcher {
    let fetcher = MockFetcher::new()
        .with(HOST, "scan.vti", scan_vti().data().clone())
        .with(HOST, "mask.vti", mask_vti().data().clone())
        .with(HOST, "surface.obj", surface_obj().data().clone())
        .with(HOST, "photo.png", gray_png("photo.png", 16, 16, true).data().clone())
        .with_json(
            HOST,
            "labels.json",
            &serde_json::json!([[0, "background"], [1, "tumor"]]),
        );
    zarr_store(fetcher, &format!("{}/brain.zarr", HOST))
}

fn remote(path: &str) -> String {
    format!("{}/{}", HOST, path)
}

// =============================================================================
// Local files
// =============================================================================

#[tokio::test]
async fn test_viewer_from_files() {
    let h = harness(MockFetcher::new());
    let mut viewer = h
        .factory
        .create_viewer_from_files(vec![scan_vti(), mask_vti(), surface_obj()], false)
        .await
        .unwrap();

    assert_eq!(viewer.layers().len(), 2);
    assert_eq!(
        viewer.layers().get("mask.vti").unwrap().layer_type,
        LayerType::LabelImage
    );
    assert_eq!(viewer.scene().geometries.len(), 1);
    assert!(!viewer.scene().use_2d);

    let entry = viewer
        .handle_layer_event(&LayerEvent::ToggleLayerVisibility("mask.vti".to_string()))
        .unwrap();
    assert!(!entry.visible);

    let handle = h.engine.last_handle().unwrap();
    assert!(handle.rotate());
    assert_eq!(handle.summary().geometries.len(), 1);
}

// =============================================================================
// URLs
// =============================================================================

#[tokio::test]
async fn test_viewer_from_urls_with_chunked_image() {
    let h = harness(remote_fixtures());
    let request = UrlRequest {
        files: vec![remote("surface.obj")],
        image: Some(remote("brain.zarr")),
        label_image_names: Some(remote("labels.json")),
        rotate: false,
        ..UrlRequest::default()
    };

    let received = AtomicU64::new(0);
    let progress = |bytes: u64, _total: Option<u64>| {
        received.fetch_add(bytes, Ordering::SeqCst);
    };
    let viewer = h
        .factory
        .create_viewer_from_urls(request, Some(&progress))
        .await
        .unwrap();

    let scene = viewer.scene();
    assert!(matches!(scene.image, Some(SceneImage::Chunked(_))));
    assert_eq!(scene.image.as_ref().unwrap().name(), "brain");
    assert_eq!(scene.geometries.len(), 1);
    assert_eq!(scene.label_image_names.as_ref().unwrap().get(1), Some("tumor"));
    // 2D chunked image plus a 3D geometry
    assert!(!scene.use_2d);
    assert!(received.load(Ordering::SeqCst) > 0);

    let tooltip = &viewer.layers().get("brain").unwrap().tooltip;
    assert!(tooltip.starts_with("Image: brain Type: "));
    assert!(!h.engine.last_handle().unwrap().rotate());
}

#[tokio::test]
async fn test_explicit_image_url_is_decoded_and_worker_released() {
    let h = harness(remote_fixtures());
    let request = UrlRequest {
        image: Some(remote("photo.png")),
        label_image: Some(remote("mask.vti")),
        ..UrlRequest::default()
    };

    let viewer = h.factory.create_viewer_from_urls(request, None).await.unwrap();

    assert_eq!(viewer.scene().image.as_ref().unwrap().name(), "photo.png");
    assert_eq!(viewer.scene().label_image.as_ref().unwrap().name(), "mask.vti");
    assert_eq!(h.decoder.image_calls(), 2);
    assert_eq!(h.decoder.pool().live_workers(), 0);
}

#[tokio::test]
async fn test_zarr_file_entry_replaces_explicit_image() {
    let h = harness(remote_fixtures());
    let request = UrlRequest {
        files: vec![remote("brain.zarr"), remote("mask.vti")],
        image: Some(remote("photo.png")),
        ..UrlRequest::default()
    };

    let viewer = h.factory.create_viewer_from_urls(request, None).await.unwrap();
    assert_eq!(viewer.scene().image.as_ref().unwrap().name(), "brain");
    assert_eq!(viewer.scene().label_image.as_ref().unwrap().name(), "mask.vti");
}

#[tokio::test]
async fn test_missing_url_fails() {
    let h = harness(remote_fixtures());
    let request = UrlRequest {
        files: vec![remote("missing.vti")],
        ..UrlRequest::default()
    };
    assert!(h.factory.create_viewer_from_urls(request, None).await.is_err());
    assert_eq!(h.engine.viewers_created(), 0);
}

// =============================================================================
// Background coordination
// =============================================================================

#[tokio::test]
async fn test_background_color_reaches_engine_and_parent() {
    let h = harness(MockFetcher::new());
    let mut viewer = h
        .factory
        .create_viewer_from_files(vec![scan_vti()], false)
        .await
        .unwrap();
    let handle = h.engine.last_handle().unwrap();

    viewer.set_background_color(Rgb([0.0, 0.0, 0.0]));
    assert!(viewer.ui_dark_mode());
    assert_eq!(viewer.try_recv_signal(), Some(ParentSignal::BackgroundTurnedDark));
    assert_eq!(viewer.machine_state().to_string(), "active.background.dark");

    viewer.set_background_color(Rgb([1.0, 1.0, 1.0]));
    assert!(!viewer.ui_dark_mode());
    assert_eq!(viewer.try_recv_signal(), Some(ParentSignal::BackgroundTurnedLight));
    assert_eq!(handle.background_colors().last(), Some(&Rgb([1.0, 1.0, 1.0])));
}

// =============================================================================
// Embedded elements
// =============================================================================

#[tokio::test]
async fn test_initialize_embedded_viewers() {
    let h = harness(remote_fixtures());
    let mut dark = EmbeddedElement::new(format!("{},{}", remote("scan.vti"), remote("mask.vti")));
    dark.viewport = Some("640x100%".to_string());
    dark.background_color = Some("000000".to_string());

    let mut already = EmbeddedElement::new(remote("scan.vti"));
    already.loaded = true;

    let broken = EmbeddedElement::new(remote("missing.vti"));

    let mut elements = vec![dark, already, broken];
    let initialized = h.factory.initialize_embedded_viewers(&mut elements).await;

    assert_eq!(initialized, 1);
    assert!(elements.iter().all(|e| e.loaded));

    let viewer = elements[0].viewer.as_ref().unwrap();
    assert!(viewer.ui_dark_mode());
    assert_eq!(
        elements[0].size,
        Some(Viewport {
            width: "640px".to_string(),
            height: "100%".to_string()
        })
    );
    let handle = h.engine.last_handle().unwrap();
    assert!(handle.ui_collapsed());
    assert_eq!(handle.render_count(), 1);

    assert!(elements[1].viewer.is_none());
    assert!(elements[1].size.is_none());

    assert!(elements[2].viewer.is_none());
    assert!(elements[2].error.is_some());
    assert_eq!(elements[2].size, Some(Viewport::default()));

    // Second pass finds nothing left to do
    assert_eq!(h.factory.initialize_embedded_viewers(&mut elements).await, 0);
    assert_eq!(h.engine.viewers_created(), 1);
}

#[tokio::test]
async fn test_manual_init_mode_skips_elements() {
    let h = harness(remote_fixtures());
    let factory = h.factory.with_init_mode(InitMode::Manual);
    let mut elements = vec![EmbeddedElement::new(remote("scan.vti"))];

    assert_eq!(factory.initialize_embedded_viewers(&mut elements).await, 0);
    assert!(!elements[0].loaded);
    assert_eq!(h.engine.viewers_created(), 0);
}

// =============================================================================
// URL parameters
// =============================================================================

#[tokio::test]
async fn test_process_url_parameters() {
    let h = harness(remote_fixtures());

    let empty = Url::parse("https://viewer.example.com/?rotate=false").unwrap();
    assert!(h
        .factory
        .process_url_parameters(&empty, &HashMap::new())
        .await
        .unwrap()
        .is_none());

    let page = Url::parse(&format!(
        "https://viewer.example.com/?fileToLoad={}&rotate=false&use2D=1",
        remote("scan.vti")
    ))
    .unwrap();
    let viewer = h
        .factory
        .process_url_parameters(&page, &HashMap::new())
        .await
        .unwrap()
        .unwrap();

    assert!(viewer.scene().use_2d);
    assert_eq!(viewer.scene().image.as_ref().unwrap().name(), "scan.vti");
    assert!(!h.engine.last_handle().unwrap().rotate());
}
