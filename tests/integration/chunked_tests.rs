//! Chunked multiscale image tests against an in-memory OME-Zarr store.

use std::sync::Arc;

use scene_ingest::chunked::ChunkedMultiscaleImage;
use scene_ingest::data::{ComponentType, PixelData};
use scene_ingest::error::ChunkedImageError;
use scene_ingest::io::{Fetcher, Locator};

use super::test_utils::*;

const BASE: &str = "https://data.example.com/brain.zarr";

fn locator() -> Locator {
    BASE.parse().unwrap()
}

#[tokio::test]
async fn test_parse_metadata() {
    let fetcher = zarr_store(MockFetcher::new(), BASE);
    let (metadata, image_type) = ChunkedMultiscaleImage::parse_metadata(&fetcher, &locator())
        .await
        .unwrap();

    assert_eq!(metadata.name.as_deref(), Some("brain"));
    assert_eq!(metadata.datasets.len(), 2);
    assert_eq!(metadata.arrays[0].shape, vec![4, 4]);
    assert_eq!(metadata.datasets[1].scale, vec![2.0, 2.0]);
    assert_eq!(image_type.dimension, 2);
    assert_eq!(image_type.component_type, ComponentType::UInt8);
    assert_eq!(image_type.components, 1);

    // Metadata only: one .zattrs and one .zarray per scale
    assert_eq!(fetcher.fetch_count(), 3);
}

#[tokio::test]
async fn test_top_level_largest_image_is_coarsest_scale() {
    let fetcher = Arc::new(zarr_store(MockFetcher::new(), BASE));
    let image = ChunkedMultiscaleImage::open(fetcher.clone(), locator())
        .await
        .unwrap();

    assert_eq!(image.scale_count(), 2);
    assert_eq!(image.name(), "brain");

    let top = image.top_level_largest_image().await.unwrap();
    assert_eq!(top.size, vec![2, 2]);
    assert_eq!(top.spacing, vec![2.0, 2.0]);
    assert_eq!(top.data, PixelData::UInt8(vec![1, 2, 3, 4]));

    // Memoized: a second call fetches nothing
    let fetched = fetcher.fetch_count();
    image.top_level_largest_image().await.unwrap();
    assert_eq!(fetcher.fetch_count(), fetched);
}

#[tokio::test]
async fn test_finest_scale_assembles_chunks_and_fills_missing() {
    let fetcher = Arc::new(zarr_store(MockFetcher::new(), BASE));
    let image = ChunkedMultiscaleImage::open(fetcher.clone(), locator())
        .await
        .unwrap();

    let finest = image.scale_image(0).await.unwrap();
    assert_eq!(finest.size, vec![4, 4]);
    assert_eq!(
        finest.data,
        PixelData::UInt8(vec![
            0, 1, 2, 3, //
            4, 5, 6, 7, //
            8, 9, 7, 7, //
            12, 13, 7, 7,
        ])
    );

    // Present chunks are cached; missing ones are asked for again
    image.scale_image(0).await.unwrap();
    assert_eq!(fetcher.fetches_ending_with("0/0.0"), 1);
    assert_eq!(fetcher.fetches_ending_with("0/1.1"), 2);
}

#[tokio::test]
async fn test_scale_out_of_range() {
    let fetcher = Arc::new(zarr_store(MockFetcher::new(), BASE));
    let image = ChunkedMultiscaleImage::open(fetcher, locator()).await.unwrap();

    assert!(matches!(
        image.scale_image(5).await,
        Err(ChunkedImageError::ScaleOutOfRange { scale: 5, count: 2 })
    ));
}

#[tokio::test]
async fn test_missing_metadata_is_fatal() {
    let fetcher = Arc::new(MockFetcher::new());
    let result = ChunkedMultiscaleImage::open(fetcher, locator()).await;
    assert!(matches!(result, Err(ChunkedImageError::Io(_))));
}

#[tokio::test]
async fn test_compressed_arrays_are_rejected() {
    let attrs = serde_json::json!({
        "multiscales": [{"datasets": [{"path": "0"}]}]
    });
    let array = serde_json::json!({
        "shape": [4, 4],
        "chunks": [2, 2],
        "dtype": "<u2",
        "compressor": {"id": "blosc"},
        "fill_value": 0,
        "order": "C"
    });
    let fetcher = MockFetcher::new()
        .with_json(BASE, ".zattrs", &attrs)
        .with_json(BASE, "0/.zarray", &array);

    let result = ChunkedMultiscaleImage::parse_metadata(&fetcher, &locator()).await;
    match result {
        Err(ChunkedImageError::UnsupportedCompressor(id)) => assert_eq!(id, "blosc"),
        other => panic!("expected UnsupportedCompressor, got {:?}", other.map(|(m, _)| m)),
    }
}

#[tokio::test]
async fn test_wrong_chunk_size_is_an_error() {
    let fetcher = Arc::new(
        zarr_store(MockFetcher::new(), BASE).with(BASE, "1/0.0", vec![1u8, 2, 3]),
    );
    let image = ChunkedMultiscaleImage::open(fetcher, locator()).await.unwrap();

    assert!(matches!(
        image.top_level_largest_image().await,
        Err(ChunkedImageError::InvalidChunk {
            expected: 4,
            actual: 3,
            ..
        })
    ));
}

#[tokio::test]
async fn test_fetch_json_through_trait() {
    let fetcher = zarr_store(MockFetcher::new(), BASE);
    let attrs = fetcher
        .fetch_json(&locator().join(".zattrs").unwrap())
        .await
        .unwrap();
    assert!(attrs.get("multiscales").is_some());
}

#[tokio::test]
async fn test_oversized_shape_is_a_metadata_error() {
    let attrs = serde_json::json!({
        "multiscales": [{
            "axes": ["y", "x"],
            "datasets": [{"path": "0"}]
        }]
    });
    let array = serde_json::json!({
        "shape": [8589934592u64, 8589934592u64],
        "chunks": [1, 1],
        "dtype": "|u1",
        "compressor": null,
        "fill_value": 0,
        "order": "C"
    });
    let fetcher = Arc::new(
        MockFetcher::new()
            .with_json(BASE, ".zattrs", &attrs)
            .with_json(BASE, "0/.zarray", &array),
    );
    let image = ChunkedMultiscaleImage::open(fetcher.clone(), locator())
        .await
        .unwrap();

    assert!(matches!(
        image.scale_image(0).await,
        Err(ChunkedImageError::Metadata(_))
    ));
    // Rejected before any chunk is requested
    assert_eq!(fetcher.fetch_count(), 2);
}
