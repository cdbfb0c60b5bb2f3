//! Integration tests for scene-ingest.
//!
//! These tests verify end-to-end functionality including:
//! - Slot assignment and role inference across mixed inputs
//! - Geometry versus point set bucketing and the 2D flag
//! - Failure aggregation, aborted tasks and worker release
//! - DICOM series short-circuiting
//! - Chunked multiscale metadata, chunk assembly and caching
//! - Viewer creation from files, URLs, embedded elements and page parameters

mod integration {
    pub mod test_utils;

    pub mod chunked_tests;
    pub mod ingest_tests;
    pub mod viewer_tests;
}
