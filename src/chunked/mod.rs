//! Chunked multiscale remote images.
//!
//! The adapter answers metadata questions (scale count, image type) without
//! downloading pixel data, and materializes the coarsest scale for the
//! initial render:
//!
//! ```text
//! ┌──────────────┐  .zattrs/.zarray  ┌────────────┐  chunks  ┌────────────┐
//! │ parse_       │ ◄──────────────── │  Fetcher   │ ───────► │ ChunkCache │
//! │ metadata     │                   └────────────┘          └─────┬──────┘
//! └──────┬───────┘                                                 │
//!        ▼                                                         ▼
//! ChunkedMultiscaleImage ── top_level_largest_image ──► coarsest scale Image
//! ```

mod image;
mod metadata;

pub use self::image::ChunkedMultiscaleImage;
pub use self::metadata::{
    ArrayMetadata, Axis, AxisRole, Dtype, MultiscaleMetadata, ScaleDataset,
};
