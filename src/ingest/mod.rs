//! Multi-file ingestion: from raw inputs to a scene description.
//!
//! ```text
//! InputItem* ──► DICOM series attempt ──(ok)──────────────────────► Scene
//!                      │ (swallowed failure)
//!                      ▼
//!               classify + decode per item (concurrent tasks)
//!                      │ join in input order
//!                      ▼
//!               images ──► role inference ──► image / label slots
//!               polydata ──► geometries | point sets
//!                      │
//!                      ▼
//!               use2D resolution ──────────────────────────────────► Scene
//! ```

mod pipeline;
mod role;
mod scene;

pub use pipeline::{ingest, IngestOptions};
pub use role::{infer_role, ImageRole, SlotResolver, LABEL_DISTINCT_VALUE_THRESHOLD};
pub use scene::{
    GeometrySummary, LabelImageNames, LayerSummary, SceneDescription, SceneImage, SceneSummary,
};
