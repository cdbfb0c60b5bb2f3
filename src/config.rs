//! Configuration for the scene-ingest CLI.
//!
//! Options come from command-line arguments via clap, with environment
//! variable fallbacks prefixed `SCENE_`:
//!
//! - `SCENE_IMAGE` - Explicit image locator
//! - `SCENE_LABEL_IMAGE` - Explicit label image locator
//! - `SCENE_LABEL_IMAGE_NAMES` - Locator of the label names JSON document
//! - `SCENE_USE_2D` - Force a 2D view (default: false)
//! - `SCENE_BACKGROUND_COLOR` - Background color as `rrggbb`
//! - `SCENE_VIEWPORT` - Viewport size as `WxH` (default: 500x500)
//! - `SCENE_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `SCENE_S3_REGION` - AWS region (default: us-east-1)
//! - `SCENE_WORKERS` - Decode worker pool size (default: 4)
//!
//! Embedding attributes (viewport size, background color) are parsed here as
//! well, so the CLI and embedded viewers share one interpretation.

use std::fmt;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};

use crate::decode::DEFAULT_WORKERS;
use crate::render::Rgb;
use crate::viewer::UrlRequest;

// =============================================================================
// Default Values
// =============================================================================

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Viewport used when an embedded element does not declare one.
pub const DEFAULT_VIEWPORT: &str = "500x500";

// =============================================================================
// Embedding attributes
// =============================================================================

/// Viewport size as CSS lengths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewport {
    pub width: String,
    pub height: String,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: "500px".to_string(),
            height: "500px".to_string(),
        }
    }
}

impl FromStr for Viewport {
    type Err = String;

    /// Parse `WxH`. Numeric parts become pixel sizes; anything else (`100%`,
    /// `50vh`) passes through unchanged.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s
            .split_once('x')
            .ok_or_else(|| format!("viewport must be WxH, got {:?}", s))?;
        let length = |part: &str| -> Result<String, String> {
            let part = part.trim();
            if part.is_empty() {
                return Err(format!("viewport must be WxH, got {:?}", s));
            }
            Ok(match part.parse::<f64>() {
                Ok(n) if n.is_finite() => format!("{}px", part),
                _ => part.to_string(),
            })
        };
        Ok(Self {
            width: length(width)?,
            height: length(height)?,
        })
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {}", self.width, self.height)
    }
}

/// Parse a `rrggbb` background color into `[r, g, b] / 255`.
pub fn parse_background_color(hex: &str) -> Result<Rgb, String> {
    Rgb::from_hex(hex)
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// scene-ingest - Turn heterogeneous image, label map, mesh and point set
/// inputs into a renderable scene.
#[derive(Parser, Debug, Clone)]
#[command(name = "scene-ingest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Ingest files or URLs and report the resulting scene.
    Load(LoadConfig),

    /// Print the reader category chosen for each name.
    Classify(ClassifyConfig),

    /// Parse chunked multiscale metadata and print it.
    Inspect(InspectConfig),
}

/// Options shared by commands that fetch remote content.
#[derive(Args, Debug, Clone)]
pub struct RemoteConfig {
    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "SCENE_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "SCENE_S3_REGION")]
    pub s3_region: String,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LoadConfig {
    /// Files or URLs to ingest (local paths, http(s)://, s3://).
    pub inputs: Vec<String>,

    /// Explicit image; `.zarr` locators are opened as chunked multiscale images.
    #[arg(long, env = "SCENE_IMAGE")]
    pub image: Option<String>,

    /// Explicit label image; disables label inference.
    #[arg(long, env = "SCENE_LABEL_IMAGE")]
    pub label_image: Option<String>,

    /// JSON document mapping label values to names.
    #[arg(long, env = "SCENE_LABEL_IMAGE_NAMES")]
    pub label_image_names: Option<String>,

    /// Force a 2D view regardless of the data.
    #[arg(long = "use-2d", default_value_t = false, env = "SCENE_USE_2D")]
    pub use_2d: bool,

    /// Do not rotate the camera on 3D scenes.
    #[arg(long, default_value_t = false)]
    pub no_rotate: bool,

    /// Background color as `rrggbb`.
    #[arg(long, env = "SCENE_BACKGROUND_COLOR")]
    pub background_color: Option<String>,

    /// Viewport size as `WxH`.
    #[arg(long, default_value = DEFAULT_VIEWPORT, env = "SCENE_VIEWPORT")]
    pub viewport: String,

    /// Maximum number of concurrent decode workers.
    #[arg(long, default_value_t = DEFAULT_WORKERS, env = "SCENE_WORKERS")]
    pub workers: usize,

    #[command(flatten)]
    pub remote: RemoteConfig,
}

impl LoadConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.inputs.is_empty() && self.image.is_none() && self.label_image.is_none() {
            return Err(
                "Nothing to load. Pass input files, --image or --label-image".to_string(),
            );
        }

        if self.workers == 0 {
            return Err("workers must be greater than 0".to_string());
        }

        self.background()?;
        self.viewport()?;

        Ok(())
    }

    pub fn background(&self) -> Result<Option<Rgb>, String> {
        self.background_color
            .as_deref()
            .map(parse_background_color)
            .transpose()
    }

    pub fn viewport(&self) -> Result<Viewport, String> {
        self.viewport.parse()
    }

    pub fn verbose(&self) -> bool {
        self.remote.verbose
    }

    /// Build the viewer request. Call `validate()` first.
    pub fn to_request(&self) -> UrlRequest {
        UrlRequest {
            files: self.inputs.clone(),
            image: self.image.clone(),
            label_image: self.label_image.clone(),
            label_image_names: self.label_image_names.clone(),
            rotate: !self.no_rotate,
            use_2d: self.use_2d,
            background_color: self.background().ok().flatten(),
            ..UrlRequest::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ClassifyConfig {
    /// File names or URLs to classify.
    #[arg(required = true)]
    pub names: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct InspectConfig {
    /// Locator of the multiscale image root.
    pub locator: String,

    /// Also fetch chunks and materialize the coarsest scale.
    #[arg(long, default_value_t = false)]
    pub materialize: bool,

    #[command(flatten)]
    pub remote: RemoteConfig,
}

// =============================================================================
// Tests
// =============================================================================
