//! Embedding surface: builds viewers from local files, URLs, embedded
//! elements and page URL parameters.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use super::{RenderingEngine, Viewer, ViewerConfig};
use crate::chunked::ChunkedMultiscaleImage;
use crate::config::{parse_background_color, Viewport, DEFAULT_VIEWPORT};
use crate::data::InputItem;
use crate::decode::{Decoded, DecoderLibrary};
use crate::error::{IngestError, ViewerError};
use crate::format::file_extension;
use crate::ingest::{ingest, IngestOptions, LabelImageNames, SceneImage};
use crate::io::{Fetcher, Locator, Progress};
use crate::render::Rgb;

/// Whether embedded elements are initialized automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitMode {
    #[default]
    Auto,

    /// The host initializes viewers itself
    Manual,
}

/// Viewer inputs given as locators.
#[derive(Debug, Clone)]
pub struct UrlRequest {
    pub files: Vec<String>,
    pub image: Option<String>,
    pub label_image: Option<String>,
    pub label_image_names: Option<String>,
    pub rotate: bool,
    pub use_2d: bool,
    pub background_color: Option<Rgb>,
    pub ui: Map<String, Value>,
}

impl Default for UrlRequest {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            image: None,
            label_image: None,
            label_image_names: None,
            rotate: true,
            use_2d: false,
            background_color: None,
            ui: Map::new(),
        }
    }
}

/// A declarative viewer element on a host page.
#[derive(Default)]
pub struct EmbeddedElement {
    /// Comma-separated input locators
    pub url: String,
    pub viewport: Option<String>,
    pub use_2d: bool,
    pub background_color: Option<String>,
    pub loaded: bool,

    /// Resolved viewport, set on initialization
    pub size: Option<Viewport>,
    pub viewer: Option<Viewer>,
    pub error: Option<ViewerError>,
}

impl EmbeddedElement {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Build from data attributes (`url`, `viewport`, `use2D`,
    /// `backgroundColor`, `loaded`).
    pub fn from_attributes(attributes: &HashMap<String, String>) -> Self {
        Self {
            url: attributes.get("url").cloned().unwrap_or_default(),
            viewport: attributes.get("viewport").cloned(),
            use_2d: attributes.get("use2D").is_some_and(|v| is_truthy(v)),
            background_color: attributes.get("backgroundColor").cloned(),
            loaded: attributes.get("loaded").is_some_and(|v| is_truthy(v)),
            ..Self::default()
        }
    }
}

/// Loading parameters taken from a page URL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UrlParameters {
    pub files: Vec<String>,
    pub image: Option<String>,
    pub label_image: Option<String>,
    pub label_image_names: Option<String>,
    pub rotate: bool,
    pub use_2d: bool,
    pub fullscreen: bool,
}

impl UrlParameters {
    /// Read the query of `url`, with `add_on` entries taking precedence.
    ///
    /// `filesToLoad` wins over `fileToLoad`; `rotate` defaults to true.
    pub fn from_url(url: &Url, add_on: &HashMap<String, String>) -> Self {
        let mut params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        params.extend(add_on.iter().map(|(k, v)| (k.clone(), v.clone())));

        let split = |list: &str| -> Vec<String> {
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };
        let files = match (params.get("filesToLoad"), params.get("fileToLoad")) {
            (Some(list), _) => split(list),
            (None, Some(list)) => split(list),
            (None, None) => Vec::new(),
        };
        let non_empty = |key: &str| params.get(key).filter(|v| !v.is_empty()).cloned();

        Self {
            files,
            image: non_empty("image"),
            label_image: non_empty("labelImage"),
            label_image_names: non_empty("labelImageNames"),
            rotate: params.get("rotate").map_or(true, |v| is_truthy(v)),
            use_2d: params.get("use2D").is_some_and(|v| is_truthy(v)),
            fullscreen: params.get("fullscreen").is_some_and(|v| is_truthy(v)),
        }
    }

    pub fn has_inputs(&self) -> bool {
        !self.files.is_empty() || self.image.is_some() || self.label_image.is_some()
    }

    pub fn into_request(self) -> UrlRequest {
        let mut ui = Map::new();
        if self.fullscreen {
            ui.insert("fullscreen".to_string(), Value::Bool(true));
        }
        UrlRequest {
            files: self.files,
            image: self.image,
            label_image: self.label_image,
            label_image_names: self.label_image_names,
            rotate: self.rotate,
            use_2d: self.use_2d,
            background_color: None,
            ui,
        }
    }
}

/// Flag values count as set unless empty, `false` or `0`.
fn is_truthy(value: &str) -> bool {
    !matches!(value.trim(), "" | "false" | "0")
}

// =============================================================================
// ViewerFactory
// =============================================================================

pub struct ViewerFactory {
    engine: Arc<dyn RenderingEngine>,
    decoder: Arc<dyn DecoderLibrary>,
    fetcher: Arc<dyn Fetcher>,
    init_mode: InitMode,
}

impl ViewerFactory {
    pub fn new(
        engine: Arc<dyn RenderingEngine>,
        decoder: Arc<dyn DecoderLibrary>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            engine,
            decoder,
            fetcher,
            init_mode: InitMode::Auto,
        }
    }

    pub fn with_init_mode(mut self, init_mode: InitMode) -> Self {
        self.init_mode = init_mode;
        self
    }

    pub fn init_mode(&self) -> InitMode {
        self.init_mode
    }

    /// Ingest local inputs and create a viewer for them.
    pub async fn create_viewer_from_files(
        &self,
        items: Vec<InputItem>,
        use_2d: bool,
    ) -> Result<Viewer, ViewerError> {
        let options = IngestOptions {
            use_2d,
            ..IngestOptions::default()
        };
        let scene = ingest(items, options, self.decoder.clone()).await?;
        Viewer::new(self.engine.as_ref(), ViewerConfig::new(scene))
    }

    /// Fetch every input of `request`, ingest them and create a viewer.
    ///
    /// `zarr` locators open as chunked images whose coarsest scale is
    /// materialized before ingestion starts. A `zarr` entry among `files`
    /// replaces the explicit image.
    pub async fn create_viewer_from_urls(
        &self,
        request: UrlRequest,
        progress: Option<Progress<'_>>,
    ) -> Result<Viewer, ViewerError> {
        let mut image = match &request.image {
            Some(url) => Some(self.load_image(url, progress).await?),
            None => None,
        };
        let label_image = match &request.label_image {
            Some(url) => Some(self.load_image(url, progress).await?),
            None => None,
        };

        let mut items = Vec::with_capacity(request.files.len());
        for url in &request.files {
            if file_extension(url) == "zarr" {
                image = Some(self.load_chunked(url).await?);
            } else {
                let locator: Locator = url.parse().map_err(IngestError::from)?;
                let data = self
                    .fetcher
                    .fetch_binary(&locator, progress)
                    .await
                    .map_err(IngestError::from)?;
                items.push(InputItem::new(locator.file_name(), data));
            }
        }

        let label_image_names = match &request.label_image_names {
            Some(url) => {
                let locator: Locator = url.parse().map_err(IngestError::from)?;
                let document = self
                    .fetcher
                    .fetch_json(&locator)
                    .await
                    .map_err(IngestError::from)?;
                Some(LabelImageNames::from_json(&document)?)
            }
            None => None,
        };

        let options = IngestOptions {
            image,
            label_image,
            label_image_names,
            use_2d: request.use_2d,
        };
        let scene = ingest(items, options, self.decoder.clone()).await?;

        let config = ViewerConfig {
            scene,
            rotate: request.rotate,
            ui: request.ui,
            background_color: request.background_color,
        };
        Viewer::new(self.engine.as_ref(), config)
    }

    /// Explicit image or label image: chunked for `zarr`, decoded otherwise.
    async fn load_image(
        &self,
        url: &str,
        progress: Option<Progress<'_>>,
    ) -> Result<SceneImage, IngestError> {
        if file_extension(url) == "zarr" {
            return self.load_chunked(url).await;
        }

        let locator: Locator = url.parse()?;
        let data = self.fetcher.fetch_binary(&locator, progress).await?;
        let item = InputItem::new(locator.file_name(), data);
        let Decoded { data: image, worker } = self.decoder.decode_image(&item).await?;
        worker.terminate();
        Ok(SceneImage::Image(image))
    }

    async fn load_chunked(&self, url: &str) -> Result<SceneImage, IngestError> {
        let start = Instant::now();
        let locator: Locator = url.parse()?;
        let chunked = ChunkedMultiscaleImage::open(self.fetcher.clone(), locator).await?;
        debug!(url, elapsed_ms = start.elapsed().as_millis() as u64, "multiscale metadata");

        chunked.top_level_largest_image().await?;
        debug!(url, elapsed_ms = start.elapsed().as_millis() as u64, "multiscale image");
        Ok(SceneImage::Chunked(Arc::new(chunked)))
    }

    /// Initialize every element not yet marked `loaded`.
    ///
    /// Elements are marked before loading starts, so a second call never
    /// initializes the same element twice. Failures are stored on the
    /// element. Returns the number of viewers created.
    pub async fn initialize_embedded_viewers(&self, elements: &mut [EmbeddedElement]) -> usize {
        if self.init_mode == InitMode::Manual {
            debug!("manual init mode, skipping embedded viewers");
            return 0;
        }

        let mut initialized = 0;
        for element in elements.iter_mut().filter(|e| !e.loaded) {
            element.loaded = true;

            let viewport = element.viewport.as_deref().unwrap_or(DEFAULT_VIEWPORT);
            element.size = Some(viewport.parse().unwrap_or_else(|e| {
                warn!(viewport, error = %e, "invalid viewport, using default");
                Viewport::default()
            }));

            match self.initialize_element(element).await {
                Ok(viewer) => {
                    element.viewer = Some(viewer);
                    initialized += 1;
                }
                Err(e) => {
                    warn!(url = %element.url, error = %e, "embedded viewer failed");
                    element.error = Some(e);
                }
            }
        }
        info!(initialized, "embedded viewers initialized");
        initialized
    }

    async fn initialize_element(&self, element: &EmbeddedElement) -> Result<Viewer, ViewerError> {
        let request = UrlRequest {
            files: element
                .url
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            use_2d: element.use_2d,
            ..UrlRequest::default()
        };
        let mut viewer = self.create_viewer_from_urls(request, None).await?;

        if let Some(hex) = &element.background_color {
            match parse_background_color(hex) {
                Ok(color) => {
                    viewer.set_background_color(color);
                }
                Err(e) => warn!(color = %hex, error = %e, "ignoring background color"),
            }
        }
        viewer.set_user_interface_collapsed(true);
        viewer.render();
        Ok(viewer)
    }

    /// Create a viewer from page URL parameters, or `None` when they name
    /// nothing to load.
    pub async fn process_url_parameters(
        &self,
        url: &Url,
        add_on: &HashMap<String, String>,
    ) -> Result<Option<Viewer>, ViewerError> {
        let params = UrlParameters::from_url(url, add_on);
        if !params.has_inputs() {
            return Ok(None);
        }
        self.create_viewer_from_urls(params.into_request(), None)
            .await
            .map(Some)
    }
}
