//! Viewer assembly: ties a rendering engine handle to the rendering state
//! machine and the layer interface.
//!
//! ```text
//! SceneDescription ──► RenderingEngine::create_viewer ──► ViewerHandle
//!                                                             ▲
//!   Viewer::set_background_color ──► MainRenderingMachine ────┘ (setBackgroundColor)
//!                                          │
//!                                          └──► ParentSignal channel
//! ```

mod factory;
mod headless;
mod layers;

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::debug;

use crate::data::ImageType;
use crate::error::{LayerError, ViewerError};
use crate::ingest::SceneDescription;
use crate::render::{
    Effect, MachineContext, MachineState, MainRenderingMachine, ParentSignal, RenderingActions,
    RenderingEvent, Rgb, DEFAULT_BACKGROUND,
};

pub use factory::{EmbeddedElement, InitMode, UrlParameters, UrlRequest, ViewerFactory};
pub use headless::{HeadlessEngine, HeadlessHandle};
pub use layers::{LayerEntry, LayerEvent, LayerInterface, LayerType, LAYERS_PER_ROW};

// =============================================================================
// Engine contract
// =============================================================================

/// Everything a rendering engine needs to build a viewer.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub scene: SceneDescription,

    /// Rotate the camera when the scene is 3D
    pub rotate: bool,

    /// Opaque UI configuration passed through to the engine
    pub ui: Map<String, Value>,

    /// Initial background; the engine default when `None`
    pub background_color: Option<Rgb>,
}

impl ViewerConfig {
    pub fn new(scene: SceneDescription) -> Self {
        Self {
            scene,
            rotate: true,
            ui: Map::new(),
            background_color: None,
        }
    }
}

/// Live viewer created by a rendering engine.
pub trait ViewerHandle: Send + Sync {
    fn set_background_color(&self, color: Rgb);

    fn set_user_interface_collapsed(&self, collapsed: bool);

    fn render(&self);
}

/// Factory for engine-specific viewers.
pub trait RenderingEngine: Send + Sync {
    fn create_viewer(&self, config: &ViewerConfig) -> Result<Arc<dyn ViewerHandle>, ViewerError>;
}

/// Machine actions forwarded to the engine handle.
struct EngineActions {
    handle: Arc<dyn ViewerHandle>,
}

impl RenderingActions for EngineActions {
    fn set_background_color(&mut self, color: Rgb) {
        self.handle.set_background_color(color);
    }
}

// =============================================================================
// Viewer
// =============================================================================

pub struct Viewer {
    handle: Arc<dyn ViewerHandle>,
    machine: MainRenderingMachine<EngineActions>,
    signals: UnboundedReceiver<ParentSignal>,
    layers: LayerInterface,
    scene: SceneDescription,
}

impl Viewer {
    /// Create the engine viewer, start the rendering machine and register a
    /// layer for each image slot.
    ///
    /// The machine always starts in `light`; the initial color is sent once
    /// more so a dark initial background is classified immediately.
    pub fn new(engine: &dyn RenderingEngine, config: ViewerConfig) -> Result<Self, ViewerError> {
        let handle = engine.create_viewer(&config)?;
        let initial = config.background_color.unwrap_or(DEFAULT_BACKGROUND);

        let (parent, signals) = mpsc::unbounded_channel();
        let context = MachineContext::new(initial)
            .with_parent(parent)
            .with_options(config.ui.clone());
        let mut machine = MainRenderingMachine::new(
            context,
            EngineActions {
                handle: handle.clone(),
            },
        );
        machine.start();
        machine.send(RenderingEvent::SetBackgroundColor(initial));

        let mut layers = LayerInterface::new();
        if let Some(image) = &config.scene.image {
            layers.add(&image.name(), LayerType::Image, &image.image_type());
        }
        if let Some(label_image) = &config.scene.label_image {
            layers.add(
                &label_image.name(),
                LayerType::LabelImage,
                &label_image.image_type(),
            );
        }

        debug!(
            layers = layers.len(),
            geometries = config.scene.geometries.len(),
            point_sets = config.scene.point_sets.len(),
            use_2d = config.scene.use_2d,
            state = %machine.state(),
            "viewer created"
        );

        Ok(Self {
            handle,
            machine,
            signals,
            layers,
            scene: config.scene,
        })
    }

    /// Request a new background; returns the effects the machine ran.
    pub fn set_background_color(&mut self, color: Rgb) -> Vec<Effect> {
        self.machine.send(RenderingEvent::SetBackgroundColor(color))
    }

    pub fn set_user_interface_collapsed(&self, collapsed: bool) {
        self.handle.set_user_interface_collapsed(collapsed);
    }

    pub fn render(&self) {
        self.handle.render();
    }

    /// Add a layer by type name (`image` or `labelImage`).
    pub fn add_layer(
        &mut self,
        name: &str,
        layer_type: &str,
        image_type: &ImageType,
    ) -> Result<&LayerEntry, LayerError> {
        self.layers.add_layer(name, layer_type, image_type)
    }

    pub fn handle_layer_event(&mut self, event: &LayerEvent) -> Result<&LayerEntry, LayerError> {
        self.layers.handle(event)
    }

    pub fn layers(&self) -> &LayerInterface {
        &self.layers
    }

    /// Next pending notification for the parent coordinator, if any.
    pub fn try_recv_signal(&mut self) -> Option<ParentSignal> {
        self.signals.try_recv().ok()
    }

    pub fn ui_dark_mode(&self) -> bool {
        self.machine.context().ui_dark_mode
    }

    pub fn background_color(&self) -> Rgb {
        self.machine.context().background_color
    }

    pub fn machine_state(&self) -> MachineState {
        self.machine.state()
    }

    pub fn scene(&self) -> &SceneDescription {
        &self.scene
    }

    pub fn handle(&self) -> &Arc<dyn ViewerHandle> {
        &self.handle
    }
}
