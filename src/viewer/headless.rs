//! Rendering engine without a display.
//!
//! Records every call it receives, which makes it usable both from the CLI
//! (to report what would be rendered) and as a test double.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::{RenderingEngine, ViewerConfig, ViewerHandle};
use crate::error::ViewerError;
use crate::ingest::SceneSummary;
use crate::render::Rgb;

#[derive(Default)]
pub struct HeadlessEngine {
    handles: Mutex<Vec<Arc<HeadlessHandle>>>,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn viewers_created(&self) -> usize {
        self.handles.lock().map(|h| h.len()).unwrap_or(0)
    }

    pub fn last_handle(&self) -> Option<Arc<HeadlessHandle>> {
        self.handles.lock().ok()?.last().cloned()
    }

    pub fn handles(&self) -> Vec<Arc<HeadlessHandle>> {
        self.handles
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }
}

impl RenderingEngine for HeadlessEngine {
    fn create_viewer(&self, config: &ViewerConfig) -> Result<Arc<dyn ViewerHandle>, ViewerError> {
        let handle = Arc::new(HeadlessHandle::new(config));
        self.handles
            .lock()
            .map_err(|_| ViewerError::Engine("engine state poisoned".to_string()))?
            .push(handle.clone());
        debug!(rotate = config.rotate, "headless viewer created");
        Ok(handle)
    }
}

/// Viewer handle that records calls instead of drawing.
pub struct HeadlessHandle {
    summary: SceneSummary,
    rotate: bool,
    background_colors: Mutex<Vec<Rgb>>,
    ui_collapsed: AtomicBool,
    renders: AtomicUsize,
}

impl HeadlessHandle {
    fn new(config: &ViewerConfig) -> Self {
        Self {
            summary: config.scene.summary(),
            rotate: config.rotate,
            background_colors: Mutex::new(Vec::new()),
            ui_collapsed: AtomicBool::new(false),
            renders: AtomicUsize::new(0),
        }
    }

    pub fn summary(&self) -> &SceneSummary {
        &self.summary
    }

    pub fn rotate(&self) -> bool {
        self.rotate
    }

    /// Every background color applied, oldest first.
    pub fn background_colors(&self) -> Vec<Rgb> {
        self.background_colors
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    pub fn ui_collapsed(&self) -> bool {
        self.ui_collapsed.load(Ordering::SeqCst)
    }

    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

impl ViewerHandle for HeadlessHandle {
    fn set_background_color(&self, color: Rgb) {
        if let Ok(mut colors) = self.background_colors.lock() {
            colors.push(color);
        }
    }

    fn set_user_interface_collapsed(&self, collapsed: bool) {
        self.ui_collapsed.store(collapsed, Ordering::SeqCst);
    }

    fn render(&self) {
        self.renders.fetch_add(1, Ordering::SeqCst);
    }
}
