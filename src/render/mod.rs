//! Rendering coordination state machine.
//!
//! The machine tracks derived UI state (light or dark background) and keeps
//! the rendered background in sync with color requests:
//!
//! ```text
//!   idle ──(start / setBackgroundColor)──► active
//!                                           └─ background
//!                                               ├─ light  (uiDarkMode = false)
//!                                               └─ dark   (uiDarkMode = true)
//!
//!   active:  SET_BACKGROUND_COLOR            → setBackgroundColor
//!   light:   SET_BACKGROUND_COLOR [is dark]  → dark,  parent ← BACKGROUND_TURNED_DARK
//!   dark:    SET_BACKGROUND_COLOR [is light] → light, parent ← BACKGROUND_TURNED_LIGHT
//! ```

mod background;
mod machine;

use serde_json::{Map, Value};
use tokio::sync::mpsc::UnboundedSender;

pub use background::{background_is_dark, background_is_light, BackgroundRegion, BackgroundState};
pub use machine::{ActiveState, MachineState, MainRenderingMachine, Region, Transition};

/// Default viewer background.
pub const DEFAULT_BACKGROUND: Rgb = Rgb([1.0, 1.0, 1.0]);

/// Linear RGB color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub [f64; 3]);

impl Rgb {
    /// Parse `rrggbb` (optionally prefixed with `#`).
    pub fn from_hex(hex: &str) -> Result<Self, String> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("expected rrggbb, got {:?}", hex));
        }
        let mut rgb = [0.0; 3];
        for (i, value) in rgb.iter_mut().enumerate() {
            let byte = u8::from_str_radix(&hex[2 * i..2 * i + 2], 16)
                .map_err(|_| format!("invalid hex color {:?}", hex))?;
            *value = byte as f64 / 255.0;
        }
        Ok(Rgb(rgb))
    }

    /// Rec. 709 relative luminance.
    pub fn luminance(&self) -> f64 {
        let [r, g, b] = self.0;
        0.2126 * r + 0.7152 * g + 0.0722 * b
    }
}

/// Events accepted by the machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderingEvent {
    /// `SET_BACKGROUND_COLOR`
    SetBackgroundColor(Rgb),
}

impl RenderingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RenderingEvent::SetBackgroundColor(_) => "SET_BACKGROUND_COLOR",
        }
    }
}

/// Notifications sent to the parent coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentSignal {
    BackgroundTurnedLight,
    BackgroundTurnedDark,
}

impl ParentSignal {
    pub fn name(&self) -> &'static str {
        match self {
            ParentSignal::BackgroundTurnedLight => "BACKGROUND_TURNED_LIGHT",
            ParentSignal::BackgroundTurnedDark => "BACKGROUND_TURNED_DARK",
        }
    }
}

/// Side effects, executed in order within one transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SetBackgroundColor(Rgb),
    SendParent(ParentSignal),
    AssignUiDarkMode(bool),
}

/// Actions the machine delegates to the rendering engine.
pub trait RenderingActions: Send {
    fn set_background_color(&mut self, color: Rgb);
}

/// Mutable machine context.
#[derive(Debug, Clone)]
pub struct MachineContext {
    pub ui_dark_mode: bool,

    /// Background color last applied
    pub background_color: Rgb,

    /// Caller-supplied rendering options
    pub options: Map<String, Value>,

    parent: Option<UnboundedSender<ParentSignal>>,
}

impl MachineContext {
    pub fn new(background_color: Rgb) -> Self {
        Self {
            ui_dark_mode: false,
            background_color,
            options: Map::new(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: UnboundedSender<ParentSignal>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = options;
        self
    }

    pub(crate) fn parent(&self) -> Option<&UnboundedSender<ParentSignal>> {
        self.parent.as_ref()
    }
}

impl Default for MachineContext {
    fn default() -> Self {
        Self::new(DEFAULT_BACKGROUND)
    }
}
