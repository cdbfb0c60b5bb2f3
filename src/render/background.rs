use std::fmt;

use super::machine::{Region, Transition};
use super::{Effect, MachineContext, ParentSignal, RenderingEvent, Rgb};

/// Luminance at or below which a background counts as dark.
const DARK_LUMINANCE_THRESHOLD: f64 = 0.5;

pub fn background_is_dark(color: &Rgb) -> bool {
    color.luminance() <= DARK_LUMINANCE_THRESHOLD
}

pub fn background_is_light(color: &Rgb) -> bool {
    !background_is_dark(color)
}

/// Substates of the background region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundState {
    Light,
    Dark,
}

impl fmt::Display for BackgroundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackgroundState::Light => write!(f, "light"),
            BackgroundState::Dark => write!(f, "dark"),
        }
    }
}

/// Light/dark classification of the current background.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackgroundRegion;

impl Region for BackgroundRegion {
    type State = BackgroundState;

    fn name(&self) -> &'static str {
        "background"
    }

    fn initial(&self) -> BackgroundState {
        BackgroundState::Light
    }

    fn on_entry(&self, state: BackgroundState, _context: &MachineContext) -> Vec<Effect> {
        match state {
            BackgroundState::Light => vec![Effect::AssignUiDarkMode(false)],
            BackgroundState::Dark => vec![Effect::AssignUiDarkMode(true)],
        }
    }

    fn on_event(
        &self,
        state: BackgroundState,
        event: &RenderingEvent,
        _context: &MachineContext,
    ) -> Option<Transition<BackgroundState>> {
        let RenderingEvent::SetBackgroundColor(color) = event;
        match state {
            BackgroundState::Light if background_is_dark(color) => Some(Transition {
                target: BackgroundState::Dark,
                effects: vec![Effect::SendParent(ParentSignal::BackgroundTurnedDark)],
            }),
            BackgroundState::Dark if background_is_light(color) => Some(Transition {
                target: BackgroundState::Light,
                effects: vec![Effect::SendParent(ParentSignal::BackgroundTurnedLight)],
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guards() {
        assert!(background_is_dark(&Rgb([0.0, 0.0, 0.0])));
        assert!(background_is_light(&Rgb([1.0, 1.0, 1.0])));
        // Pure blue is dark, pure green is light
        assert!(background_is_dark(&Rgb([0.0, 0.0, 1.0])));
        assert!(background_is_light(&Rgb([0.0, 1.0, 0.0])));
    }

    #[test]
    fn test_region_transitions() {
        let region = BackgroundRegion;
        assert_eq!(region.name(), "background");
        let context = MachineContext::default();
        let dark = RenderingEvent::SetBackgroundColor(Rgb([0.1, 0.1, 0.1]));
        let light = RenderingEvent::SetBackgroundColor(Rgb([0.9, 0.9, 0.9]));

        let transition = region
            .on_event(BackgroundState::Light, &dark, &context)
            .unwrap();
        assert_eq!(transition.target, BackgroundState::Dark);
        assert_eq!(
            transition.effects,
            vec![Effect::SendParent(ParentSignal::BackgroundTurnedDark)]
        );

        assert!(region
            .on_event(BackgroundState::Light, &light, &context)
            .is_none());
        assert!(region
            .on_event(BackgroundState::Dark, &dark, &context)
            .is_none());
    }
}
