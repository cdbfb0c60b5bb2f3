use std::fmt;

use tracing::{debug, trace};

use super::background::{BackgroundRegion, BackgroundState};
use super::{Effect, MachineContext, RenderingActions, RenderingEvent};

// =============================================================================
// Regions
// =============================================================================

/// Result of a region handling an event.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S> {
    pub target: S,

    /// Effects of the transition itself, run before the target's entry
    pub effects: Vec<Effect>,
}

/// One independent region of the parallel `active` state.
pub trait Region {
    type State: Copy + PartialEq + fmt::Debug;

    fn name(&self) -> &'static str;

    fn initial(&self) -> Self::State;

    /// Effects run when `state` is entered.
    fn on_entry(&self, state: Self::State, context: &MachineContext) -> Vec<Effect>;

    /// Transition taken for `event` in `state`, if any guard approves.
    fn on_event(
        &self,
        state: Self::State,
        event: &RenderingEvent,
        context: &MachineContext,
    ) -> Option<Transition<Self::State>>;
}

// =============================================================================
// Machine
// =============================================================================

/// Substates of the parallel `active` state, one per region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveState {
    pub background: BackgroundState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Idle,
    Active(ActiveState),
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineState::Idle => write!(f, "idle"),
            MachineState::Active(active) => write!(f, "active.background.{}", active.background),
        }
    }
}

/// Main rendering machine.
///
/// Events are processed one at a time; every effect of a transition runs
/// before `send` returns. Events sent before [`start`](Self::start) are
/// ignored.
pub struct MainRenderingMachine<A: RenderingActions> {
    state: MachineState,
    context: MachineContext,
    actions: A,
    background: BackgroundRegion,
}

impl<A: RenderingActions> MainRenderingMachine<A> {
    pub fn new(context: MachineContext, actions: A) -> Self {
        Self {
            state: MachineState::Idle,
            context,
            actions,
            background: BackgroundRegion,
        }
    }

    /// Leave `idle`: apply the context background color, then enter every
    /// region's initial state.
    pub fn start(&mut self) -> Vec<Effect> {
        if self.state != MachineState::Idle {
            return Vec::new();
        }

        let initial = self.background.initial();
        let mut effects = vec![Effect::SetBackgroundColor(self.context.background_color)];
        effects.extend(self.background.on_entry(initial, &self.context));

        self.state = MachineState::Active(ActiveState {
            background: initial,
        });
        self.execute(&effects);
        debug!(state = %self.state, "rendering machine started");
        effects
    }

    /// Process one event and return the effects that ran.
    pub fn send(&mut self, event: RenderingEvent) -> Vec<Effect> {
        let MachineState::Active(mut active) = self.state else {
            debug!(event = event.name(), "machine not started, ignoring event");
            return Vec::new();
        };

        // Handled at the `active` level regardless of substate
        let RenderingEvent::SetBackgroundColor(color) = event;
        let mut effects = vec![Effect::SetBackgroundColor(color)];

        if let Some(transition) = self
            .background
            .on_event(active.background, &event, &self.context)
        {
            effects.extend(transition.effects);
            effects.extend(self.background.on_entry(transition.target, &self.context));
            active.background = transition.target;
        }

        let previous = self.state;
        self.state = MachineState::Active(active);
        self.execute(&effects);
        if previous != self.state {
            debug!(
                region = self.background.name(),
                from = %previous,
                to = %self.state,
                "rendering machine transition"
            );
        }
        effects
    }

    fn execute(&mut self, effects: &[Effect]) {
        for effect in effects {
            trace!(?effect, "executing effect");
            match effect {
                Effect::SetBackgroundColor(color) => {
                    self.context.background_color = *color;
                    self.actions.set_background_color(*color);
                }
                Effect::SendParent(signal) => {
                    if let Some(parent) = self.context.parent() {
                        if parent.send(*signal).is_err() {
                            debug!(signal = signal.name(), "parent gone, dropping signal");
                        }
                    }
                }
                Effect::AssignUiDarkMode(dark) => self.context.ui_dark_mode = *dark,
            }
        }
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn context(&self) -> &MachineContext {
        &self.context
    }

    pub fn actions(&self) -> &A {
        &self.actions
    }
}
