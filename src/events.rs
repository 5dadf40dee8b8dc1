//! Lifecycle events synthesized from environment-state transitions and
//! delivered to the script's `process` entry point.

use crate::environment::EnvironmentState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    FocusAcquired,
    FocusLost,
    ControllerConnected,
    /// The first controller became available.
    ControllerAvailable,
    ControllerDisconnected,
    /// The last controller went away.
    ControllerUnavailable,
}

impl EngineEvent {
    /// The script-facing event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FocusAcquired => "on_focus_acquired",
            Self::FocusLost => "on_focus_lost",
            Self::ControllerConnected => "on_controller_connected",
            Self::ControllerAvailable => "on_controller_available",
            Self::ControllerDisconnected => "on_controller_disconnected",
            Self::ControllerUnavailable => "on_controller_unavailable",
        }
    }
}

/// Fill `events` (reused across frames, cleared here) with the ordered
/// transitions the latest snapshot exposes.
pub fn synthesize(state: &EnvironmentState, events: &mut Vec<EngineEvent>) {
    events.clear();

    if state.active.was != state.active.is {
        events.push(if state.active.is {
            EngineEvent::FocusAcquired
        } else {
            EngineEvent::FocusLost
        });
    }

    let current = state.controllers.current as i64;
    if state.controllers.previous != current {
        if current > state.controllers.previous {
            events.push(EngineEvent::ControllerConnected);
            if current == 1 {
                events.push(EngineEvent::ControllerAvailable);
            }
        } else {
            events.push(EngineEvent::ControllerDisconnected);
            if current == 0 {
                events.push(EngineEvent::ControllerUnavailable);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;

    #[test]
    fn controller_plug_and_unplug_sequence() {
        let mut environment = Environment::new();
        let mut events = Vec::with_capacity(8);

        environment.process(0.016, true, 1);
        synthesize(environment.state(), &mut events);
        assert_eq!(
            events,
            vec![
                EngineEvent::ControllerConnected,
                EngineEvent::ControllerAvailable
            ]
        );

        environment.process(0.016, true, 2);
        synthesize(environment.state(), &mut events);
        assert_eq!(events, vec![EngineEvent::ControllerConnected]);

        environment.process(0.016, true, 0);
        synthesize(environment.state(), &mut events);
        assert_eq!(
            events,
            vec![
                EngineEvent::ControllerDisconnected,
                EngineEvent::ControllerUnavailable
            ]
        );
    }

    #[test]
    fn focus_events_come_first() {
        let mut environment = Environment::new();
        let mut events = Vec::new();

        environment.process(0.016, true, 0);
        environment.process(0.016, false, 1);
        synthesize(environment.state(), &mut events);
        assert_eq!(
            events,
            vec![
                EngineEvent::FocusLost,
                EngineEvent::ControllerConnected,
                EngineEvent::ControllerAvailable
            ]
        );
    }

    #[test]
    fn steady_state_yields_no_events() {
        let mut environment = Environment::new();
        let mut events = vec![EngineEvent::FocusLost]; // Leftover from last frame.
        environment.process(0.016, true, 0);
        environment.process(0.016, true, 0);
        synthesize(environment.state(), &mut events);
        assert!(events.is_empty());
    }
}
