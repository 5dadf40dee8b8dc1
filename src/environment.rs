//! Environment: the per-frame state snapshot scripts and the event
//! synthesizer observe (focus, controller population, elapsed time, frame
//! statistics).

const FPS_AVERAGE_SAMPLES: usize = 128;

#[derive(Debug, Clone, Copy, Default)]
pub struct FocusState {
    pub is: bool,
    pub was: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ControllersState {
    /// `-1` until the first snapshot, so an initially present controller
    /// still produces a connection event.
    pub previous: i64,
    pub current: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub fps: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct EnvironmentState {
    pub active: FocusState,
    pub controllers: ControllersState,
    pub time: f64,
    pub stats: Stats,
}

pub struct Environment {
    state: EnvironmentState,
    samples: [f64; FPS_AVERAGE_SAMPLES],
    index: usize,
    sum: f64,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            state: EnvironmentState {
                active: FocusState {
                    is: true,
                    was: true,
                },
                controllers: ControllersState {
                    previous: -1,
                    current: 0,
                },
                time: 0.0,
                stats: Stats::default(),
            },
            samples: [0.0; FPS_AVERAGE_SAMPLES],
            index: 0,
            sum: 0.0,
        }
    }

    pub fn state(&self) -> &EnvironmentState {
        &self.state
    }

    fn moving_average_fps(&mut self, frame_time: f64) -> usize {
        self.sum -= self.samples[self.index];
        self.samples[self.index] = frame_time;
        self.sum += frame_time;
        self.index = (self.index + 1) % FPS_AVERAGE_SAMPLES;
        if self.sum <= 0.0 {
            return 0;
        }
        (FPS_AVERAGE_SAMPLES as f64 / self.sum + 0.5) as usize
    }

    /// Take the frame snapshot: focus transition, controller population
    /// and the frame-rate moving average.
    pub fn process(&mut self, frame_time: f64, focused: bool, controllers_count: usize) {
        self.state.active.was = self.state.active.is;
        self.state.active.is = focused;

        self.state.controllers.previous = self.state.controllers.current as i64;
        self.state.controllers.current = controllers_count;

        self.state.stats.fps = self.moving_average_fps(frame_time);
    }

    pub fn update(&mut self, delta_time: f64) -> bool {
        self.state.time += delta_time;
        true
    }
}
