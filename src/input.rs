//! Input aggregator: one keyboard, one cursor and up to four controllers,
//! polled once per frame with edge-triggered button states and
//! deadzone-normalized analog values.

use log::{debug, info, warn};

use crate::platform::{
    CursorButton, GamepadButton, Key, VideoBackend, CURSOR_BUTTON_COUNT,
    GAMEPAD_BUTTON_COUNT, JOYSTICKS_COUNT, KEYS, KEY_COUNT,
};

pub const CONTROLLERS_COUNT: usize = 4;

/// How often the joystick slots are rescanned for (dis)connections.
const CONTROLLER_DETECTION_PERIOD: f64 = 3.0;

/// The lowest controller drives the emulated cursor.
const CURSOR_CONTROLLER_ID: usize = 0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Button {
    pub was: bool,
    pub is: bool,
    pub down: bool,
    pub pressed: bool,
    pub released: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stick {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub magnitude: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Triggers {
    pub left: f32,
    pub right: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StickSide {
    Left,
    Right,
}

impl StickSide {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

pub struct Keyboard {
    buttons: [Button; KEY_COUNT],
}

impl Keyboard {
    pub fn button(&self, key: Key) -> Button {
        self.buttons[key as usize]
    }
}

pub struct Cursor {
    buttons: [Button; CURSOR_BUTTON_COUNT],
    x: f32,
    y: f32,
    area: (f32, f32, f32, f32),
    scale: (f32, f32),
    enabled: bool,
}

impl Cursor {
    pub fn button(&self, button: CursorButton) -> Button {
        self.buttons[button as usize]
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }

    /// Move the cursor; clipped to the canvas rectangle. The position is
    /// kept mid-pixel so analog movement accumulates cleanly.
    pub fn set_position(&mut self, x: i32, y: i32) {
        self.place(x as f32 + 0.5, y as f32 + 0.5);
    }

    pub fn is_available(&self) -> bool {
        true // Emulation covers the cursor even with no physical mouse.
    }

    fn place(&mut self, x: f32, y: f32) {
        let (x0, y0, x1, y1) = self.area;
        self.x = x.clamp(x0, x1);
        self.y = y.clamp(y0, y1);
    }
}

pub struct Controller {
    id: usize,
    jid: Option<usize>,
    buttons: [Button; GAMEPAD_BUTTON_COUNT],
    sticks: [Stick; 2],
    triggers: Triggers,
}

impl Controller {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_available(&self) -> bool {
        // Slots #0 and #1 are keyboard-emulated even when unbound.
        self.jid.is_some() || self.id < 2
    }

    pub fn button(&self, button: GamepadButton) -> Button {
        self.buttons[button as usize]
    }

    pub fn stick(&self, side: StickSide) -> Stick {
        self.sticks[side as usize]
    }

    pub fn triggers(&self) -> Triggers {
        self.triggers
    }
}

pub struct InputSettings {
    /// Gamepad database in SDL mapping format.
    pub mappings: Option<String>,
    /// Escape closes the window when set.
    pub exit_key: bool,
    pub cursor_enabled: bool,
    /// Emulated-cursor speed, virtual pixels per second.
    pub cursor_speed: f32,
    pub inner_deadzone: f32,
    pub outer_deadzone: f32,
    /// Synthesize controllers #0/#1 from the keyboard.
    pub emulate_controllers: bool,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            mappings: None,
            exit_key: false,
            cursor_enabled: true,
            cursor_speed: 512.0,
            inner_deadzone: 0.25,
            outer_deadzone: 0.0,
            emulate_controllers: true,
        }
    }
}

pub struct Input {
    exit_key: bool,
    cursor_speed: f32,
    deadzone: f32,
    range: f32,
    emulate_controllers: bool,
    keyboard: Keyboard,
    cursor: Cursor,
    controllers: [Controller; CONTROLLERS_COUNT],
    used_joysticks: [bool; JOYSTICKS_COUNT],
    controllers_count: usize,
    age: f64,
}

// https://web.archive.org/web/2021/http://blog.hypersect.com/interpreting-analog-sticks/
fn normalized_stick(x: f32, y: f32, deadzone: f32, range: f32) -> Stick {
    let magnitude = (x * x + y * y).sqrt();
    if magnitude < deadzone || magnitude <= f32::EPSILON {
        Stick::default()
    } else {
        // Rescale to [0, 1]; the response curve is left to the user.
        let angle = y.atan2(x);
        let normalized = ((magnitude - deadzone) / range).min(1.0);
        let scale = normalized / magnitude;
        Stick {
            x: x * scale,
            y: y * scale,
            angle,
            magnitude: normalized,
        }
    }
}

fn normalized_trigger(magnitude: f32, deadzone: f32, range: f32) -> f32 {
    if magnitude < deadzone {
        0.0
    } else {
        ((magnitude - deadzone) / range).min(1.0)
    }
}

fn sync_edges(buttons: &mut [Button]) {
    for button in buttons {
        button.down = button.is;
        button.pressed = !button.was && button.is;
        button.released = button.was && !button.is;
    }
}

/// Copy mapped source buttons over, unless the target is already pressed.
fn overlay_buttons(target: &mut [Button], source: &[Button], mapping: &[(usize, usize)]) {
    for &(from, to) in mapping {
        if target[to].is {
            continue;
        }
        target[to] = source[from];
    }
}

const KEYBOARD_TO_CONTROLLER_0: [(usize, usize); 10] = [
    (Key::W as usize, GamepadButton::Up as usize),
    (Key::S as usize, GamepadButton::Down as usize),
    (Key::A as usize, GamepadButton::Left as usize),
    (Key::D as usize, GamepadButton::Right as usize),
    (Key::C as usize, GamepadButton::Y as usize),
    (Key::F as usize, GamepadButton::X as usize),
    (Key::V as usize, GamepadButton::B as usize),
    (Key::G as usize, GamepadButton::A as usize),
    (Key::X as usize, GamepadButton::Select as usize),
    (Key::Z as usize, GamepadButton::Start as usize),
];

const KEYBOARD_TO_CONTROLLER_1: [(usize, usize); 10] = [
    (Key::Up as usize, GamepadButton::Up as usize),
    (Key::Down as usize, GamepadButton::Down as usize),
    (Key::Left as usize, GamepadButton::Left as usize),
    (Key::Right as usize, GamepadButton::Right as usize),
    (Key::K as usize, GamepadButton::Y as usize),
    (Key::O as usize, GamepadButton::X as usize),
    (Key::L as usize, GamepadButton::B as usize),
    (Key::P as usize, GamepadButton::A as usize),
    (Key::M as usize, GamepadButton::Select as usize),
    (Key::N as usize, GamepadButton::Start as usize),
];

const CONTROLLER_TO_CURSOR: [(usize, usize); 3] = [
    (GamepadButton::Y as usize, CursorButton::Left as usize),
    (GamepadButton::X as usize, CursorButton::Right as usize),
    (GamepadButton::B as usize, CursorButton::Middle as usize),
];

impl Input {
    pub fn new(
        settings: &InputSettings,
        backend: &mut dyn VideoBackend,
    ) -> Result<Self, crate::errors::EngineError> {
        if let Some(mappings) = &settings.mappings {
            if !backend.update_gamepad_mappings(mappings) {
                warn!("can't update the controller mappings");
            } else {
                debug!("controller mappings updated");
            }
        }

        let layout = backend.layout();
        let physical = layout.present;
        let canvas = layout.canvas;

        let cursor = Cursor {
            buttons: [Button::default(); CURSOR_BUTTON_COUNT],
            x: 0.0,
            y: 0.0,
            area: (
                0.0,
                0.0,
                (canvas.width - 1) as f32,
                (canvas.height - 1) as f32,
            ),
            scale: (
                canvas.width as f32 / physical.width as f32,
                canvas.height as f32 / physical.height as f32,
            ),
            enabled: settings.cursor_enabled,
        };

        let controllers = std::array::from_fn(|id| Controller {
            id,
            jid: None,
            buttons: [Button::default(); GAMEPAD_BUTTON_COUNT],
            sticks: [Stick::default(); 2],
            triggers: Triggers::default(),
        });

        let mut input = Self {
            exit_key: settings.exit_key,
            cursor_speed: settings.cursor_speed,
            deadzone: settings.inner_deadzone,
            range: 1.0 - settings.inner_deadzone - settings.outer_deadzone,
            emulate_controllers: settings.emulate_controllers,
            keyboard: Keyboard {
                buttons: [Button::default(); KEY_COUNT],
            },
            cursor,
            controllers,
            used_joysticks: [false; JOYSTICKS_COUNT],
            controllers_count: 0,
            age: 0.0,
        };

        input.controllers_count = input.detect_controllers(backend);
        if input.controllers_count == 0 {
            info!("no controllers detected");
        } else {
            info!("{} controller(s) detected", input.controllers_count);
        }

        Ok(input)
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    pub fn controller(&self, id: usize) -> Option<&Controller> {
        self.controllers.get(id)
    }

    pub fn controllers_count(&self) -> usize {
        self.controllers_count
    }

    fn detect_controllers(&mut self, backend: &mut dyn VideoBackend) -> usize {
        let mut count = 0;

        // First pass: unbind disappeared joysticks.
        for controller in &mut self.controllers {
            let Some(jid) = controller.jid else {
                continue;
            };
            if !backend.is_joystick_gamepad(jid) {
                debug!("controller #{} w/ joystick #{jid} detached", controller.id);
                self.used_joysticks[jid] = false;
                controller.jid = None;
                continue;
            }
            count += 1;
        }

        // Second pass: bind free joysticks to unbound slots, lowest first.
        for controller in &mut self.controllers {
            if controller.jid.is_some() {
                continue;
            }
            for jid in 0..JOYSTICKS_COUNT {
                if self.used_joysticks[jid] || !backend.is_joystick_gamepad(jid) {
                    continue;
                }
                debug!("controller #{} bound to joystick #{jid}", controller.id);
                controller.jid = Some(jid);
                self.used_joysticks[jid] = true;
                count += 1;
                break;
            }
        }

        count
    }

    fn poll_keyboard(&mut self, backend: &dyn VideoBackend) {
        for (index, key) in KEYS.iter().enumerate() {
            let button = &mut self.keyboard.buttons[index];
            button.was = button.is;
            button.is = backend.is_key_down(*key);
        }
    }

    fn poll_cursor(&mut self, backend: &dyn VideoBackend) {
        // Reset first, or emulated button presses would stick.
        for button in &mut self.cursor.buttons {
            button.was = button.is;
            button.is = false;
        }

        if !self.cursor.enabled || !backend.has_mouse() {
            return;
        }

        for (index, button) in [CursorButton::Left, CursorButton::Right, CursorButton::Middle]
            .into_iter()
            .enumerate()
        {
            self.cursor.buttons[index].is = backend.is_mouse_button_down(button);
        }

        let (x, y) = backend.mouse_position();
        let (scale_x, scale_y) = self.cursor.scale;
        self.cursor
            .place(x as f32 * scale_x + 0.5, y as f32 * scale_y + 0.5);
    }

    fn poll_controllers(&mut self, backend: &mut dyn VideoBackend) {
        let deadzone = self.deadzone;
        let range = self.range;

        for controller in &mut self.controllers {
            // Move `is` back to `was` and clear, so a disconnected pad
            // does not keep its last state forever.
            for button in &mut controller.buttons {
                button.was = button.is;
                button.is = false;
            }
            controller.sticks = [Stick::default(); 2];
            controller.triggers = Triggers::default();

            let Some(state) = controller.jid.and_then(|jid| backend.gamepad_state(jid))
            else {
                continue;
            };

            for (index, &down) in state.buttons.iter().enumerate() {
                controller.buttons[index].is = down;
            }
            controller.sticks[StickSide::Left as usize] =
                normalized_stick(state.axes[0], state.axes[1], deadzone, range);
            controller.sticks[StickSide::Right as usize] =
                normalized_stick(state.axes[2], state.axes[3], deadzone, range);
            controller.triggers = Triggers {
                left: normalized_trigger(state.axes[4], deadzone, range),
                right: normalized_trigger(state.axes[5], deadzone, range),
            };
        }
    }

    /// Per-frame device poll: refresh raw states, derive edges, apply the
    /// emulation overlays, honor the exit key.
    pub fn process(&mut self, backend: &mut dyn VideoBackend) {
        self.poll_keyboard(backend);
        self.poll_cursor(backend);
        self.poll_controllers(backend);

        sync_edges(&mut self.keyboard.buttons);
        sync_edges(&mut self.cursor.buttons);
        for controller in &mut self.controllers {
            sync_edges(&mut controller.buttons);
        }

        if self.emulate_controllers {
            overlay_buttons(
                &mut self.controllers[0].buttons,
                &self.keyboard.buttons,
                &KEYBOARD_TO_CONTROLLER_0,
            );
            overlay_buttons(
                &mut self.controllers[1].buttons,
                &self.keyboard.buttons,
                &KEYBOARD_TO_CONTROLLER_1,
            );
        }

        if !self.cursor.enabled {
            let controller = &self.controllers[CURSOR_CONTROLLER_ID];
            let buttons = controller.buttons;
            overlay_buttons(&mut self.cursor.buttons, &buttons, &CONTROLLER_TO_CURSOR);
        }

        if self.exit_key && backend.is_exit_key_down() {
            info!("exit key pressed");
            backend.request_close();
        }
    }

    /// Fixed-step update: emulated cursor movement and periodic controller
    /// detection.
    pub fn update(&mut self, delta_time: f64, backend: &mut dyn VideoBackend) -> bool {
        if !self.cursor.enabled {
            // The first bound controller's right stick moves the cursor.
            if let Some(controller) = self
                .controllers
                .iter()
                .find(|controller| controller.jid.is_some())
            {
                let stick = controller.sticks[StickSide::Right as usize];
                let delta = self.cursor_speed * delta_time as f32;
                let (x, y) = (self.cursor.x, self.cursor.y);
                self.cursor.place(x + stick.x * delta, y + stick.y * delta);
            }
        }

        self.age += delta_time;
        while self.age >= CONTROLLER_DETECTION_PERIOD {
            self.age -= CONTROLLER_DETECTION_PERIOD;
            self.controllers_count = self.detect_controllers(backend);
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::headless::HeadlessBackend;
    use crate::platform::{GamepadState, VideoSettings};

    fn fixture(settings: InputSettings) -> (HeadlessBackend, Input) {
        let mut backend = HeadlessBackend::new(&VideoSettings {
            width: 320,
            height: 200,
            scale: 2,
            ..VideoSettings::default()
        })
        .unwrap();
        let input = Input::new(&settings, &mut backend).unwrap();
        (backend, input)
    }

    #[test]
    fn button_edges_fire_once() {
        let (mut backend, mut input) = fixture(InputSettings::default());

        backend.press_key(Key::Space, true);
        input.process(&mut backend);
        let button = input.keyboard().button(Key::Space);
        assert!(button.down && button.pressed && !button.released);

        input.process(&mut backend);
        let button = input.keyboard().button(Key::Space);
        assert!(button.down && !button.pressed && !button.released);

        backend.press_key(Key::Space, false);
        input.process(&mut backend);
        let button = input.keyboard().button(Key::Space);
        assert!(!button.down && !button.pressed && button.released);
        // `pressed` and `released` are never both set.
        assert!(!(button.pressed && button.released));
    }

    #[test]
    fn stick_deadzone_and_rescale() {
        let settings = InputSettings {
            inner_deadzone: 0.2,
            outer_deadzone: 0.05,
            ..InputSettings::default()
        };
        let (mut backend, mut input) = fixture(settings);

        let mut state = GamepadState::default();
        state.axes[0] = 0.1;
        backend.plug_gamepad(0, Some(state));
        input.update(3.0, &mut backend); // Trigger a detection rescan.
        input.process(&mut backend);

        let stick = input.controller(0).unwrap().stick(StickSide::Left);
        assert_eq!(stick, Stick::default()); // Below the deadzone: exactly zero.

        let mut state = GamepadState::default();
        state.axes[0] = 0.95;
        backend.plug_gamepad(0, Some(state));
        input.process(&mut backend);
        let stick = input.controller(0).unwrap().stick(StickSide::Left);
        assert!((stick.magnitude - 1.0).abs() < 1e-6);
        assert!((stick.x - 1.0).abs() < 1e-6);

        // Magnitude is zero exactly when the vector is zero.
        assert!(stick.magnitude > 0.0 && (stick.x, stick.y) != (0.0, 0.0));
    }

    #[test]
    fn controllers_bind_and_detach_on_rescan() {
        let (mut backend, mut input) = fixture(InputSettings::default());
        assert_eq!(input.controllers_count(), 0);

        backend.plug_gamepad(3, Some(GamepadState::default()));
        input.update(3.0, &mut backend);
        assert_eq!(input.controllers_count(), 1);
        assert!(input.controller(0).unwrap().is_available());

        backend.plug_gamepad(3, None);
        input.update(3.0, &mut backend);
        assert_eq!(input.controllers_count(), 0);
        // Slot #0 stays keyboard-emulated.
        assert!(input.controller(0).unwrap().is_available());
        assert!(!input.controller(2).unwrap().is_available());
    }

    #[test]
    fn keyboard_emulates_the_first_two_controllers() {
        let (mut backend, mut input) = fixture(InputSettings::default());

        backend.press_key(Key::W, true);
        backend.press_key(Key::Right, true);
        input.process(&mut backend);

        assert!(input
            .controller(0)
            .unwrap()
            .button(GamepadButton::Up)
            .pressed);
        assert!(input
            .controller(1)
            .unwrap()
            .button(GamepadButton::Right)
            .down);
        assert!(!input
            .controller(0)
            .unwrap()
            .button(GamepadButton::Right)
            .down);
    }

    #[test]
    fn cursor_position_scales_and_clips() {
        let settings = InputSettings {
            cursor_enabled: true,
            ..InputSettings::default()
        };
        let (mut backend, mut input) = fixture(settings);
        backend.set_mouse(true);

        // Physical 640x400 maps onto virtual 320x200.
        backend.move_mouse(640.0, 100.0);
        input.process(&mut backend);
        let (x, y) = input.cursor().position();
        assert_eq!((x, y), (319, 50));

        input.cursor_mut().set_position(1000, -5);
        assert_eq!(input.cursor().position(), (319, 0));
        input.cursor_mut().set_position(10, 20);
        assert_eq!(input.cursor().position(), (10, 20));
    }

    #[test]
    fn right_stick_drives_the_emulated_cursor() {
        let settings = InputSettings {
            cursor_enabled: false,
            cursor_speed: 100.0,
            inner_deadzone: 0.0,
            outer_deadzone: 0.0,
            ..InputSettings::default()
        };
        let (mut backend, mut input) = fixture(settings);

        let mut state = GamepadState::default();
        state.axes[2] = 1.0; // Right stick, hard right.
        backend.plug_gamepad(0, Some(state));
        input.update(3.0, &mut backend);
        input.process(&mut backend);

        let before = input.cursor().position();
        input.update(0.5, &mut backend); // 100 px/s for half a second.
        let after = input.cursor().position();
        assert_eq!(after.0 - before.0, 50);
        assert_eq!(after.1, before.1);
    }

    #[test]
    fn controller_buttons_synthesize_cursor_buttons() {
        let settings = InputSettings {
            cursor_enabled: false,
            ..InputSettings::default()
        };
        let (mut backend, mut input) = fixture(settings);

        let mut state = GamepadState::default();
        state.buttons[GamepadButton::Y as usize] = true;
        backend.plug_gamepad(0, Some(state));
        input.update(3.0, &mut backend);
        input.process(&mut backend);

        assert!(input.cursor().button(CursorButton::Left).down);
        assert!(!input.cursor().button(CursorButton::Right).down);
    }

    #[test]
    fn exit_key_requests_close() {
        let settings = InputSettings {
            exit_key: true,
            ..InputSettings::default()
        };
        let (mut backend, mut input) = fixture(settings);

        use crate::platform::VideoBackend as _;
        assert!(!backend.should_close());
        backend.press_exit_key(true);
        input.process(&mut backend);
        assert!(backend.should_close());
    }
}
