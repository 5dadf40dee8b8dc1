//! The windowless backend: input is scripted, frames are retained for
//! inspection. Used as the default build's backend and throughout the
//! test-suite.

use std::time::Instant;

use crate::errors::EngineError;
use crate::graphics::Size;
use crate::platform::{
    compute_layout, CursorButton, Frame, GamepadState, Key, VideoBackend, VideoLayout,
    VideoSettings, CURSOR_BUTTON_COUNT, JOYSTICKS_COUNT, KEY_COUNT,
};

/// The work area assumed when there is no monitor to ask.
const VIRTUAL_DISPLAY: Size = Size {
    width: 1920,
    height: 1080,
};

pub struct HeadlessBackend {
    layout: VideoLayout,
    started: Instant,
    close_requested: bool,
    exit_key_down: bool,
    focused: bool,
    has_mouse: bool,
    keys: [bool; KEY_COUNT],
    mouse_buttons: [bool; CURSOR_BUTTON_COUNT],
    mouse_position: (f64, f64),
    gamepads: [Option<GamepadState>; JOYSTICKS_COUNT],
    frame: Option<(u32, u32, Vec<u8>)>,
    presented_frames: usize,
}

impl HeadlessBackend {
    pub fn new(settings: &VideoSettings) -> Result<Self, EngineError> {
        let layout = compute_layout(VIRTUAL_DISPLAY, settings)?;
        Ok(Self {
            layout,
            started: Instant::now(),
            close_requested: false,
            exit_key_down: false,
            focused: true,
            has_mouse: false,
            keys: [false; KEY_COUNT],
            mouse_buttons: [false; CURSOR_BUTTON_COUNT],
            mouse_position: (0.0, 0.0),
            gamepads: [None; JOYSTICKS_COUNT],
            frame: None,
            presented_frames: 0,
        })
    }

    // Test/driver hooks: script the devices this backend pretends to own.

    pub fn press_key(&mut self, key: Key, down: bool) {
        self.keys[key as usize] = down;
    }

    pub fn set_mouse(&mut self, present: bool) {
        self.has_mouse = present;
    }

    pub fn press_mouse_button(&mut self, button: CursorButton, down: bool) {
        self.mouse_buttons[button as usize] = down;
    }

    pub fn move_mouse(&mut self, x: f64, y: f64) {
        self.mouse_position = (x, y);
    }

    pub fn plug_gamepad(&mut self, jid: usize, state: Option<GamepadState>) {
        self.gamepads[jid] = state;
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub fn press_exit_key(&mut self, down: bool) {
        self.exit_key_down = down;
    }

    /// The last presented frame, as `(width, height, rgba)`.
    pub fn last_frame(&self) -> Option<(u32, u32, &[u8])> {
        self.frame
            .as_ref()
            .map(|(width, height, pixels)| (*width, *height, pixels.as_slice()))
    }

    pub fn presented_frames(&self) -> usize {
        self.presented_frames
    }
}

impl VideoBackend for HeadlessBackend {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn layout(&self) -> VideoLayout {
        self.layout
    }

    fn poll_events(&mut self) {}

    fn should_close(&self) -> bool {
        self.close_requested
    }

    fn request_close(&mut self) {
        self.close_requested = true;
    }

    fn is_focused(&self) -> bool {
        self.focused
    }

    fn is_key_down(&self, key: Key) -> bool {
        self.keys[key as usize]
    }

    fn is_exit_key_down(&self) -> bool {
        self.exit_key_down
    }

    fn is_mouse_button_down(&self, button: CursorButton) -> bool {
        self.mouse_buttons[button as usize]
    }

    fn mouse_position(&self) -> (f64, f64) {
        self.mouse_position
    }

    fn has_mouse(&self) -> bool {
        self.has_mouse
    }

    fn is_joystick_gamepad(&mut self, jid: usize) -> bool {
        self.gamepads.get(jid).is_some_and(|slot| slot.is_some())
    }

    fn gamepad_state(&mut self, jid: usize) -> Option<GamepadState> {
        self.gamepads.get(jid).copied().flatten()
    }

    fn update_gamepad_mappings(&mut self, _mappings: &str) -> bool {
        true
    }

    fn present(&mut self, frame: &Frame) -> Result<(), EngineError> {
        self.frame = Some((frame.width, frame.height, frame.pixels.to_vec()));
        self.presented_frames += 1;
        Ok(())
    }

    fn time(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_retained() {
        let mut backend = HeadlessBackend::new(&VideoSettings::default()).unwrap();
        let pixels = vec![255; 4];
        backend
            .present(&Frame {
                pixels: &pixels,
                width: 1,
                height: 1,
                offset: crate::graphics::Point::new(0, 0),
                time: 0.0,
            })
            .unwrap();
        assert_eq!(backend.presented_frames(), 1);
        let (width, height, data) = backend.last_frame().unwrap();
        assert_eq!((width, height), (1, 1));
        assert_eq!(data, &[255, 255, 255, 255]);
    }

    #[test]
    fn scripted_input_reads_back() {
        let mut backend = HeadlessBackend::new(&VideoSettings::default()).unwrap();
        assert!(!backend.is_key_down(Key::A));
        backend.press_key(Key::A, true);
        assert!(backend.is_key_down(Key::A));

        assert!(!backend.is_joystick_gamepad(0));
        backend.plug_gamepad(0, Some(GamepadState::default()));
        assert!(backend.is_joystick_gamepad(0));
    }
}
