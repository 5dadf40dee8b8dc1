//! Platform backends: window, GL presentation, raw input polling and the
//! monotonic clock.
//!
//! The engine talks to a [`VideoBackend`] trait object. The default build
//! ships the [`headless::HeadlessBackend`] only; the `backend_glfw` feature
//! adds a real windowed backend.

pub mod headless;

#[cfg(feature = "backend_glfw")]
pub mod glfw;

use crate::errors::EngineError;
use crate::graphics::{Point, Rect, Size};

/// The 42 named keyboard buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Key {
    Digit1,
    Digit2,
    Digit3,
    Digit4,
    Digit5,
    Digit6,
    Digit7,
    Digit8,
    Digit9,
    Digit0,
    Q,
    W,
    E,
    R,
    T,
    Y,
    U,
    I,
    O,
    P,
    A,
    S,
    D,
    F,
    G,
    H,
    J,
    K,
    L,
    Z,
    X,
    C,
    V,
    B,
    N,
    M,
    Up,
    Down,
    Left,
    Right,
    Enter,
    Space,
}

pub const KEY_COUNT: usize = 42;

pub const KEYS: [Key; KEY_COUNT] = [
    Key::Digit1,
    Key::Digit2,
    Key::Digit3,
    Key::Digit4,
    Key::Digit5,
    Key::Digit6,
    Key::Digit7,
    Key::Digit8,
    Key::Digit9,
    Key::Digit0,
    Key::Q,
    Key::W,
    Key::E,
    Key::R,
    Key::T,
    Key::Y,
    Key::U,
    Key::I,
    Key::O,
    Key::P,
    Key::A,
    Key::S,
    Key::D,
    Key::F,
    Key::G,
    Key::H,
    Key::J,
    Key::K,
    Key::L,
    Key::Z,
    Key::X,
    Key::C,
    Key::V,
    Key::B,
    Key::N,
    Key::M,
    Key::Up,
    Key::Down,
    Key::Left,
    Key::Right,
    Key::Enter,
    Key::Space,
];

impl Key {
    pub fn parse(name: &str) -> Option<Self> {
        let names = [
            "1", "2", "3", "4", "5", "6", "7", "8", "9", "0", "q", "w", "e", "r", "t", "y",
            "u", "i", "o", "p", "a", "s", "d", "f", "g", "h", "j", "k", "l", "z", "x", "c",
            "v", "b", "n", "m", "up", "down", "left", "right", "enter", "space",
        ];
        names
            .iter()
            .position(|&candidate| candidate == name)
            .map(|index| KEYS[index])
    }
}

/// The three cursor buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum CursorButton {
    Left,
    Right,
    Middle,
}

pub const CURSOR_BUTTON_COUNT: usize = 3;

impl CursorButton {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "middle" => Some(Self::Middle),
            _ => None,
        }
    }
}

/// The 14 controller buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum GamepadButton {
    Up,
    Down,
    Left,
    Right,
    LeftBumper,
    RightBumper,
    LeftThumb,
    RightThumb,
    Y,
    X,
    B,
    A,
    Select,
    Start,
}

pub const GAMEPAD_BUTTON_COUNT: usize = 14;

impl GamepadButton {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "lb" => Some(Self::LeftBumper),
            "rb" => Some(Self::RightBumper),
            "lt" => Some(Self::LeftThumb),
            "rt" => Some(Self::RightThumb),
            "y" => Some(Self::Y),
            "x" => Some(Self::X),
            "b" => Some(Self::B),
            "a" => Some(Self::A),
            "select" => Some(Self::Select),
            "start" => Some(Self::Start),
            _ => None,
        }
    }
}

/// Raw gamepad state as read from the platform, pre-deadzone.
#[derive(Debug, Clone, Copy, Default)]
pub struct GamepadState {
    pub buttons: [bool; GAMEPAD_BUTTON_COUNT],
    /// `left_x, left_y, right_x, right_y, left_trigger, right_trigger`.
    pub axes: [f32; 6],
}

/// The highest joystick slot scanned for gamepads.
pub const JOYSTICKS_COUNT: usize = 16;

pub struct VideoSettings {
    pub title: String,
    /// Virtual canvas size; `0` fits the monitor work area.
    pub width: u32,
    pub height: u32,
    /// Integer upscale; `0` picks the largest that fits.
    pub scale: u32,
    pub fullscreen: bool,
    pub vertical_sync: bool,
    /// GLSL fragment-effect snippet; pass-through when `None`.
    pub effect: Option<String>,
    /// RGBA window icon.
    pub icon: Option<(u32, u32, Vec<u8>)>,
    pub hide_cursor: bool,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            title: String::new(),
            width: 320,
            height: 240,
            scale: 1,
            fullscreen: false,
            vertical_sync: false,
            effect: None,
            icon: None,
            hide_cursor: true,
        }
    }
}

/// Physical/virtual geometry resolved at window creation.
#[derive(Debug, Clone, Copy)]
pub struct VideoLayout {
    /// The virtual canvas, in pixels.
    pub canvas: Size,
    /// Window size and position on the monitor.
    pub window: Rect,
    /// Where the upscaled canvas lands inside the window (letterboxed when
    /// fullscreen).
    pub present: Rect,
}

/// Compute the canvas/window/present geometry the way the engine sizes its
/// output: zero canvas dimensions fit the display, the scale defaults to
/// the largest integer factor that fits, fullscreen letterboxes centered.
pub fn compute_layout(
    display: Size,
    settings: &VideoSettings,
) -> Result<VideoLayout, EngineError> {
    let canvas = Size::new(
        if settings.width > 0 {
            settings.width
        } else {
            display.width
        },
        if settings.height > 0 {
            settings.height
        } else {
            display.height
        },
    );

    let max_scale = (display.width / canvas.width).min(display.height / canvas.height);
    if max_scale == 0 {
        return Err(EngineError::Platform(format!(
            "canvas {}x{} can't fit the {}x{} display",
            canvas.width, canvas.height, display.width, display.height
        )));
    }
    let scale = match settings.scale {
        0 => max_scale,
        wanted => wanted.min(max_scale),
    };

    let scaled = Size::new(canvas.width * scale, canvas.height * scale);
    let x = (display.width as i32 - scaled.width as i32) / 2;
    let y = (display.height as i32 - scaled.height as i32) / 2;

    let layout = if settings.fullscreen {
        VideoLayout {
            canvas,
            window: Rect::new(0, 0, display.width, display.height),
            present: Rect::new(x, y, scaled.width, scaled.height),
        }
    } else {
        VideoLayout {
            canvas,
            window: Rect::new(x, y, scaled.width, scaled.height),
            present: Rect::new(0, 0, scaled.width, scaled.height),
        }
    };
    Ok(layout)
}

/// One frame of RGBA pixels ready for presentation.
pub struct Frame<'a> {
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
    /// Per-frame displacement of the destination rectangle (shake
    /// effects).
    pub offset: Point,
    /// Seconds fed to the effect shader's `u_time`.
    pub time: f32,
}

/// The platform surface the engine renders to and polls input from.
pub trait VideoBackend {
    /// Backend-specific escape hatch (inspection in tests, mostly).
    fn as_any(&self) -> &dyn std::any::Any;

    fn layout(&self) -> VideoLayout;

    fn poll_events(&mut self);
    fn should_close(&self) -> bool;
    fn request_close(&mut self);
    fn is_focused(&self) -> bool;

    fn is_key_down(&self, key: Key) -> bool;
    /// The out-of-band exit key (Escape), not part of the scripted set.
    fn is_exit_key_down(&self) -> bool;
    fn is_mouse_button_down(&self, button: CursorButton) -> bool;
    /// Cursor position in physical window coordinates.
    fn mouse_position(&self) -> (f64, f64);
    /// Whether a physical mouse is present at all.
    fn has_mouse(&self) -> bool;

    fn is_joystick_gamepad(&mut self, jid: usize) -> bool;
    fn gamepad_state(&mut self, jid: usize) -> Option<GamepadState>;
    fn update_gamepad_mappings(&mut self, mappings: &str) -> bool;

    fn present(&mut self, frame: &Frame) -> Result<(), EngineError>;

    /// Monotonic clock, in seconds.
    fn time(&self) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(width: u32, height: u32, scale: u32, fullscreen: bool) -> VideoSettings {
        VideoSettings {
            width,
            height,
            scale,
            fullscreen,
            ..VideoSettings::default()
        }
    }

    #[test]
    fn zero_size_fits_the_display() {
        let layout =
            compute_layout(Size::new(1920, 1080), &settings(0, 0, 1, false)).unwrap();
        assert_eq!(layout.canvas, Size::new(1920, 1080));
        assert_eq!(layout.window, Rect::new(0, 0, 1920, 1080));
    }

    #[test]
    fn zero_scale_picks_the_largest_fit() {
        let layout =
            compute_layout(Size::new(1920, 1080), &settings(320, 200, 0, false)).unwrap();
        assert_eq!(layout.canvas, Size::new(320, 200));
        // 1080 / 200 = 5 is the limiting factor.
        assert_eq!(layout.window.width, 320 * 5);
        assert_eq!(layout.window.height, 200 * 5);
    }

    #[test]
    fn oversized_scale_is_capped() {
        let layout =
            compute_layout(Size::new(1920, 1080), &settings(320, 200, 100, false)).unwrap();
        assert_eq!(layout.window.width, 320 * 5);
    }

    #[test]
    fn fullscreen_letterboxes_centered() {
        let layout =
            compute_layout(Size::new(1920, 1080), &settings(320, 200, 2, true)).unwrap();
        assert_eq!(layout.window, Rect::new(0, 0, 1920, 1080));
        assert_eq!(layout.present, Rect::new((1920 - 640) / 2, (1080 - 400) / 2, 640, 400));
    }

    #[test]
    fn a_canvas_larger_than_the_display_is_rejected() {
        assert!(compute_layout(Size::new(640, 480), &settings(1000, 1000, 1, false)).is_err());
    }

    #[test]
    fn key_names_parse() {
        assert_eq!(Key::parse("a"), Some(Key::A));
        assert_eq!(Key::parse("0"), Some(Key::Digit0));
        assert_eq!(Key::parse("space"), Some(Key::Space));
        assert_eq!(Key::parse("escape"), None);
        assert_eq!(GamepadButton::parse("start"), Some(GamepadButton::Start));
        assert_eq!(CursorButton::parse("middle"), Some(CursorButton::Middle));
    }
}
