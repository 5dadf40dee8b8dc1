//! The windowed backend: a GLFW window with an OpenGL 2.1 context, the
//! canvas presented as a texture through a fullscreen quad and the
//! fragment-effect shader.

use std::ffi::CString;

use glfw::Context as _;
use log::{debug, info};

use crate::errors::EngineError;
use crate::graphics::Size;
use crate::platform::{
    compute_layout, CursorButton, Frame, GamepadState, Key, VideoBackend, VideoLayout,
    VideoSettings, GAMEPAD_BUTTON_COUNT,
};

const VERTEX_SHADER: &str = "\
#version 120

attribute vec2 a_position;
attribute vec2 a_texture_coords;

varying vec2 v_texture_coords;

void main()
{
    gl_Position = vec4(a_position, 0.0, 1.0);
    v_texture_coords = a_texture_coords;
}
";

const FRAGMENT_SHADER: &str = "\
#version 120

uniform sampler2D u_texture0;
uniform vec2 u_texture_size;
uniform vec2 u_screen_size;
uniform vec2 u_screen_scale;
uniform float u_time;

varying vec2 v_texture_coords;

vec4 effect(vec4 color, sampler2D texture, vec2 texture_coords, vec2 screen_coords);

void main()
{
    gl_FragColor = effect(vec4(1.0), u_texture0, v_texture_coords, gl_FragCoord.xy);
}
";

const EFFECT_PASSTHRU: &str = "\
vec4 effect(vec4 color, sampler2D texture, vec2 texture_coords, vec2 screen_coords) {
    return texture2D(texture, texture_coords) * color;
}
";

const JOYSTICK_IDS: [glfw::JoystickId; 16] = [
    glfw::JoystickId::Joystick1,
    glfw::JoystickId::Joystick2,
    glfw::JoystickId::Joystick3,
    glfw::JoystickId::Joystick4,
    glfw::JoystickId::Joystick5,
    glfw::JoystickId::Joystick6,
    glfw::JoystickId::Joystick7,
    glfw::JoystickId::Joystick8,
    glfw::JoystickId::Joystick9,
    glfw::JoystickId::Joystick10,
    glfw::JoystickId::Joystick11,
    glfw::JoystickId::Joystick12,
    glfw::JoystickId::Joystick13,
    glfw::JoystickId::Joystick14,
    glfw::JoystickId::Joystick15,
    glfw::JoystickId::Joystick16,
];

fn key_of(key: Key) -> glfw::Key {
    use glfw::Key as G;
    match key {
        Key::Digit1 => G::Num1,
        Key::Digit2 => G::Num2,
        Key::Digit3 => G::Num3,
        Key::Digit4 => G::Num4,
        Key::Digit5 => G::Num5,
        Key::Digit6 => G::Num6,
        Key::Digit7 => G::Num7,
        Key::Digit8 => G::Num8,
        Key::Digit9 => G::Num9,
        Key::Digit0 => G::Num0,
        Key::Q => G::Q,
        Key::W => G::W,
        Key::E => G::E,
        Key::R => G::R,
        Key::T => G::T,
        Key::Y => G::Y,
        Key::U => G::U,
        Key::I => G::I,
        Key::O => G::O,
        Key::P => G::P,
        Key::A => G::A,
        Key::S => G::S,
        Key::D => G::D,
        Key::F => G::F,
        Key::G => G::G,
        Key::H => G::H,
        Key::J => G::J,
        Key::K => G::K,
        Key::L => G::L,
        Key::Z => G::Z,
        Key::X => G::X,
        Key::C => G::C,
        Key::V => G::V,
        Key::B => G::B,
        Key::N => G::N,
        Key::M => G::M,
        Key::Up => G::Up,
        Key::Down => G::Down,
        Key::Left => G::Left,
        Key::Right => G::Right,
        Key::Enter => G::Enter,
        Key::Space => G::Space,
    }
}

const GAMEPAD_BUTTONS: [glfw::GamepadButton; GAMEPAD_BUTTON_COUNT] = [
    glfw::GamepadButton::ButtonDpadUp,
    glfw::GamepadButton::ButtonDpadDown,
    glfw::GamepadButton::ButtonDpadLeft,
    glfw::GamepadButton::ButtonDpadRight,
    glfw::GamepadButton::ButtonLeftBumper,
    glfw::GamepadButton::ButtonRightBumper,
    glfw::GamepadButton::ButtonLeftThumb,
    glfw::GamepadButton::ButtonRightThumb,
    glfw::GamepadButton::ButtonTriangle, // Y
    glfw::GamepadButton::ButtonSquare,   // X
    glfw::GamepadButton::ButtonCircle,   // B
    glfw::GamepadButton::ButtonCross,    // A
    glfw::GamepadButton::ButtonBack,
    glfw::GamepadButton::ButtonStart,
];

const GAMEPAD_AXES: [glfw::GamepadAxis; 6] = [
    glfw::GamepadAxis::AxisLeftX,
    glfw::GamepadAxis::AxisLeftY,
    glfw::GamepadAxis::AxisRightX,
    glfw::GamepadAxis::AxisRightY,
    glfw::GamepadAxis::AxisLeftTrigger,
    glfw::GamepadAxis::AxisRightTrigger,
];

pub struct GlfwBackend {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    // Kept alive for the window's lifetime even though we poll.
    _events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    layout: VideoLayout,
    texture: u32,
    vbo: u32,
    program: u32,
    uniform_time: i32,
}

impl GlfwBackend {
    pub fn new(settings: &VideoSettings) -> Result<Self, EngineError> {
        let mut glfw = glfw::init_no_callbacks()
            .map_err(|e| EngineError::Platform(format!("can't initialize GLFW: {e}")))?;
        debug!("GLFW initialized");

        let display = glfw.with_primary_monitor(|_, monitor| {
            monitor.map(|monitor| {
                let (_, _, width, height) = monitor.get_workarea();
                Size::new(width as u32, height as u32)
            })
        });
        let display = display
            .ok_or_else(|| EngineError::Platform("no primary monitor".into()))?;
        debug!("display size is {}x{}", display.width, display.height);

        let layout = compute_layout(display, settings)?;

        glfw.window_hint(glfw::WindowHint::ContextVersion(2, 1));
        glfw.window_hint(glfw::WindowHint::Resizable(false));
        glfw.window_hint(glfw::WindowHint::Decorated(true));
        glfw.window_hint(glfw::WindowHint::Focused(true));
        glfw.window_hint(glfw::WindowHint::Visible(false));

        let created = glfw.with_primary_monitor(|glfw, monitor| {
            let mode = match (settings.fullscreen, monitor) {
                (true, Some(monitor)) => glfw::WindowMode::FullScreen(monitor),
                _ => glfw::WindowMode::Windowed,
            };
            glfw.create_window(
                layout.window.width,
                layout.window.height,
                &settings.title,
                mode,
            )
        });
        let (mut window, events) = created
            .ok_or_else(|| EngineError::Platform("can't create the window".into()))?;

        window.make_current();
        gl::load_with(|symbol| window.get_proc_address(symbol) as *const _);
        debug!("window created and GL entry points loaded");

        if let Some((width, height, pixels)) = &settings.icon {
            let packed = pixels
                .chunks_exact(4)
                .map(|rgba| {
                    (rgba[0] as u32)
                        | (rgba[1] as u32) << 8
                        | (rgba[2] as u32) << 16
                        | (rgba[3] as u32) << 24
                })
                .collect();
            window.set_icon_from_pixels(vec![glfw::PixelImage {
                width: *width,
                height: *height,
                pixels: packed,
            }]);
        }

        window.set_cursor_mode(if settings.hide_cursor {
            glfw::CursorMode::Hidden
        } else {
            glfw::CursorMode::Normal
        });

        glfw.set_swap_interval(if settings.vertical_sync {
            glfw::SwapInterval::Sync(1)
        } else {
            glfw::SwapInterval::None
        });

        if !settings.fullscreen {
            window.set_pos(layout.window.x, layout.window.y);
        }
        window.show();

        let canvas = layout.canvas;
        let (texture, vbo, program, uniform_time) = unsafe {
            Self::initialize_gl(&layout, settings.effect.as_deref(), canvas)?
        };

        info!("GLFW: {}", glfw::get_version_string());

        Ok(Self {
            glfw,
            window,
            _events: events,
            layout,
            texture,
            vbo,
            program,
            uniform_time,
        })
    }

    unsafe fn initialize_gl(
        layout: &VideoLayout,
        effect: Option<&str>,
        canvas: Size,
    ) -> Result<(u32, u32, u32, i32), EngineError> {
        gl::Viewport(
            0,
            0,
            layout.window.width as i32,
            layout.window.height as i32,
        );
        gl::Disable(gl::DEPTH_TEST);
        gl::Disable(gl::STENCIL_TEST);
        gl::Disable(gl::BLEND);
        gl::ClearColor(0.0, 0.0, 0.0, 1.0);

        // The canvas texture: nearest filtering, no mip-mapping.
        let mut texture = 0;
        gl::GenTextures(1, &mut texture);
        if texture == 0 {
            return Err(EngineError::Platform("can't allocate the canvas texture".into()));
        }
        gl::BindTexture(gl::TEXTURE_2D, texture);
        gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as i32);
        gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as i32);
        gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::NEAREST as i32);
        gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::NEAREST as i32);
        gl::TexImage2D(
            gl::TEXTURE_2D,
            0,
            gl::RGBA as i32,
            canvas.width as i32,
            canvas.height as i32,
            0,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
            std::ptr::null(),
        );

        let mut vbo = 0;
        gl::GenBuffers(1, &mut vbo);
        gl::BindBuffer(gl::ARRAY_BUFFER, vbo);

        let fragment = {
            let mut code = String::from(FRAGMENT_SHADER);
            code.push_str(effect.unwrap_or(EFFECT_PASSTHRU));
            code
        };
        let program = Self::link_program(VERTEX_SHADER, &fragment)?;
        gl::UseProgram(program);

        let uniform = |name: &str| -> i32 {
            let name = CString::new(name).unwrap();
            gl::GetUniformLocation(program, name.as_ptr())
        };
        gl::Uniform1i(uniform("u_texture0"), 0);
        gl::Uniform2f(
            uniform("u_texture_size"),
            canvas.width as f32,
            canvas.height as f32,
        );
        gl::Uniform2f(
            uniform("u_screen_size"),
            layout.present.width as f32,
            layout.present.height as f32,
        );
        gl::Uniform2f(
            uniform("u_screen_scale"),
            layout.present.width as f32 / canvas.width as f32,
            layout.present.height as f32 / canvas.height as f32,
        );
        let uniform_time = uniform("u_time");

        let position = {
            let name = CString::new("a_position").unwrap();
            gl::GetAttribLocation(program, name.as_ptr())
        };
        let texture_coords = {
            let name = CString::new("a_texture_coords").unwrap();
            gl::GetAttribLocation(program, name.as_ptr())
        };
        gl::EnableVertexAttribArray(position as u32);
        gl::EnableVertexAttribArray(texture_coords as u32);
        let stride = (4 * std::mem::size_of::<f32>()) as i32;
        gl::VertexAttribPointer(
            position as u32,
            2,
            gl::FLOAT,
            gl::FALSE,
            stride,
            std::ptr::null(),
        );
        gl::VertexAttribPointer(
            texture_coords as u32,
            2,
            gl::FLOAT,
            gl::FALSE,
            stride,
            (2 * std::mem::size_of::<f32>()) as *const _,
        );

        Ok((texture, vbo, program, uniform_time))
    }

    unsafe fn compile_shader(kind: u32, source: &str) -> Result<u32, EngineError> {
        let shader = gl::CreateShader(kind);
        let source = CString::new(source)
            .map_err(|e| EngineError::Platform(format!("malformed shader source: {e}")))?;
        gl::ShaderSource(shader, 1, &source.as_ptr(), std::ptr::null());
        gl::CompileShader(shader);

        let mut status = 0;
        gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut status);
        if status == 0 {
            let mut length = 0;
            gl::GetShaderiv(shader, gl::INFO_LOG_LENGTH, &mut length);
            let mut buffer = vec![0u8; length.max(1) as usize];
            gl::GetShaderInfoLog(
                shader,
                length,
                std::ptr::null_mut(),
                buffer.as_mut_ptr() as *mut _,
            );
            gl::DeleteShader(shader);
            return Err(EngineError::Platform(format!(
                "shader compilation failed: {}",
                String::from_utf8_lossy(&buffer)
            )));
        }
        Ok(shader)
    }

    unsafe fn link_program(vertex: &str, fragment: &str) -> Result<u32, EngineError> {
        let vertex = Self::compile_shader(gl::VERTEX_SHADER, vertex)?;
        let fragment = Self::compile_shader(gl::FRAGMENT_SHADER, fragment)?;

        let program = gl::CreateProgram();
        gl::AttachShader(program, vertex);
        gl::AttachShader(program, fragment);
        gl::LinkProgram(program);
        gl::DeleteShader(vertex);
        gl::DeleteShader(fragment);

        let mut status = 0;
        gl::GetProgramiv(program, gl::LINK_STATUS, &mut status);
        if status == 0 {
            let mut length = 0;
            gl::GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut length);
            let mut buffer = vec![0u8; length.max(1) as usize];
            gl::GetProgramInfoLog(
                program,
                length,
                std::ptr::null_mut(),
                buffer.as_mut_ptr() as *mut _,
            );
            gl::DeleteProgram(program);
            return Err(EngineError::Platform(format!(
                "shader linking failed: {}",
                String::from_utf8_lossy(&buffer)
            )));
        }
        Ok(program)
    }
}

impl Drop for GlfwBackend {
    fn drop(&mut self) {
        unsafe {
            gl::DeleteProgram(self.program);
            gl::DeleteBuffers(1, &self.vbo);
            gl::DeleteTextures(1, &self.texture);
        }
    }
}

impl VideoBackend for GlfwBackend {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn layout(&self) -> VideoLayout {
        self.layout
    }

    fn poll_events(&mut self) {
        self.glfw.poll_events();
    }

    fn should_close(&self) -> bool {
        self.window.should_close()
    }

    fn request_close(&mut self) {
        self.window.set_should_close(true);
    }

    fn is_focused(&self) -> bool {
        self.window.is_focused()
    }

    fn is_key_down(&self, key: Key) -> bool {
        self.window.get_key(key_of(key)) == glfw::Action::Press
    }

    fn is_exit_key_down(&self) -> bool {
        self.window.get_key(glfw::Key::Escape) == glfw::Action::Press
    }

    fn is_mouse_button_down(&self, button: CursorButton) -> bool {
        let button = match button {
            CursorButton::Left => glfw::MouseButton::Button1,
            CursorButton::Right => glfw::MouseButton::Button2,
            CursorButton::Middle => glfw::MouseButton::Button3,
        };
        self.window.get_mouse_button(button) == glfw::Action::Press
    }

    fn mouse_position(&self) -> (f64, f64) {
        self.window.get_cursor_pos()
    }

    fn has_mouse(&self) -> bool {
        true
    }

    fn is_joystick_gamepad(&mut self, jid: usize) -> bool {
        let Some(&id) = JOYSTICK_IDS.get(jid) else {
            return false;
        };
        let joystick = self.glfw.get_joystick(id);
        joystick.is_present() && joystick.is_gamepad()
    }

    fn gamepad_state(&mut self, jid: usize) -> Option<GamepadState> {
        let &id = JOYSTICK_IDS.get(jid)?;
        let joystick = self.glfw.get_joystick(id);
        if !joystick.is_present() {
            return None;
        }
        let gamepad = joystick.get_gamepad_state()?;

        let mut state = GamepadState::default();
        for (slot, button) in GAMEPAD_BUTTONS.iter().enumerate() {
            state.buttons[slot] = gamepad.get_button_state(*button) == glfw::Action::Press;
        }
        for (slot, axis) in GAMEPAD_AXES.iter().enumerate() {
            state.axes[slot] = gamepad.get_axis(*axis);
        }
        Some(state)
    }

    fn update_gamepad_mappings(&mut self, mappings: &str) -> bool {
        self.glfw.update_gamepad_mappings(mappings)
    }

    fn present(&mut self, frame: &Frame) -> Result<(), EngineError> {
        let destination = {
            let mut rect = self.layout.present;
            rect.x += frame.offset.x;
            rect.y += frame.offset.y;
            rect
        };
        let window = self.layout.window;

        // Window coordinates (top-left origin) to normalized device ones.
        let ndc_x = |x: i32| 2.0 * x as f32 / window.width as f32 - 1.0;
        let ndc_y = |y: i32| 1.0 - 2.0 * y as f32 / window.height as f32;
        let x0 = ndc_x(destination.x);
        let y0 = ndc_y(destination.y);
        let x1 = ndc_x(destination.right());
        let y1 = ndc_y(destination.bottom());

        let vertices: [f32; 16] = [
            x0, y0, 0.0, 0.0, // Top-left.
            x0, y1, 0.0, 1.0, // Bottom-left.
            x1, y0, 1.0, 0.0, // Top-right.
            x1, y1, 1.0, 1.0, // Bottom-right.
        ];

        unsafe {
            gl::Clear(gl::COLOR_BUFFER_BIT);

            gl::TexSubImage2D(
                gl::TEXTURE_2D,
                0,
                0,
                0,
                frame.width as i32,
                frame.height as i32,
                gl::RGBA,
                gl::UNSIGNED_BYTE,
                frame.pixels.as_ptr() as *const _,
            );

            gl::Uniform1f(self.uniform_time, frame.time);

            gl::BufferData(
                gl::ARRAY_BUFFER,
                std::mem::size_of_val(&vertices) as isize,
                vertices.as_ptr() as *const _,
                gl::STREAM_DRAW,
            );
            gl::DrawArrays(gl::TRIANGLE_STRIP, 0, 4);
        }

        self.window.swap_buffers();
        Ok(())
    }

    fn time(&self) -> f64 {
        self.glfw.get_time()
    }
}
