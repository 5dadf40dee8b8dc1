//! Engine core: subsystem wiring and the fixed-timestep main loop.
//!
//! Subsystems are created in dependency order (storage, configuration,
//! display, input, audio, environment, interpreter) and torn down in
//! reverse by drop order. The loop feeds fixed steps to `update`, an
//! interpolation ratio to `render`, and optionally sleeps to honor a
//! frame cap.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use log::{debug, info};

use crate::audio::{Audio, AudioSettings};
use crate::config::{Configuration, CONFIGURATION_NAME};
use crate::display::Display;
use crate::environment::Environment;
use crate::errors::EngineError;
use crate::events::{self, EngineEvent};
use crate::input::{Input, InputSettings};
use crate::platform::{VideoBackend, VideoSettings};
use crate::script::context::HostContext;
use crate::script::Interpreter;
use crate::storage::resource::ResourceKind;
use crate::storage::{Storage, StorageSettings};

const EVENTS_INITIAL_CAPACITY: usize = 8;

/// Boot options, typically parsed from the command line.
pub struct EngineOptions {
    /// Game data folder or archive.
    pub path: PathBuf,
    /// Dot-keyed configuration overrides.
    pub overrides: Vec<(String, String)>,
    /// Identity folders land under here instead of the platform user
    /// directory when set.
    pub user_root: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            overrides: Vec::new(),
            user_root: None,
        }
    }
}

pub struct Engine {
    configuration: Configuration,
    // The interpreter comes first so script finalizers run while the
    // subsystems below are still alive.
    interpreter: Interpreter,
    storage: Rc<RefCell<Storage>>,
    display: Rc<RefCell<Display>>,
    input: Rc<RefCell<Input>>,
    audio: Rc<RefCell<Audio>>,
    environment: Rc<RefCell<Environment>>,
}

impl Engine {
    pub fn new(options: &EngineOptions) -> Result<Self, EngineError> {
        let mut storage = Storage::new(&StorageSettings {
            path: options.path.clone(),
            user_root: options.user_root.clone(),
        })?;
        info!("storage ready");

        let configuration = Self::configure(&mut storage, options)?;
        info!("configuration ready");

        storage.set_identity(&configuration.system.identity)?;
        debug!("identity set to `{}`", configuration.system.identity);

        let icon = match configuration.system.icon.as_str() {
            "" => None,
            name => {
                let resource = storage.load(name, ResourceKind::Image)?;
                let (width, height, pixels) = resource.as_image().ok_or_else(|| {
                    EngineError::decode(name, "icon asset is not an image")
                })?;
                Some((width, height, pixels.to_vec()))
            }
        };
        let effect = match configuration.display.effect.as_str() {
            "" => None,
            name => Some(
                storage
                    .load(name, ResourceKind::String)?
                    .as_string()
                    .ok_or_else(|| EngineError::decode(name, "effect asset is not a string"))?
                    .to_string(),
            ),
        };
        let mappings = match configuration.system.mappings.as_str() {
            "" => None,
            name => Some(
                storage
                    .load(name, ResourceKind::String)?
                    .as_string()
                    .ok_or_else(|| {
                        EngineError::decode(name, "mappings asset is not a string")
                    })?
                    .to_string(),
            ),
        };

        let mut backend = Self::open_backend(&VideoSettings {
            title: configuration.display.title.clone(),
            width: configuration.display.width,
            height: configuration.display.height,
            scale: configuration.display.scale,
            fullscreen: configuration.display.fullscreen,
            vertical_sync: configuration.display.vertical_sync,
            effect,
            icon,
            hide_cursor: configuration.cursor.hide,
        })?;
        info!("display backend ready");

        let input = Input::new(
            &InputSettings {
                mappings,
                exit_key: configuration.keyboard.exit_key,
                cursor_enabled: configuration.cursor.enabled,
                cursor_speed: configuration.cursor.speed,
                inner_deadzone: configuration.controller.inner_deadzone,
                outer_deadzone: configuration.controller.outer_deadzone,
                emulate_controllers: true,
            },
            backend.as_mut(),
        )?;
        info!("input ready");

        let display = Display::new(backend);
        info!("display ready");

        let audio = Audio::new(&AudioSettings {
            device_index: usize::try_from(configuration.audio.device_index).ok(),
            master_volume: configuration.audio.master_volume,
        })?;
        info!("audio ready");

        let environment = Environment::new();
        info!("environment ready");

        let storage = Rc::new(RefCell::new(storage));
        let display = Rc::new(RefCell::new(display));
        let input = Rc::new(RefCell::new(input));
        let audio = Rc::new(RefCell::new(audio));
        let environment = Rc::new(RefCell::new(environment));

        let interpreter = Interpreter::new(
            HostContext {
                storage: storage.clone(),
                display: display.clone(),
                input: input.clone(),
                audio: audio.clone(),
                environment: environment.clone(),
            },
            configuration.engine.gc_mode,
        )?;
        info!("interpreter ready");

        info!("engine is up and running");
        Ok(Self {
            configuration,
            interpreter,
            storage,
            display,
            input,
            audio,
            environment,
        })
    }

    fn configure(
        storage: &mut Storage,
        options: &EngineOptions,
    ) -> Result<Configuration, EngineError> {
        let resource = storage.load(CONFIGURATION_NAME, ResourceKind::String)?;
        let text = resource
            .as_string()
            .ok_or_else(|| EngineError::Config("configuration is not a string".into()))?;

        let mut configuration = Configuration::parse(text);
        for (key, value) in &options.overrides {
            configuration.apply(key, value);
        }
        configuration.validate()?;

        info!("game identity is `{}`", configuration.system.identity);
        Ok(configuration)
    }

    #[cfg(feature = "backend_glfw")]
    fn open_backend(settings: &VideoSettings) -> Result<Box<dyn VideoBackend>, EngineError> {
        Ok(Box::new(crate::platform::glfw::GlfwBackend::new(settings)?))
    }

    #[cfg(not(feature = "backend_glfw"))]
    fn open_backend(settings: &VideoSettings) -> Result<Box<dyn VideoBackend>, EngineError> {
        Ok(Box::new(crate::platform::headless::HeadlessBackend::new(
            settings,
        )?))
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Boot the scripting side and run the main loop to completion.
    pub fn run(&mut self) -> Result<(), EngineError> {
        self.interpreter.boot()?;

        let delta_time = 1.0 / self.configuration.engine.frames_per_second as f64;
        let skippable_frames = self.configuration.engine.skippable_frames;
        let reference_time = match self.configuration.engine.frames_limit {
            0 => 0.0,
            limit => 1.0 / limit as f64,
        };
        info!(
            "now running, update-time is {delta_time:.6}s w/ {skippable_frames} skippable frames, reference-time is {reference_time:.6}s"
        );

        let mut events: Vec<EngineEvent> = Vec::with_capacity(EVENTS_INITIAL_CAPACITY);
        let mut previous = self.display.borrow().backend().time();
        let mut lag = 0.0f64;

        let quit_on_close = self.configuration.system.quit_on_close;
        let mut running = true;
        while running && !(quit_on_close && self.display.borrow().should_close()) {
            let current = self.display.borrow().backend().time();
            let elapsed = current - previous;
            previous = current;

            {
                let mut display = self.display.borrow_mut();
                display.backend_mut().poll_events();

                let focused = display.backend().is_focused();
                let mut input = self.input.borrow_mut();
                input.process(display.backend_mut());
                self.environment.borrow_mut().process(
                    elapsed,
                    focused,
                    input.controllers_count(),
                );
            }

            events::synthesize(self.environment.borrow().state(), &mut events);
            running = running && self.interpreter.process(&events);

            // Cap the catch-up iterations so slow machines don't stall.
            lag += elapsed;
            let mut frames = skippable_frames;
            while frames > 0 && lag >= delta_time {
                running = running && self.environment.borrow_mut().update(delta_time);
                {
                    // Input first, it is read by the interpreter step.
                    let mut display = self.display.borrow_mut();
                    running = running
                        && self.input.borrow_mut().update(delta_time, display.backend_mut());
                }
                running = running && self.display.borrow_mut().update(delta_time);
                running = running && self.interpreter.update(delta_time);
                running = running && self.audio.borrow_mut().update(delta_time);
                running = running && self.storage.borrow_mut().update(delta_time);
                lag -= delta_time;
                frames -= 1;
            }

            running = running && self.interpreter.render(lag / delta_time);

            self.display.borrow_mut().present()?;

            if reference_time > 0.0 {
                let frame_time = self.display.borrow().backend().time() - current;
                let leftover = reference_time - frame_time;
                if leftover > 0.0 {
                    std::thread::sleep(Duration::from_secs_f64(leftover));
                }
            }
        }

        info!("engine loop is over");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn game_folder(boot: &str, config: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join(CONFIGURATION_NAME)).unwrap();
        file.write_all(config.as_bytes()).unwrap();
        let mut file = std::fs::File::create(dir.path().join("boot.lua")).unwrap();
        file.write_all(boot.as_bytes()).unwrap();
        dir
    }

    const CONFIG: &str = r#"
[system]
identity = engine-test

[display]
width = 320
height = 200
scale = 2

[engine]
frames-per-second = 60
frames-limit = 0
"#;

    // Runs a handful of frames, painting the canvas, then quits.
    const BOOT: &str = r#"
local Canvas = require("miso.graphics.canvas")
local Display = require("miso.graphics.display")
local Palette = require("miso.graphics.palette")

local Game = {}
Game.__index = Game

function Game.process(self, events) end

function Game.update(self, delta_time)
    self.frames = (self.frames or 0) + 1
    if self.frames >= 3 then
        return false
    end
end

function Game.render(self, _)
    local palette = Palette.new(256)
    Display.palette(palette)
    local canvas = Canvas.new()
    canvas:clear(5)
end

return setmetatable({}, Game)
"#;

    fn engine_for(dir: &tempfile::TempDir) -> Engine {
        let options = EngineOptions {
            path: dir.path().to_path_buf(),
            overrides: Vec::new(),
            // Route the identity folder into the sandbox.
            user_root: Some(dir.path().join("user")),
        };
        Engine::new(&options).unwrap()
    }

    #[test]
    fn boot_and_clear_reaches_the_first_framebuffer_pixel() {
        let dir = game_folder(BOOT, CONFIG);
        let mut engine = engine_for(&dir);
        engine.run().unwrap();

        let display = engine.display.borrow();
        let backend = display
            .backend()
            .as_any()
            .downcast_ref::<crate::platform::headless::HeadlessBackend>()
            .unwrap();
        let (width, height, pixels) = backend.last_frame().unwrap();
        assert_eq!((width, height), (320, 200));
        // Palette.new(256) is the greyscale ramp: index 5 is (5, 5, 5).
        assert_eq!(&pixels[0..4], &[5, 5, 5, 255]);
        assert!(backend.presented_frames() >= 1);
    }

    #[test]
    fn a_missing_configuration_aborts_the_boot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("boot.lua")).unwrap();
        let options = EngineOptions {
            path: dir.path().to_path_buf(),
            ..EngineOptions::default()
        };
        assert!(matches!(
            Engine::new(&options),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn a_version_requirement_from_the_future_aborts_the_boot() {
        let dir = game_folder(BOOT, "[system]\nversion = 99.0.0\n");
        let options = EngineOptions {
            path: dir.path().to_path_buf(),
            ..EngineOptions::default()
        };
        assert!(matches!(
            Engine::new(&options),
            Err(EngineError::VersionMismatch { .. })
        ));
    }
}
