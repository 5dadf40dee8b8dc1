//! The scripting host: a Lua 5.4 VM with the engine subsystems bound as
//! preloaded modules, a storage-backed module searcher and the
//! process/update/render lifecycle dispatch.

use log::{debug, error, info};
use mlua::{Function, Lua, RegistryKey, Table, Value};

use crate::config::GcMode;
use crate::errors::EngineError;
use crate::events::EngineEvent;
use crate::script::context::HostContext;

pub mod context;
pub mod modules;

mod core;
mod generators;
mod graphics;
mod input;
mod io;
mod physics;
mod sound;
mod util;

/// The boot module; `require`d to obtain the game object.
const KICKSTART: &str = "return require(\"boot\")";

/// Seconds between full collections in periodic mode.
const GC_COLLECTION_PERIOD: f64 = 15.0;

/// Seconds between incremental steps in continuous mode.
const GC_CONTINUOUS_STEP_PERIOD: f64 = 0.1;

struct Game {
    object: RegistryKey,
    process: RegistryKey,
    update: RegistryKey,
    render: RegistryKey,
}

pub struct Interpreter {
    lua: Lua,
    game: Option<Game>,
    gc_mode: GcMode,
    gc_age: f64,
}

impl Interpreter {
    pub fn new(context: HostContext, gc_mode: GcMode) -> Result<Self, EngineError> {
        let lua = Lua::new();
        info!("Lua: {}", lua.globals().get::<String>("_VERSION")?);

        lua.set_app_data(context);

        if gc_mode != GcMode::Automatic {
            // Collection is driven explicitly by the update phase.
            lua.gc_stop();
        }

        Self::install_searcher(&lua)?;
        modules::register_all(&lua)?;
        debug!("interpreter VM ready, modules registered");

        Ok(Self {
            lua,
            game: None,
            gc_mode,
            gc_age: 0.0,
        })
    }

    /// A `package.searchers` entry translating `a.b.c` into `a/b/c.lua`
    /// read through the storage mounts. Source and pre-compiled chunks are
    /// both accepted.
    fn install_searcher(lua: &Lua) -> Result<(), EngineError> {
        let searcher = lua.create_function(|lua, name: String| {
            let path = format!("{}.lua", name.replace('.', "/"));
            let data = {
                let context = context::host(lua)?;
                let storage = context.storage.borrow();
                match storage.open(&path) {
                    Ok(mut handle) => handle
                        .as_mut()
                        .read_to_end()
                        .map_err(mlua::Error::external)?,
                    Err(_) => {
                        let message =
                            format!("no file `{path}` in any of the storage mounts");
                        return Ok((Value::String(lua.create_string(&message)?), Value::Nil));
                    }
                }
            };
            let chunk = lua
                .load(data.as_slice())
                .set_name(format!("@{path}"))
                .into_function()?;
            Ok((
                Value::Function(chunk),
                Value::String(lua.create_string(&path)?),
            ))
        })?;

        let package: Table = lua.globals().get("package")?;
        let searchers: Table = package.get("searchers")?;
        searchers.raw_insert(2, searcher)?;
        Ok(())
    }

    /// Load the boot script and detect the entry points. All three are
    /// mandatory.
    pub fn boot(&mut self) -> Result<(), EngineError> {
        let object: Table = self
            .lua
            .load(KICKSTART)
            .set_name("=kickstart")
            .eval()
            .map_err(|error| {
                error!("can't load the boot script: {error}");
                EngineError::from(error)
            })?;

        let mut entry_points = Vec::with_capacity(3);
        for name in ["process", "update", "render"] {
            let method: Value = object.get(name)?;
            let Value::Function(function) = method else {
                error!("mandatory method `{name}` is missing");
                return Err(EngineError::Config(format!(
                    "boot object lacks the `{name}` method"
                )));
            };
            debug!("method `{name}` found");
            entry_points.push(self.lua.create_registry_value(function)?);
        }

        let render = entry_points.pop().unwrap();
        let update = entry_points.pop().unwrap();
        let process = entry_points.pop().unwrap();
        self.game = Some(Game {
            object: self.lua.create_registry_value(object)?,
            process,
            update,
            render,
        });
        debug!("entry-points detected");
        Ok(())
    }

    fn call(&self, method: &RegistryKey, arguments: impl mlua::IntoLuaMulti) -> Option<Value> {
        let game = self.game.as_ref()?;
        let function: Function = self.lua.registry_value(method).ok()?;
        let object: Table = self.lua.registry_value(&game.object).ok()?;

        let Ok(mut values) = arguments.into_lua_multi(&self.lua) else {
            return None;
        };
        values.push_front(Value::Table(object));

        match function.call::<Value>(values) {
            Ok(value) => Some(value),
            Err(error) => {
                error!("error in script callback: {error}");
                None
            }
        }
    }

    /// Dispatch the synthesized events; side effects only.
    pub fn process(&mut self, events: &[EngineEvent]) -> bool {
        let Some(game) = self.game.as_ref() else {
            return false;
        };
        let Ok(list) = self.lua.create_table() else {
            return false;
        };
        for (index, event) in events.iter().enumerate() {
            if list.set(index + 1, event.name()).is_err() {
                return false;
            }
        }
        self.call(&game.process, list).is_some()
    }

    /// Fixed-step update; the script may return `false` to stop the loop.
    pub fn update(&mut self, delta_time: f64) -> bool {
        let game = self.game.as_ref().map(|game| &game.update);
        let result = match game {
            Some(method) => self.call(method, delta_time),
            None => return false,
        };
        let Some(value) = result else {
            return false;
        };

        self.collect_garbage(delta_time);

        !matches!(value, Value::Boolean(false))
    }

    /// Render with the interpolation ratio `lag / fixed_dt`.
    pub fn render(&mut self, ratio: f64) -> bool {
        let game = self.game.as_ref().map(|game| &game.render);
        match game {
            Some(method) => self.call(method, ratio).is_some(),
            None => false,
        }
    }

    fn collect_garbage(&mut self, delta_time: f64) {
        match self.gc_mode {
            GcMode::Automatic => {}
            GcMode::Continuous => {
                self.gc_age += delta_time;
                while self.gc_age >= GC_CONTINUOUS_STEP_PERIOD {
                    self.gc_age -= GC_CONTINUOUS_STEP_PERIOD;
                    let _ = self.lua.gc_step();
                }
            }
            GcMode::Periodic => {
                self.gc_age += delta_time;
                while self.gc_age >= GC_COLLECTION_PERIOD {
                    self.gc_age -= GC_COLLECTION_PERIOD;
                    let used = self.lua.used_memory();
                    if self.lua.gc_collect().is_ok() {
                        debug!(
                            "periodic collection, {} -> {} byte(s) in use",
                            used,
                            self.lua.used_memory()
                        );
                    }
                }
            }
        }
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        // Release the game object first so finalizers run while the
        // subsystems are still alive.
        self.game.take();
        let _ = self.lua.gc_collect();
        debug!("interpreter VM garbage-collected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{Audio, AudioSettings};
    use crate::display::Display;
    use crate::environment::Environment;
    use crate::input::{Input, InputSettings};
    use crate::platform::headless::HeadlessBackend;
    use crate::platform::VideoSettings;
    use crate::storage::{Storage, StorageSettings};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn fixture(boot: &str) -> (tempfile::TempDir, HostContext) {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("boot.lua"), boot).unwrap();

        let storage = Storage::new(&StorageSettings {
            path: data,
            user_root: Some(dir.path().join("user")),
        })
        .unwrap();

        let mut backend = HeadlessBackend::new(&VideoSettings {
            width: 64,
            height: 64,
            scale: 1,
            ..VideoSettings::default()
        })
        .unwrap();
        let input = Input::new(&InputSettings::default(), &mut backend).unwrap();
        let display = Display::new(Box::new(backend));

        let context = HostContext {
            storage: Rc::new(RefCell::new(storage)),
            display: Rc::new(RefCell::new(display)),
            input: Rc::new(RefCell::new(input)),
            audio: Rc::new(RefCell::new(Audio::new(&AudioSettings::default()).unwrap())),
            environment: Rc::new(RefCell::new(Environment::new())),
        };
        (dir, context)
    }

    const MINIMAL_BOOT: &str = r#"
local Game = {}
Game.__index = Game

function Game.process(self, events)
    self.events = events
end

function Game.update(self, delta_time)
    self.elapsed = (self.elapsed or 0) + delta_time
    if self.elapsed > 1.0 then
        return false
    end
end

function Game.render(self, ratio)
    self.ratio = ratio
end

return setmetatable({}, Game)
"#;

    #[test]
    fn boot_detects_the_entry_points() {
        let (_dir, context) = fixture(MINIMAL_BOOT);
        let mut interpreter = Interpreter::new(context, GcMode::Continuous).unwrap();
        interpreter.boot().unwrap();

        assert!(interpreter.process(&[EngineEvent::FocusAcquired]));
        assert!(interpreter.update(0.5));
        assert!(interpreter.render(0.25));
        // The scripted stop condition: updates past one second return false.
        assert!(!interpreter.update(0.7));
    }

    #[test]
    fn boot_fails_without_mandatory_methods() {
        let (_dir, context) = fixture("return { process = function() end }");
        let mut interpreter = Interpreter::new(context, GcMode::Automatic).unwrap();
        assert!(interpreter.boot().is_err());
    }

    #[test]
    fn boot_fails_when_the_script_is_missing() {
        let (_dir, context) = fixture(MINIMAL_BOOT);
        {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir_all(dir.path().join("empty")).unwrap();
            let storage = Storage::new(&StorageSettings {
                path: dir.path().join("empty"),
                user_root: None,
            })
            .unwrap();
            *context.storage.borrow_mut() = storage;
        }
        let mut interpreter = Interpreter::new(context, GcMode::Automatic).unwrap();
        assert!(interpreter.boot().is_err());
    }

    #[test]
    fn scripts_reach_the_subsystem_modules() {
        let boot = r#"
local Canvas = require("miso.graphics.canvas")
local Grid = require("miso.util.grid")

local Game = {}
Game.__index = Game

function Game.process(self) end

function Game.update(self, _)
    local grid = Grid.new(2, 2, { 1.0 })
    assert(grid:peek(0, 0) == 1.0)
end

function Game.render(self, _)
    local canvas = Canvas.new()
    canvas:clear(5)
end

return setmetatable({}, Game)
"#;
        let (_dir, context) = fixture(boot);
        let display = context.display.clone();
        let mut interpreter = Interpreter::new(context, GcMode::Continuous).unwrap();
        interpreter.boot().unwrap();

        assert!(interpreter.update(0.016));
        assert!(interpreter.render(0.0));
        let screen = display.borrow().surface();
        assert!(screen.borrow().data().iter().all(|&pixel| pixel == 5));
    }

    #[test]
    fn script_errors_are_caught_at_the_boundary() {
        let boot = r#"
return {
    process = function() end,
    update = function() error("boom") end,
    render = function() end,
}
"#;
        let (_dir, context) = fixture(boot);
        let mut interpreter = Interpreter::new(context, GcMode::Automatic).unwrap();
        interpreter.boot().unwrap();
        assert!(!interpreter.update(0.016));
    }

    #[test]
    fn modules_load_through_the_searcher() {
        let boot = r#"
local helper = require("helpers.double")
return {
    process = function() end,
    update = function(self, _) assert(helper(21) == 42) end,
    render = function() end,
}
"#;
        let (dir, context) = fixture(boot);
        let helpers = dir.path().join("data/helpers");
        std::fs::create_dir_all(&helpers).unwrap();
        std::fs::write(
            helpers.join("double.lua"),
            "return function(x) return x * 2 end",
        )
        .unwrap();

        let mut interpreter = Interpreter::new(context, GcMode::Automatic).unwrap();
        interpreter.boot().unwrap();
        assert!(interpreter.update(0.016));
    }
}
