//! The `miso.input.*` modules: keyboard, cursor and controller objects.

use mlua::{Lua, Table, UserData, UserDataMethods};

use crate::input::{StickSide, CONTROLLERS_COUNT};
use crate::platform::{CursorButton, GamepadButton, Key};
use crate::script::context::host;

struct KeyboardObject;

impl UserData for KeyboardObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("is_available", |_, _, ()| Ok(true));

        fn probe(
            lua: &Lua,
            name: &str,
            pick: impl Fn(crate::input::Button) -> bool,
        ) -> mlua::Result<bool> {
            let key = Key::parse(name)
                .ok_or_else(|| mlua::Error::runtime(format!("unknown key `{name}`")))?;
            let context = host(lua)?;
            let input = context.input.borrow();
            Ok(pick(input.keyboard().button(key)))
        }

        methods.add_method("is_down", |lua, _, name: String| {
            probe(lua, &name, |button| button.down)
        });
        methods.add_method("is_up", |lua, _, name: String| {
            probe(lua, &name, |button| !button.down)
        });
        methods.add_method("is_pressed", |lua, _, name: String| {
            probe(lua, &name, |button| button.pressed)
        });
        methods.add_method("is_released", |lua, _, name: String| {
            probe(lua, &name, |button| button.released)
        });
    }
}

pub fn keyboard_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "new",
        lua.create_function(|_, ()| Ok(KeyboardObject))?,
    )?;
    Ok(module)
}

struct CursorObject;

impl UserData for CursorObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("is_available", |lua, _, ()| {
            let context = host(lua)?;
            let input = context.input.borrow();
            Ok(input.cursor().is_available())
        });
        methods.add_method(
            "position",
            |lua, _, position: (Option<i32>, Option<i32>)| {
                let context = host(lua)?;
                match position {
                    (Some(x), Some(y)) => {
                        context.input.borrow_mut().cursor_mut().set_position(x, y);
                        Ok(context.input.borrow().cursor().position())
                    }
                    _ => Ok(context.input.borrow().cursor().position()),
                }
            },
        );

        fn probe(
            lua: &Lua,
            name: &str,
            pick: impl Fn(crate::input::Button) -> bool,
        ) -> mlua::Result<bool> {
            let button = CursorButton::parse(name)
                .ok_or_else(|| mlua::Error::runtime(format!("unknown cursor button `{name}`")))?;
            let context = host(lua)?;
            let input = context.input.borrow();
            Ok(pick(input.cursor().button(button)))
        }

        methods.add_method("is_down", |lua, _, name: String| {
            probe(lua, &name, |button| button.down)
        });
        methods.add_method("is_up", |lua, _, name: String| {
            probe(lua, &name, |button| !button.down)
        });
        methods.add_method("is_pressed", |lua, _, name: String| {
            probe(lua, &name, |button| button.pressed)
        });
        methods.add_method("is_released", |lua, _, name: String| {
            probe(lua, &name, |button| button.released)
        });
    }
}

pub fn cursor_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set("new", lua.create_function(|_, ()| Ok(CursorObject))?)?;
    Ok(module)
}

struct ControllerObject {
    id: usize,
}

impl ControllerObject {
    fn probe(
        &self,
        lua: &Lua,
        name: &str,
        pick: impl Fn(crate::input::Button) -> bool,
    ) -> mlua::Result<bool> {
        let button = GamepadButton::parse(name).ok_or_else(|| {
            mlua::Error::runtime(format!("unknown controller button `{name}`"))
        })?;
        let context = host(lua)?;
        let input = context.input.borrow();
        let controller = input
            .controller(self.id)
            .ok_or_else(|| mlua::Error::runtime("controller is gone"))?;
        Ok(pick(controller.button(button)))
    }
}

impl UserData for ControllerObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("is_available", |lua, this, ()| {
            let context = host(lua)?;
            let input = context.input.borrow();
            Ok(input
                .controller(this.id)
                .is_some_and(|controller| controller.is_available()))
        });
        methods.add_method("is_down", |lua, this, name: String| {
            this.probe(lua, &name, |button| button.down)
        });
        methods.add_method("is_up", |lua, this, name: String| {
            this.probe(lua, &name, |button| !button.down)
        });
        methods.add_method("is_pressed", |lua, this, name: String| {
            this.probe(lua, &name, |button| button.pressed)
        });
        methods.add_method("is_released", |lua, this, name: String| {
            this.probe(lua, &name, |button| button.released)
        });
        methods.add_method("stick", |lua, this, side: String| {
            let side = StickSide::parse(&side)
                .ok_or_else(|| mlua::Error::runtime(format!("unknown stick `{side}`")))?;
            let context = host(lua)?;
            let input = context.input.borrow();
            let controller = input
                .controller(this.id)
                .ok_or_else(|| mlua::Error::runtime("controller is gone"))?;
            let stick = controller.stick(side);
            Ok((stick.x, stick.y, stick.angle, stick.magnitude))
        });
        methods.add_method("triggers", |lua, this, ()| {
            let context = host(lua)?;
            let input = context.input.borrow();
            let controller = input
                .controller(this.id)
                .ok_or_else(|| mlua::Error::runtime("controller is gone"))?;
            let triggers = controller.triggers();
            Ok((triggers.left, triggers.right))
        });
    }
}

pub fn controller_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "from_id",
        lua.create_function(|_, id: Option<usize>| {
            let id = id.unwrap_or(0);
            if id >= CONTROLLERS_COUNT {
                return Err(mlua::Error::runtime(format!(
                    "controller #{id} is out of range"
                )));
            }
            Ok(ControllerObject { id })
        })?,
    )?;
    Ok(module)
}
