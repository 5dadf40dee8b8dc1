//! The `miso.core.*` modules: logging, math helpers and system
//! introspection.

use mlua::{Function, Lua, Table, Value, Variadic};

use crate::script::context::host;
use crate::version;

fn write(lua: &Lua, level: log::Level, values: Variadic<Value>) -> mlua::Result<()> {
    let tostring: Function = lua.globals().get("tostring")?;
    let mut line = String::new();
    for (index, value) in values.into_iter().enumerate() {
        if index > 0 {
            line.push('\t');
        }
        let text: mlua::String = tostring.call(value)?;
        line.push_str(&text.to_string_lossy());
    }
    log::log!(target: "script", level, "{line}");
    Ok(())
}

pub fn log_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "info",
        lua.create_function(|lua, values| write(lua, log::Level::Info, values))?,
    )?;
    module.set(
        "warning",
        lua.create_function(|lua, values| write(lua, log::Level::Warn, values))?,
    )?;
    module.set(
        "error",
        lua.create_function(|lua, values| write(lua, log::Level::Error, values))?,
    )?;
    module.set(
        "fatal",
        lua.create_function(|lua, values: Variadic<Value>| {
            write(lua, log::Level::Error, values)?;
            Err::<(), _>(mlua::Error::runtime("fatal error raised from script"))
        })?,
    )?;
    Ok(module)
}

pub fn math_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;

    module.set(
        "lerp",
        lua.create_function(|_, (a, b, ratio): (f64, f64, f64)| Ok(a + (b - a) * ratio))?,
    )?;
    module.set(
        "invlerp",
        lua.create_function(|_, (a, b, value): (f64, f64, f64)| {
            if a == b {
                Ok(0.0)
            } else {
                Ok((value - a) / (b - a))
            }
        })?,
    )?;
    module.set(
        "clamp",
        lua.create_function(|_, (value, lower, upper): (f64, f64, f64)| {
            Ok(value.clamp(lower, upper))
        })?,
    )?;
    module.set(
        "step",
        lua.create_function(|_, (edge, value): (f64, f64)| {
            Ok(if value < edge { 0.0 } else { 1.0 })
        })?,
    )?;
    module.set(
        "smoothstep",
        lua.create_function(|_, (edge0, edge1, value): (f64, f64, f64)| {
            let t = ((value - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
            Ok(t * t * (3.0 - 2.0 * t))
        })?,
    )?;
    module.set(
        "smootherstep",
        lua.create_function(|_, (edge0, edge1, value): (f64, f64, f64)| {
            let t = ((value - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
            Ok(t * t * t * (t * (t * 6.0 - 15.0) + 10.0))
        })?,
    )?;
    module.set(
        "sign",
        lua.create_function(|_, value: f64| Ok(if value < 0.0 { -1.0 } else { 1.0 }))?,
    )?;
    module.set(
        "signum",
        lua.create_function(|_, value: f64| {
            Ok(if value < 0.0 {
                -1.0
            } else if value > 0.0 {
                1.0
            } else {
                0.0
            })
        })?,
    )?;
    module.set(
        "rotate",
        lua.create_function(|_, (x, y, angle): (f64, f64, f64)| {
            let (sin, cos) = angle.sin_cos();
            Ok((x * cos - y * sin, x * sin + y * cos))
        })?,
    )?;
    module.set("EPSILON", f64::EPSILON)?;

    Ok(module)
}

pub fn system_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;

    module.set(
        "version",
        lua.create_function(|_, ()| {
            Ok((
                version::VERSION_MAJOR,
                version::VERSION_MINOR,
                version::VERSION_REVISION,
            ))
        })?,
    )?;
    module.set(
        "clock",
        lua.create_function(|lua, ()| {
            let context = host(lua)?;
            let display = context.display.borrow();
            Ok(display.backend().time())
        })?,
    )?;
    module.set(
        "time",
        lua.create_function(|lua, ()| {
            let context = host(lua)?;
            let environment = context.environment.borrow();
            Ok(environment.state().time)
        })?,
    )?;
    module.set(
        "fps",
        lua.create_function(|lua, ()| {
            let context = host(lua)?;
            let environment = context.environment.borrow();
            Ok(environment.state().stats.fps)
        })?,
    )?;
    module.set(
        "is_active",
        lua.create_function(|lua, ()| {
            let context = host(lua)?;
            let environment = context.environment.borrow();
            Ok(environment.state().active.is)
        })?,
    )?;
    module.set(
        "quit",
        lua.create_function(|lua, ()| {
            let context = host(lua)?;
            context.display.borrow_mut().request_close();
            Ok(())
        })?,
    )?;

    Ok(module)
}
