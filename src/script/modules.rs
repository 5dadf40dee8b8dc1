//! The flat registration table of every script-visible module.

use mlua::{Lua, Table};

use crate::script::{core, generators, graphics, input, io, physics, sound, util};

type Loader = fn(&Lua) -> mlua::Result<Table>;

pub const MODULES: &[(&str, Loader)] = &[
    ("miso.core.log", core::log_loader),
    ("miso.core.math", core::math_loader),
    ("miso.core.system", core::system_loader),
    ("miso.generators.noise", generators::noise_loader),
    ("miso.generators.tweener", generators::tweener_loader),
    ("miso.generators.wave", generators::wave_loader),
    ("miso.graphics.bank", graphics::bank_loader),
    ("miso.graphics.batch", graphics::batch_loader),
    ("miso.graphics.canvas", graphics::canvas_loader),
    ("miso.graphics.display", graphics::display_loader),
    ("miso.graphics.font", graphics::font_loader),
    ("miso.graphics.image", graphics::image_loader),
    ("miso.graphics.palette", graphics::palette_loader),
    ("miso.graphics.program", graphics::program_loader),
    ("miso.graphics.xform", graphics::xform_loader),
    ("miso.input.controller", input::controller_loader),
    ("miso.input.cursor", input::cursor_loader),
    ("miso.input.keyboard", input::keyboard_loader),
    ("miso.io.file", io::file_loader),
    ("miso.io.storage", io::storage_loader),
    ("miso.physics.body", physics::body_loader),
    ("miso.physics.world", physics::world_loader),
    ("miso.sound.source", sound::source_loader),
    ("miso.sound.speakers", sound::speakers_loader),
    ("miso.util.grid", util::grid_loader),
];

/// Install every module into `package.preload` so plain `require` finds
/// them before hitting the storage searcher.
pub fn register_all(lua: &Lua) -> mlua::Result<()> {
    let package: Table = lua.globals().get("package")?;
    let preload: Table = package.get("preload")?;
    for (name, loader) in MODULES {
        let loader = *loader;
        preload.set(
            *name,
            lua.create_function(move |lua, _: mlua::MultiValue| loader(lua))?,
        )?;
    }
    Ok(())
}
