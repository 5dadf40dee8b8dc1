//! The `miso.util.*` modules.

use mlua::{Function, Lua, Table, UserData, UserDataMethods, UserDataRef};

use crate::util::grid::Grid;

struct GridObject {
    grid: Grid,
}

impl UserData for GridObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("size", |_, this, ()| {
            Ok((this.grid.width(), this.grid.height()))
        });
        methods.add_method("peek", |_, this, (x, y): (u32, u32)| {
            this.grid
                .peek(x, y)
                .ok_or_else(|| mlua::Error::runtime(format!("cell <{x}, {y}> is out of bounds")))
        });
        methods.add_method_mut("poke", |_, this, (x, y, value): (u32, u32, f64)| {
            this.grid.poke(x, y, value);
            Ok(())
        });
        methods.add_method_mut("fill", |_, this, values: Vec<f64>| {
            this.grid.fill(&values);
            Ok(())
        });
        methods.add_method_mut("copy", |_, this, other: UserDataRef<GridObject>| {
            this.grid.copy(&other.grid);
            Ok(())
        });
        methods.add_method("scan", |_, this, callback: Function| {
            let mut failure = None;
            this.grid.scan(|x, y, value| {
                if failure.is_some() {
                    return;
                }
                if let Err(error) = callback.call::<()>((x, y, value)) {
                    failure = Some(error);
                }
            });
            match failure {
                Some(error) => Err(error),
                None => Ok(()),
            }
        });
        methods.add_method_mut("process", |_, this, callback: Function| {
            let mut failure = None;
            this.grid.process(|x, y, value| {
                if failure.is_some() {
                    return value;
                }
                match callback.call::<f64>((x, y, value)) {
                    Ok(next) => next,
                    Err(error) => {
                        failure = Some(error);
                        value
                    }
                }
            });
            match failure {
                Some(error) => Err(error),
                None => Ok(()),
            }
        });
        methods.add_method(
            "path",
            |lua, this, (x0, y0, x1, y1): (u32, u32, u32, u32)| {
                let steps = this.grid.path((x0, y0), (x1, y1));
                let path = lua.create_table()?;
                for (index, (x, y)) in steps.into_iter().enumerate() {
                    let cell = lua.create_table()?;
                    cell.set("x", x)?;
                    cell.set("y", y)?;
                    path.set(index + 1, cell)?;
                }
                Ok(path)
            },
        );
    }
}

pub fn grid_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "new",
        lua.create_function(
            |_, (width, height, values): (u32, u32, Option<Vec<f64>>)| {
                let mut grid = Grid::new(width, height);
                if let Some(values) = values {
                    grid.fill(&values);
                }
                Ok(GridObject { grid })
            },
        )?,
    )?;
    Ok(module)
}
