//! The `miso.io.*` modules: streaming file access and storage control.

use mlua::{Lua, Table, UserData, UserDataMethods};

use crate::script::context::host;
use crate::storage::resource::Resource;
use crate::storage::vfs::{Stream, Whence};

struct FileObject {
    handle: Option<Box<dyn Stream>>,
}

impl FileObject {
    fn handle(&mut self) -> mlua::Result<&mut Box<dyn Stream>> {
        self.handle
            .as_mut()
            .ok_or_else(|| mlua::Error::runtime("file is closed"))
    }
}

impl UserData for FileObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method_mut("read", |lua, this, bytes: Option<usize>| {
            let handle = this.handle()?;
            let data = match bytes {
                None => handle.as_mut().read_to_end().map_err(mlua::Error::external)?,
                Some(count) => {
                    let mut buffer = vec![0; count];
                    let read = handle.read(&mut buffer).map_err(mlua::Error::external)?;
                    buffer.truncate(read);
                    buffer
                }
            };
            lua.create_string(&data)
        });
        methods.add_method_mut("size", |_, this, ()| Ok(this.handle()?.size()));
        methods.add_method_mut("tell", |_, this, ()| Ok(this.handle()?.tell()));
        methods.add_method_mut("eof", |_, this, ()| Ok(this.handle()?.eof()));
        methods.add_method_mut(
            "seek",
            |_, this, (offset, whence): (i64, Option<String>)| {
                let whence = match whence.as_deref() {
                    None | Some("set") => Whence::Set,
                    Some("cur") => Whence::Cur,
                    Some("end") => Whence::End,
                    Some(other) => {
                        return Err(mlua::Error::runtime(format!(
                            "unknown seek origin `{other}`"
                        )))
                    }
                };
                this.handle()?
                    .seek(offset, whence)
                    .map_err(mlua::Error::external)
            },
        );
        methods.add_method_mut("close", |_, this, ()| {
            this.handle.take();
            Ok(())
        });
    }
}

pub fn file_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "open",
        lua.create_function(|lua, name: String| {
            let context = host(lua)?;
            let handle = context
                .storage
                .borrow()
                .open(&name)
                .map_err(mlua::Error::external)?;
            Ok(FileObject {
                handle: Some(handle),
            })
        })?,
    )?;
    Ok(module)
}

pub fn storage_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "inject",
        lua.create_function(
            |lua, (name, data, mode): (String, mlua::String, Option<String>)| {
                let context = host(lua)?;
                let storage = context.storage.borrow();
                let result = match mode.as_deref().unwrap_or("base64") {
                    "base64" => storage.inject_base64(&name, &data.to_str()?),
                    "ascii85" => storage.inject_ascii85(&name, &data.to_str()?),
                    "raw" => {
                        storage.inject_raw(&name, &data.as_bytes());
                        Ok(())
                    }
                    other => {
                        return Err(mlua::Error::runtime(format!(
                            "unknown injection mode `{other}`"
                        )))
                    }
                };
                result.map_err(mlua::Error::external)
            },
        )?,
    )?;
    module.set(
        "store",
        lua.create_function(|lua, (name, data): (String, mlua::String)| {
            let context = host(lua)?;
            let result = context
                .storage
                .borrow()
                .store(&name, &Resource::Blob(data.as_bytes().to_vec()))
                .map_err(mlua::Error::external);
            result
        })?,
    )?;
    module.set(
        "flush",
        lua.create_function(|lua, ()| {
            let context = host(lua)?;
            context.storage.borrow_mut().flush();
            Ok(())
        })?,
    )?;
    Ok(module)
}
