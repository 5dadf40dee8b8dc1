//! The host context: shared handles to every subsystem, stowed in the
//! VM's application data so bindings can reach them without globals.

use std::cell::RefCell;
use std::rc::Rc;

use mlua::{AppDataRef, Lua};

use crate::audio::Audio;
use crate::display::Display;
use crate::environment::Environment;
use crate::input::Input;
use crate::storage::Storage;

#[derive(Clone)]
pub struct HostContext {
    pub storage: Rc<RefCell<Storage>>,
    pub display: Rc<RefCell<Display>>,
    pub input: Rc<RefCell<Input>>,
    pub audio: Rc<RefCell<Audio>>,
    pub environment: Rc<RefCell<Environment>>,
}

/// Fetch the context installed at boot.
pub fn host(lua: &Lua) -> mlua::Result<AppDataRef<'_, HostContext>> {
    lua.app_data_ref::<HostContext>()
        .ok_or_else(|| mlua::Error::runtime("host context is not installed"))
}
