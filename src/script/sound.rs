//! The `miso.sound.*` modules: sources and the speakers (group) API.

use std::sync::{Arc, Mutex};

use mlua::{Lua, Table, UserData, UserDataMethods};

use crate::audio::decoder;
use crate::audio::mixer::{Mix, DEFAULT_GROUP, GROUPS_COUNT};
use crate::audio::source::{Source, SourceKind};
use crate::script::context::host;

struct SourceObject {
    source: Arc<Mutex<Source>>,
}

impl SourceObject {
    fn locked<T>(&self, reader: impl FnOnce(&mut Source) -> T) -> mlua::Result<T> {
        let mut source = self
            .source
            .lock()
            .map_err(|_| mlua::Error::runtime("source lock poisoned"))?;
        Ok(reader(&mut source))
    }
}

impl UserData for SourceObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("looped", |_, this, looped: Option<bool>| {
            this.locked(|source| match looped {
                None => source.is_looped(),
                Some(looped) => {
                    source.set_looped(looped);
                    looped
                }
            })
        });
        methods.add_method("group", |_, this, group: Option<usize>| {
            if let Some(group) = group {
                if group >= GROUPS_COUNT {
                    return Err(mlua::Error::runtime(format!(
                        "group #{group} is out of range"
                    )));
                }
            }
            this.locked(|source| match group {
                None => source.group(),
                Some(group) => {
                    source.set_group(group);
                    group
                }
            })
        });
        methods.add_method("gain", |_, this, gain: Option<f32>| {
            this.locked(|source| match gain {
                None => source.gain(),
                Some(gain) => {
                    source.set_gain(gain);
                    source.gain()
                }
            })
        });
        methods.add_method("speed", |_, this, speed: Option<f32>| {
            this.locked(|source| match speed {
                None => source.speed(),
                Some(speed) => {
                    source.set_speed(speed);
                    source.speed()
                }
            })
        });
        methods.add_method("pan", |_, this, pan: f32| {
            this.locked(|source| source.set_pan(pan))
        });
        methods.add_method("balance", |_, this, balance: f32| {
            this.locked(|source| source.set_balance(balance))
        });
        methods.add_method(
            "mix",
            |_,
             this,
             mix: (Option<f32>, Option<f32>, Option<f32>, Option<f32>)| {
                match mix {
                    (Some(ll), Some(lr), Some(rl), Some(rr)) => this.locked(|source| {
                        source.set_mix(Mix {
                            left_to_left: ll,
                            left_to_right: lr,
                            right_to_left: rl,
                            right_to_right: rr,
                        });
                        (ll, lr, rl, rr)
                    }),
                    _ => this.locked(|source| {
                        let mix = source.mix();
                        (
                            mix.left_to_left,
                            mix.left_to_right,
                            mix.right_to_left,
                            mix.right_to_right,
                        )
                    }),
                }
            },
        );
        methods.add_method("is_playing", |lua, this, ()| {
            let context = host(lua)?;
            let audio = context.audio.borrow();
            Ok(audio.is_tracked(&this.source))
        });
        methods.add_method("play", |lua, this, ()| {
            let context = host(lua)?;
            context.audio.borrow_mut().track(&this.source, true);
            Ok(())
        });
        methods.add_method("resume", |lua, this, ()| {
            let context = host(lua)?;
            context.audio.borrow_mut().track(&this.source, false);
            Ok(())
        });
        methods.add_method("stop", |lua, this, ()| {
            let context = host(lua)?;
            context.audio.borrow_mut().untrack(&this.source);
            Ok(())
        });
    }
}

pub fn source_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "new",
        lua.create_function(|lua, (name, kind): (String, Option<String>)| {
            let kind = match kind.as_deref() {
                None => SourceKind::Music,
                Some(name) => SourceKind::parse(name).ok_or_else(|| {
                    mlua::Error::runtime(format!("unknown source kind `{name}`"))
                })?,
            };
            let context = host(lua)?;
            let handle = context
                .storage
                .borrow()
                .open(&name)
                .map_err(mlua::Error::external)?;
            let decoder = decoder::from_handle(handle, kind, &name)
                .map_err(mlua::Error::external)?;
            Ok(SourceObject {
                source: Arc::new(Mutex::new(Source::new(decoder, kind))),
            })
        })?,
    )?;
    Ok(module)
}

pub fn speakers_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set("DEFAULT_GROUP", DEFAULT_GROUP)?;
    module.set(
        "volume",
        lua.create_function(|lua, volume: Option<f32>| {
            let context = host(lua)?;
            let audio = context.audio.borrow();
            match volume {
                None => Ok(audio.master_volume()),
                Some(volume) => {
                    audio.set_master_volume(volume);
                    Ok(audio.master_volume())
                }
            }
        })?,
    )?;
    module.set(
        "gain",
        lua.create_function(|lua, (group, gain): (usize, Option<f32>)| {
            let context = host(lua)?;
            let audio = context.audio.borrow();
            match gain {
                None => Ok(audio.group_gain(group)),
                Some(gain) => {
                    audio.set_group_gain(group, gain);
                    Ok(audio.group_gain(group))
                }
            }
        })?,
    )?;
    module.set(
        "mix",
        lua.create_function(
            |lua,
             (group, ll, lr, rl, rr): (
                usize,
                Option<f32>,
                Option<f32>,
                Option<f32>,
                Option<f32>,
            )| {
                let context = host(lua)?;
                let audio = context.audio.borrow();
                if let (Some(ll), Some(lr), Some(rl), Some(rr)) = (ll, lr, rl, rr) {
                    audio.set_group_mix(
                        group,
                        Mix {
                            left_to_left: ll,
                            left_to_right: lr,
                            right_to_left: rl,
                            right_to_right: rr,
                        },
                    );
                }
                let mix = audio.group_mix(group);
                Ok((
                    mix.left_to_left,
                    mix.left_to_right,
                    mix.right_to_left,
                    mix.right_to_right,
                ))
            },
        )?,
    )?;
    module.set(
        "pan",
        lua.create_function(|lua, (group, pan): (usize, f32)| {
            let context = host(lua)?;
            context.audio.borrow().set_group_pan(group, pan);
            Ok(())
        })?,
    )?;
    module.set(
        "balance",
        lua.create_function(|lua, (group, balance): (usize, f32)| {
            let context = host(lua)?;
            context.audio.borrow().set_group_balance(group, balance);
            Ok(())
        })?,
    )?;
    module.set(
        "halt",
        lua.create_function(|lua, ()| {
            let context = host(lua)?;
            context.audio.borrow_mut().halt();
            Ok(())
        })?,
    )?;
    Ok(module)
}
