//! The `miso.generators.*` modules: noise, tweener and wave objects.

use mlua::{Lua, MetaMethod, Table, UserData, UserDataMethods};

use crate::generators::noise::{Noise, NoiseType};
use crate::generators::tweener::{Easing, Tweener};
use crate::generators::wave::{Wave, WaveForm};

struct NoiseObject {
    noise: Noise,
}

impl UserData for NoiseObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method(
            "generate",
            |_, this, (x, y, z): (f64, Option<f64>, Option<f64>)| {
                Ok(this
                    .noise
                    .generate(x, y.unwrap_or(0.0), z.unwrap_or(0.0)))
            },
        );
        methods.add_meta_method(
            MetaMethod::Call,
            |_, this, (x, y, z): (f64, Option<f64>, Option<f64>)| {
                Ok(this
                    .noise
                    .generate(x, y.unwrap_or(0.0), z.unwrap_or(0.0)))
            },
        );
        methods.add_method_mut("type", |_, this, kind: Option<String>| match kind {
            None => Ok(this.noise.kind().name().to_string()),
            Some(name) => {
                let kind = NoiseType::parse(&name)
                    .ok_or_else(|| mlua::Error::runtime(format!("unknown noise type `{name}`")))?;
                this.noise.set_kind(kind);
                Ok(name)
            }
        });
        methods.add_method_mut("seed", |_, this, seed: Option<u32>| match seed {
            None => Ok(this.noise.seed()),
            Some(seed) => {
                this.noise.set_seed(seed);
                Ok(seed)
            }
        });
        methods.add_method_mut("frequency", |_, this, frequency: Option<f64>| {
            match frequency {
                None => Ok(this.noise.frequency()),
                Some(frequency) => {
                    this.noise.set_frequency(frequency);
                    Ok(frequency)
                }
            }
        });
    }
}

pub fn noise_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "new",
        lua.create_function(
            |_, (kind, seed, frequency): (Option<String>, Option<u32>, Option<f64>)| {
                let kind = match kind {
                    None => NoiseType::Perlin,
                    Some(name) => NoiseType::parse(&name).ok_or_else(|| {
                        mlua::Error::runtime(format!("unknown noise type `{name}`"))
                    })?,
                };
                Ok(NoiseObject {
                    noise: Noise::new(kind, seed.unwrap_or(0), frequency.unwrap_or(1.0)),
                })
            },
        )?,
    )?;
    Ok(module)
}

struct TweenerObject {
    tweener: Tweener,
}

impl UserData for TweenerObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("evaluate", |_, this, time: f64| {
            Ok(this.tweener.evaluate(time))
        });
        methods.add_meta_method(MetaMethod::Call, |_, this, time: f64| {
            Ok(this.tweener.evaluate(time))
        });
        methods.add_method_mut("easing", |_, this, easing: Option<String>| match easing {
            None => Ok(this.tweener.easing().name().to_string()),
            Some(name) => {
                let easing = Easing::parse(&name)
                    .ok_or_else(|| mlua::Error::runtime(format!("unknown easing `{name}`")))?;
                this.tweener.set_easing(easing);
                Ok(name)
            }
        });
        methods.add_method_mut("duration", |_, this, duration: Option<f64>| {
            match duration {
                None => Ok(this.tweener.duration()),
                Some(duration) => {
                    this.tweener.set_duration(duration);
                    Ok(duration)
                }
            }
        });
        methods.add_method_mut(
            "range",
            |_, this, (from, to): (Option<f64>, Option<f64>)| match (from, to) {
                (Some(from), Some(to)) => {
                    this.tweener.set_range(from, to);
                    Ok((from, to))
                }
                _ => Ok(this.tweener.range()),
            },
        );
        methods.add_method_mut("clamp", |_, this, clamp: Option<bool>| match clamp {
            None => Ok(this.tweener.is_clamped()),
            Some(clamp) => {
                this.tweener.set_clamp(clamp);
                Ok(clamp)
            }
        });
    }
}

pub fn tweener_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "new",
        lua.create_function(
            |_,
             (easing, duration, from, to): (
                Option<String>,
                Option<f64>,
                Option<f64>,
                Option<f64>,
            )| {
                let easing = match easing {
                    None => Easing::Linear,
                    Some(name) => Easing::parse(&name).ok_or_else(|| {
                        mlua::Error::runtime(format!("unknown easing `{name}`"))
                    })?,
                };
                Ok(TweenerObject {
                    tweener: Tweener::new(
                        easing,
                        duration.unwrap_or(1.0),
                        from.unwrap_or(0.0),
                        to.unwrap_or(1.0),
                    ),
                })
            },
        )?,
    )?;
    Ok(module)
}

struct WaveObject {
    wave: Wave,
}

impl UserData for WaveObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("at", |_, this, time: f64| Ok(this.wave.at(time)));
        methods.add_meta_method(MetaMethod::Call, |_, this, time: f64| {
            Ok(this.wave.at(time))
        });
        methods.add_method_mut("form", |_, this, form: Option<String>| match form {
            None => Ok(this.wave.form().name().to_string()),
            Some(name) => {
                let form = WaveForm::parse(&name)
                    .ok_or_else(|| mlua::Error::runtime(format!("unknown wave form `{name}`")))?;
                this.wave.set_form(form);
                Ok(name)
            }
        });
        methods.add_method_mut("period", |_, this, period: Option<f64>| match period {
            None => Ok(this.wave.period()),
            Some(period) => {
                this.wave.set_period(period);
                Ok(period)
            }
        });
        methods.add_method_mut("amplitude", |_, this, amplitude: Option<f64>| {
            match amplitude {
                None => Ok(this.wave.amplitude()),
                Some(amplitude) => {
                    this.wave.set_amplitude(amplitude);
                    Ok(amplitude)
                }
            }
        });
    }
}

pub fn wave_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "new",
        lua.create_function(
            |_, (form, period, amplitude): (String, Option<f64>, Option<f64>)| {
                let form = WaveForm::parse(&form)
                    .ok_or_else(|| mlua::Error::runtime(format!("unknown wave form `{form}`")))?;
                Ok(WaveObject {
                    wave: Wave::new(form, period.unwrap_or(1.0), amplitude.unwrap_or(1.0)),
                })
            },
        )?,
    )?;
    Ok(module)
}
