//! The `miso.physics.*` modules: the world and body façades.

use mlua::{Lua, Table, UserData, UserDataMethods, UserDataRefMut};

use crate::physics::{Body, BodyShape, BodyType, World};

struct WorldObject {
    world: World,
}

impl UserData for WorldObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method(
            "gravity",
            |_, this, gravity: (Option<f32>, Option<f32>)| match gravity {
                (Some(x), Some(y)) => {
                    this.world.set_gravity(x, y);
                    Ok((x, y))
                }
                _ => Ok(this.world.gravity()),
            },
        );
        methods.add_method("damping", |_, this, damping: Option<f32>| match damping {
            None => Ok(this.world.damping()),
            Some(damping) => {
                this.world.set_damping(damping);
                Ok(this.world.damping())
            }
        });
        methods.add_method("update", |_, this, delta_time: f32| {
            this.world.update(delta_time);
            Ok(())
        });
        methods.add_method("add", |_, this, mut body: UserDataRefMut<BodyObject>| {
            this.world.add(&mut body.body);
            Ok(())
        });
        methods.add_method("remove", |_, this, mut body: UserDataRefMut<BodyObject>| {
            this.world.remove(&mut body.body);
            Ok(())
        });
        methods.add_method("clear", |_, this, ()| {
            this.world.clear();
            Ok(())
        });
    }
}

pub fn world_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "new",
        lua.create_function(|_, (x, y): (Option<f32>, Option<f32>)| {
            Ok(WorldObject {
                world: World::new(x.unwrap_or(0.0), y.unwrap_or(0.0)),
            })
        })?,
    )?;
    Ok(module)
}

struct BodyObject {
    body: Body,
}

impl UserData for BodyObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("shape", |_, this, ()| match this.body.shape() {
            BodyShape::Box { width, height } => {
                Ok(("box".to_string(), width, height))
            }
            BodyShape::Circle { radius } => Ok(("circle".to_string(), radius, radius)),
        });
        methods.add_method_mut("type", |_, this, kind: Option<String>| match kind {
            None => Ok(this.body.body_type().name().to_string()),
            Some(name) => {
                let kind = BodyType::parse(&name)
                    .ok_or_else(|| mlua::Error::runtime(format!("unknown body type `{name}`")))?;
                this.body.set_body_type(kind);
                Ok(name)
            }
        });
        methods.add_method("mass", |_, this, ()| Ok(this.body.mass()));
        methods.add_method_mut(
            "position",
            |_, this, position: (Option<f32>, Option<f32>)| match position {
                (Some(x), Some(y)) => {
                    this.body.set_position(x, y);
                    Ok((x, y))
                }
                _ => Ok(this.body.position()),
            },
        );
        methods.add_method_mut(
            "velocity",
            |_, this, velocity: (Option<f32>, Option<f32>)| match velocity {
                (Some(x), Some(y)) => {
                    this.body.set_velocity(x, y);
                    Ok((x, y))
                }
                _ => Ok(this.body.velocity()),
            },
        );
        methods.add_method_mut("angle", |_, this, angle: Option<f32>| match angle {
            None => Ok(this.body.angle()),
            Some(angle) => {
                this.body.set_angle(angle);
                Ok(angle)
            }
        });
        methods.add_method_mut(
            "elasticity",
            |_, this, elasticity: Option<f32>| match elasticity {
                None => Ok(this.body.elasticity()),
                Some(elasticity) => {
                    this.body.set_elasticity(elasticity);
                    Ok(this.body.elasticity())
                }
            },
        );
        methods.add_method_mut("density", |_, this, density: Option<f32>| match density {
            None => Ok(this.body.density()),
            Some(density) => {
                this.body.set_density(density);
                Ok(this.body.density())
            }
        });
        methods.add_method_mut("sleep", |_, this, asleep: Option<bool>| match asleep {
            None => Ok(this.body.is_sleeping()),
            Some(asleep) => {
                this.body.sleep(asleep);
                Ok(asleep)
            }
        });
    }
}

pub fn body_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "new",
        lua.create_function(
            |_, (kind, first, second): (String, f32, Option<f32>)| {
                let shape = match kind.as_str() {
                    "box" => BodyShape::Box {
                        width: first,
                        height: second.unwrap_or(first),
                    },
                    "circle" => BodyShape::Circle { radius: first },
                    other => {
                        return Err(mlua::Error::runtime(format!(
                            "unknown body shape `{other}`"
                        )))
                    }
                };
                Ok(BodyObject {
                    body: Body::new(shape),
                })
            },
        )?,
    )?;
    Ok(module)
}
