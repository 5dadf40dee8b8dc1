//! Physics façade: a thin script-friendly wrapper over the `rapier2d`
//! rigid-body library. Only the surface the scripting layer needs is
//! exposed; everything else stays inside the world.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rapier2d::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyShape {
    Box { width: f32, height: f32 },
    Circle { radius: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyType {
    Dynamic,
    Kinematic,
    Static,
}

impl BodyType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "dynamic" => Some(Self::Dynamic),
            "kinematic" => Some(Self::Kinematic),
            "static" => Some(Self::Static),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Dynamic => "dynamic",
            Self::Kinematic => "kinematic",
            Self::Static => "static",
        }
    }
}

struct WorldInner {
    gravity: Vector<Real>,
    damping: f32,
    parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    handles: Vec<RigidBodyHandle>,
}

impl WorldInner {
    fn step(&mut self, delta_time: f32) {
        self.parameters.dt = delta_time;
        self.pipeline.step(
            &self.gravity,
            &self.parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
    }
}

pub struct World {
    inner: Rc<RefCell<WorldInner>>,
}

impl World {
    pub fn new(gravity_x: f32, gravity_y: f32) -> Self {
        Self {
            inner: Rc::new(RefCell::new(WorldInner {
                gravity: vector![gravity_x, gravity_y],
                damping: 0.0,
                parameters: IntegrationParameters::default(),
                pipeline: PhysicsPipeline::new(),
                islands: IslandManager::new(),
                broad_phase: DefaultBroadPhase::new(),
                narrow_phase: NarrowPhase::new(),
                bodies: RigidBodySet::new(),
                colliders: ColliderSet::new(),
                impulse_joints: ImpulseJointSet::new(),
                multibody_joints: MultibodyJointSet::new(),
                ccd_solver: CCDSolver::new(),
                handles: Vec::new(),
            })),
        }
    }

    pub fn gravity(&self) -> (f32, f32) {
        let inner = self.inner.borrow();
        (inner.gravity.x, inner.gravity.y)
    }

    pub fn set_gravity(&self, x: f32, y: f32) {
        self.inner.borrow_mut().gravity = vector![x, y];
    }

    pub fn damping(&self) -> f32 {
        self.inner.borrow().damping
    }

    /// Linear damping applied to bodies added from now on.
    pub fn set_damping(&self, damping: f32) {
        self.inner.borrow_mut().damping = damping.max(0.0);
    }

    /// Advance the simulation by one fixed step.
    pub fn update(&self, delta_time: f32) {
        self.inner.borrow_mut().step(delta_time);
    }

    /// Insert a body into this world; its staged definition becomes live.
    pub fn add(&self, body: &mut Body) {
        if body.attachment.is_some() {
            return;
        }
        let mut inner = self.inner.borrow_mut();

        let kind = match body.def.body_type {
            BodyType::Dynamic => RigidBodyType::Dynamic,
            BodyType::Kinematic => RigidBodyType::KinematicVelocityBased,
            BodyType::Static => RigidBodyType::Fixed,
        };
        let rigid_body = RigidBodyBuilder::new(kind)
            .translation(vector![body.def.position.0, body.def.position.1])
            .linvel(vector![body.def.velocity.0, body.def.velocity.1])
            .rotation(body.def.angle)
            .linear_damping(inner.damping)
            .build();
        let handle = inner.bodies.insert(rigid_body);

        let collider = match body.shape {
            BodyShape::Box { width, height } => ColliderBuilder::cuboid(width / 2.0, height / 2.0),
            BodyShape::Circle { radius } => ColliderBuilder::ball(radius),
        }
        .density(body.def.density)
        .restitution(body.def.elasticity)
        .build();
        let WorldInner {
            bodies, colliders, ..
        } = &mut *inner;
        colliders.insert_with_parent(collider, handle, bodies);

        inner.handles.push(handle);
        body.attachment = Some(Attachment {
            world: Rc::downgrade(&self.inner),
            handle,
        });
    }

    /// Remove a body, reverting it to its staged definition.
    pub fn remove(&self, body: &mut Body) {
        let Some(attachment) = body.attachment.take() else {
            return;
        };
        body.def = body.snapshot_from(&attachment);
        let mut inner = self.inner.borrow_mut();
        let WorldInner {
            bodies,
            colliders,
            islands,
            impulse_joints,
            multibody_joints,
            handles,
            ..
        } = &mut *inner;
        bodies.remove(
            attachment.handle,
            islands,
            colliders,
            impulse_joints,
            multibody_joints,
            true,
        );
        handles.retain(|&handle| handle != attachment.handle);
    }

    /// Drop every body previously added.
    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        let WorldInner {
            bodies,
            colliders,
            islands,
            impulse_joints,
            multibody_joints,
            handles,
            ..
        } = &mut *inner;
        for handle in handles.drain(..) {
            bodies.remove(
                handle,
                islands,
                colliders,
                impulse_joints,
                multibody_joints,
                true,
            );
        }
    }

    pub fn bodies_count(&self) -> usize {
        self.inner.borrow().handles.len()
    }
}

struct Attachment {
    world: Weak<RefCell<WorldInner>>,
    handle: RigidBodyHandle,
}

/// The staged properties a body holds while not attached to a world.
#[derive(Debug, Clone, Copy)]
struct BodyDef {
    body_type: BodyType,
    position: (f32, f32),
    velocity: (f32, f32),
    angle: f32,
    elasticity: f32,
    density: f32,
}

pub struct Body {
    shape: BodyShape,
    def: BodyDef,
    attachment: Option<Attachment>,
}

impl Body {
    pub fn new(shape: BodyShape) -> Self {
        Self {
            shape,
            def: BodyDef {
                body_type: BodyType::Dynamic,
                position: (0.0, 0.0),
                velocity: (0.0, 0.0),
                angle: 0.0,
                elasticity: 0.0,
                density: 1.0,
            },
            attachment: None,
        }
    }

    pub fn shape(&self) -> BodyShape {
        self.shape
    }

    pub fn body_type(&self) -> BodyType {
        self.def.body_type
    }

    pub fn set_body_type(&mut self, body_type: BodyType) {
        self.def.body_type = body_type;
        self.with_live(|rigid_body| {
            rigid_body.set_body_type(
                match body_type {
                    BodyType::Dynamic => RigidBodyType::Dynamic,
                    BodyType::Kinematic => RigidBodyType::KinematicVelocityBased,
                    BodyType::Static => RigidBodyType::Fixed,
                },
                true,
            );
        });
    }

    pub fn elasticity(&self) -> f32 {
        self.def.elasticity
    }

    pub fn set_elasticity(&mut self, elasticity: f32) {
        self.def.elasticity = elasticity.max(0.0);
    }

    pub fn density(&self) -> f32 {
        self.def.density
    }

    pub fn set_density(&mut self, density: f32) {
        self.def.density = density.max(0.0);
    }

    pub fn mass(&self) -> f32 {
        self.read_live(|rigid_body| rigid_body.mass())
            .unwrap_or_else(|| {
                // Staged bodies derive their mass from shape and density.
                let area = match self.shape {
                    BodyShape::Box { width, height } => width * height,
                    BodyShape::Circle { radius } => std::f32::consts::PI * radius * radius,
                };
                area * self.def.density
            })
    }

    pub fn position(&self) -> (f32, f32) {
        self.read_live(|rigid_body| {
            let translation = rigid_body.translation();
            (translation.x, translation.y)
        })
        .unwrap_or(self.def.position)
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.def.position = (x, y);
        self.with_live(|rigid_body| {
            rigid_body.set_translation(vector![x, y], true);
        });
    }

    pub fn velocity(&self) -> (f32, f32) {
        self.read_live(|rigid_body| {
            let velocity = rigid_body.linvel();
            (velocity.x, velocity.y)
        })
        .unwrap_or(self.def.velocity)
    }

    pub fn set_velocity(&mut self, x: f32, y: f32) {
        self.def.velocity = (x, y);
        self.with_live(|rigid_body| {
            rigid_body.set_linvel(vector![x, y], true);
        });
    }

    pub fn angle(&self) -> f32 {
        self.read_live(|rigid_body| rigid_body.rotation().angle())
            .unwrap_or(self.def.angle)
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.def.angle = angle;
        self.with_live(|rigid_body| {
            rigid_body.set_rotation(rapier2d::math::Rotation::new(angle), true);
        });
    }

    pub fn is_sleeping(&self) -> bool {
        self.read_live(|rigid_body| rigid_body.is_sleeping())
            .unwrap_or(false)
    }

    pub fn sleep(&mut self, asleep: bool) {
        self.with_live(|rigid_body| {
            if asleep {
                rigid_body.sleep();
            } else {
                rigid_body.wake_up(true);
            }
        });
    }

    fn snapshot_from(&self, attachment: &Attachment) -> BodyDef {
        let Some(world) = attachment.world.upgrade() else {
            return self.def;
        };
        let inner = world.borrow();
        let Some(rigid_body) = inner.bodies.get(attachment.handle) else {
            return self.def;
        };
        BodyDef {
            position: (rigid_body.translation().x, rigid_body.translation().y),
            velocity: (rigid_body.linvel().x, rigid_body.linvel().y),
            angle: rigid_body.rotation().angle(),
            ..self.def
        }
    }

    fn read_live<T>(&self, reader: impl FnOnce(&RigidBody) -> T) -> Option<T> {
        let attachment = self.attachment.as_ref()?;
        let world = attachment.world.upgrade()?;
        let inner = world.borrow();
        inner.bodies.get(attachment.handle).map(reader)
    }

    fn with_live(&mut self, writer: impl FnOnce(&mut RigidBody)) {
        let Some(attachment) = self.attachment.as_ref() else {
            return;
        };
        let Some(world) = attachment.world.upgrade() else {
            return;
        };
        let mut inner = world.borrow_mut();
        if let Some(rigid_body) = inner.bodies.get_mut(attachment.handle) {
            writer(rigid_body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_properties_survive_until_attach() {
        let mut body = Body::new(BodyShape::Circle { radius: 0.5 });
        body.set_position(3.0, 4.0);
        body.set_velocity(1.0, 0.0);
        assert_eq!(body.position(), (3.0, 4.0));
        assert_eq!(body.velocity(), (1.0, 0.0));

        let world = World::new(0.0, 0.0);
        world.add(&mut body);
        assert_eq!(world.bodies_count(), 1);
        let (x, y) = body.position();
        assert!((x - 3.0).abs() < 1e-5 && (y - 4.0).abs() < 1e-5);
    }

    #[test]
    fn gravity_pulls_dynamic_bodies() {
        let world = World::new(0.0, -10.0);
        let mut body = Body::new(BodyShape::Box {
            width: 1.0,
            height: 1.0,
        });
        body.set_position(0.0, 100.0);
        world.add(&mut body);

        for _ in 0..60 {
            world.update(1.0 / 60.0);
        }
        let (_, y) = body.position();
        assert!(y < 100.0, "body did not fall: y = {y}");
        assert!(body.velocity().1 < 0.0);
    }

    #[test]
    fn static_bodies_stay_put() {
        let world = World::new(0.0, -10.0);
        let mut floor = Body::new(BodyShape::Box {
            width: 100.0,
            height: 1.0,
        });
        floor.set_body_type(BodyType::Static);
        world.add(&mut floor);

        for _ in 0..30 {
            world.update(1.0 / 60.0);
        }
        let (_, y) = floor.position();
        assert!(y.abs() < 1e-5);
    }

    #[test]
    fn remove_snapshots_the_live_state() {
        let world = World::new(0.0, -10.0);
        let mut body = Body::new(BodyShape::Circle { radius: 1.0 });
        body.set_position(0.0, 50.0);
        world.add(&mut body);
        for _ in 0..30 {
            world.update(1.0 / 60.0);
        }

        world.remove(&mut body);
        assert_eq!(world.bodies_count(), 0);
        let (_, y) = body.position();
        assert!(y < 50.0); // The fall is preserved in the staged state.
    }

    #[test]
    fn clear_drops_everything() {
        let world = World::new(0.0, 0.0);
        let mut a = Body::new(BodyShape::Circle { radius: 1.0 });
        let mut b = Body::new(BodyShape::Circle { radius: 2.0 });
        world.add(&mut a);
        world.add(&mut b);
        assert_eq!(world.bodies_count(), 2);
        world.clear();
        assert_eq!(world.bodies_count(), 0);
        // Detached reads fall back to the staged definition.
        assert_eq!(a.position(), (0.0, 0.0));
    }

    #[test]
    fn type_names_parse() {
        assert_eq!(BodyType::parse("dynamic"), Some(BodyType::Dynamic));
        assert_eq!(BodyType::parse("static"), Some(BodyType::Static));
        assert_eq!(BodyType::parse("squishy"), None);
        assert_eq!(BodyType::Kinematic.name(), "kinematic");
    }
}
