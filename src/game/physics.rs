//! Rigid bodies and the physics world seam.
//!
//! The tick core only talks to [`PhysicsWorld`] and mutates [`Body`] state
//! directly. [`ArenaWorld`] is the built-in fixed-step integrator: boxes with
//! circle-approximated ship-to-ship contacts, no static geometry.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::DVec2;

use crate::config::RaceConfig;

use super::slots::Slots;

pub type BodyId = u64;
pub type WorldId = u64;

/// Box collision shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HullBox {
    pub width: f64,
    pub height: f64,
}

impl HullBox {
    /// Radius used for contact tests
    pub fn bounding_radius(&self) -> f64 {
        self.width.max(self.height) * 0.5
    }

    /// Moment of inertia of a solid box
    pub fn inertia(&self, mass: f64) -> f64 {
        mass * (self.width * self.width + self.height * self.height) / 12.0
    }

    fn aabb(&self, position: DVec2, angle: f64) -> Aabb {
        let (sin, cos) = angle.sin_cos();
        let half = DVec2::new(self.width, self.height) * 0.5;
        let extent = DVec2::new(
            (half.x * cos).abs() + (half.y * sin).abs(),
            (half.x * sin).abs() + (half.y * cos).abs(),
        );
        Aabb {
            min: position - extent,
            max: position + extent,
        }
    }
}

/// Axis-aligned bounds cached by the world after each step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec2,
    pub max: DVec2,
}

impl Aabb {
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SleepState {
    #[default]
    Awake,
    Sleepy,
    Sleeping,
}

/// Notifications a world delivers to body listeners
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyEvent {
    Collision { other: BodyId },
    FellAsleep,
}

pub type BodyListener = Arc<dyn Fn(BodyId, &BodyEvent) + Send + Sync>;

/// Per-class body parameters. These survive [`Body::reset`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodySpec {
    pub mass: f64,
    pub shape: HullBox,
    pub damping: f64,
    pub angular_damping: f64,
    pub fixed_rotation: bool,
}

impl BodySpec {
    /// Ship hull. Linear damping stays at zero: drag is applied per tick by
    /// the tick core instead.
    pub fn ship(config: &RaceConfig) -> Self {
        Self {
            mass: config.ship_mass,
            shape: HullBox {
                width: config.hull_width,
                height: config.hull_height,
            },
            damping: 0.0,
            angular_damping: 0.0,
            fixed_rotation: true,
        }
    }
}

#[derive(Clone)]
pub struct Body {
    pub id: BodyId,
    /// World this body is attached to
    pub world: Option<WorldId>,

    // Class invariants
    pub mass: f64,
    pub inv_mass: f64,
    pub inertia: f64,
    pub inv_inertia: f64,
    pub shape: HullBox,
    pub damping: f64,
    pub angular_damping: f64,
    pub fixed_rotation: bool,

    pub position: DVec2,
    pub previous_position: DVec2,
    pub interpolated_position: DVec2,
    pub velocity: DVec2,
    pub angle: f64,
    pub previous_angle: f64,
    pub interpolated_angle: f64,
    pub angular_velocity: f64,

    pub force: DVec2,
    pub torque: f64,

    /// Constraint velocities from the last contact solve
    pub vlambda: DVec2,
    pub wlambda: f64,

    pub sleep_state: SleepState,
    pub idle_time: f64,
    pub time_last_sleepy: f64,
    pub wants_wake: bool,

    /// Broad-phase bounds, `None` until the next step
    pub aabb: Option<Aabb>,

    listeners: Vec<BodyListener>,
}

impl Body {
    pub fn new(id: BodyId, spec: &BodySpec) -> Self {
        let inertia = if spec.fixed_rotation {
            0.0
        } else {
            spec.shape.inertia(spec.mass)
        };
        Self {
            id,
            world: None,
            mass: spec.mass,
            inv_mass: if spec.mass > 0.0 { 1.0 / spec.mass } else { 0.0 },
            inertia,
            inv_inertia: if inertia > 0.0 { 1.0 / inertia } else { 0.0 },
            shape: spec.shape,
            damping: spec.damping,
            angular_damping: spec.angular_damping,
            fixed_rotation: spec.fixed_rotation,
            position: DVec2::ZERO,
            previous_position: DVec2::ZERO,
            interpolated_position: DVec2::ZERO,
            velocity: DVec2::ZERO,
            angle: 0.0,
            previous_angle: 0.0,
            interpolated_angle: 0.0,
            angular_velocity: 0.0,
            force: DVec2::ZERO,
            torque: 0.0,
            vlambda: DVec2::ZERO,
            wlambda: 0.0,
            sleep_state: SleepState::Awake,
            idle_time: 0.0,
            time_last_sleepy: 0.0,
            wants_wake: false,
            aabb: None,
            listeners: Vec::new(),
        }
    }

    /// Wipe everything a previous occupant or tick could have left behind.
    ///
    /// Mass, inertia, shape, damping and `fixed_rotation` are class invariants
    /// and are kept. The body comes back detached; callers re-attach it.
    pub fn reset(&mut self, fresh_id: BodyId) {
        self.listeners.clear();
        self.id = fresh_id;
        self.world = None;

        self.position = DVec2::ZERO;
        self.velocity = DVec2::ZERO;
        self.interpolated_position = DVec2::ZERO;
        self.previous_position = DVec2::ZERO;

        self.angle = 0.0;
        self.previous_angle = 0.0;
        self.interpolated_angle = 0.0;
        self.angular_velocity = 0.0;

        self.force = DVec2::ZERO;
        self.torque = 0.0;
        self.vlambda = DVec2::ZERO;
        self.wlambda = 0.0;

        self.idle_time = 0.0;
        self.time_last_sleepy = 0.0;
        self.aabb = None;
        self.wants_wake = false;
    }

    pub fn add_listener(&mut self, listener: BodyListener) {
        self.listeners.push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn notify(&self, event: &BodyEvent) {
        for listener in &self.listeners {
            listener(self.id, event);
        }
    }

    /// Ask the world to wake this body at the start of the next step
    pub fn wake_up(&mut self) {
        self.wants_wake = true;
    }

    /// Local vector rotated into world space
    pub fn to_world_frame(&self, local: DVec2) -> DVec2 {
        DVec2::from_angle(self.angle).rotate(local)
    }

    /// Accumulate a force given in the body's local frame
    pub fn apply_force_local(&mut self, local: DVec2) {
        self.force += self.to_world_frame(local);
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("id", &self.id)
            .field("world", &self.world)
            .field("mass", &self.mass)
            .field("shape", &self.shape)
            .field("position", &self.position)
            .field("velocity", &self.velocity)
            .field("angle", &self.angle)
            .field("force", &self.force)
            .field("sleep_state", &self.sleep_state)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

/// Caller-owned pool of bodies, one per slot.
///
/// The pool outlives individual ticks. Clone it to run a speculative branch.
#[derive(Debug, Clone, Default)]
pub struct BodyPool {
    bodies: Slots<Body>,
    next_id: BodyId,
}

impl BodyPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> BodyId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn get(&self, slot: usize) -> Option<&Body> {
        self.bodies.get(slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Body> {
        self.bodies.get_mut(slot)
    }

    pub fn contains(&self, slot: usize) -> bool {
        self.bodies.contains(slot)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Body)> {
        self.bodies.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut Body)> {
        self.bodies.iter_mut()
    }

    /// Allocate a new detached body at `slot`, replacing any previous one
    pub fn allocate(&mut self, slot: usize, spec: &BodySpec) -> &mut Body {
        let id = self.allocate_id();
        self.bodies.replace(slot, Body::new(id, spec))
    }

    /// Reset the body at `slot` in place under a fresh id
    pub fn reset(&mut self, slot: usize) -> Option<&mut Body> {
        if !self.bodies.contains(slot) {
            return None;
        }
        let id = self.allocate_id();
        let body = self.bodies.get_mut(slot)?;
        body.reset(id);
        Some(body)
    }

    /// Reset the body at `slot`, or allocate one if the slot has none
    pub fn reset_or_allocate(&mut self, slot: usize, spec: &BodySpec) -> &mut Body {
        if self.bodies.contains(slot) {
            let id = self.allocate_id();
            let body = self.bodies.get_or_insert_with(slot, || Body::new(id, spec));
            body.reset(id);
            body
        } else {
            self.allocate(slot, spec)
        }
    }
}

/// Black-box 2D dynamics solver driven by the tick core
pub trait PhysicsWorld {
    fn id(&self) -> WorldId;

    /// Attach a body so the next step simulates it
    fn attach(&mut self, body: &mut Body) {
        body.world = Some(self.id());
    }

    /// Advance every attached body by `dt` seconds
    fn step(&mut self, pool: &mut BodyPool, dt: f64);
}

static NEXT_WORLD_ID: AtomicU64 = AtomicU64::new(1);

/// Built-in integrator: semi-implicit Euler plus pairwise ship contacts
#[derive(Debug, Clone)]
pub struct ArenaWorld {
    id: WorldId,
    /// Simulated seconds since creation
    pub time: f64,
    /// Bounciness of ship-to-ship contacts
    pub restitution: f64,
    /// Speed below which a body counts as idle
    pub sleep_speed_limit: f64,
    /// Seconds a body must stay sleepy before it sleeps
    pub sleep_time_limit: f64,
}

impl Default for ArenaWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ArenaWorld {
    pub fn new() -> Self {
        Self {
            id: NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed),
            time: 0.0,
            restitution: 0.4,
            sleep_speed_limit: 0.2,
            sleep_time_limit: 1.0,
        }
    }

    fn integrate(body: &mut Body, dt: f64) {
        if body.wants_wake {
            body.sleep_state = SleepState::Awake;
            body.wants_wake = false;
        }

        body.previous_position = body.position;
        body.previous_angle = body.angle;

        if body.sleep_state != SleepState::Sleeping {
            body.velocity += body.force * body.inv_mass * dt;
            if body.damping > 0.0 {
                body.velocity *= (1.0 - body.damping).powf(dt);
            }
            if body.fixed_rotation {
                body.angular_velocity = 0.0;
            } else {
                body.angular_velocity += body.torque * body.inv_inertia * dt;
                if body.angular_damping > 0.0 {
                    body.angular_velocity *= (1.0 - body.angular_damping).powf(dt);
                }
            }

            body.position += body.velocity * dt;
            body.angle += body.angular_velocity * dt;
        }

        body.interpolated_position = body.position;
        body.interpolated_angle = body.angle;
        body.aabb = Some(body.shape.aabb(body.position, body.angle));
        body.force = DVec2::ZERO;
        body.torque = 0.0;
    }

    /// Push overlapping pairs apart and exchange normal velocity
    fn solve_contacts(&self, pool: &mut BodyPool, attached: &[usize]) {
        for (_, body) in pool.iter_mut() {
            body.vlambda = DVec2::ZERO;
            body.wlambda = 0.0;
        }

        for (i, &a) in attached.iter().enumerate() {
            for &b in &attached[i + 1..] {
                let (Some(first), Some(second)) = (pool.get(a), pool.get(b)) else {
                    continue;
                };
                let (Some(box_a), Some(box_b)) = (first.aabb, second.aabb) else {
                    continue;
                };
                if !box_a.overlaps(&box_b) {
                    continue;
                }

                let delta = second.position - first.position;
                let dist = delta.length();
                let reach = first.shape.bounding_radius() + second.shape.bounding_radius();
                if dist >= reach {
                    continue;
                }

                let normal = if dist < 1e-9 { DVec2::X } else { delta / dist };
                let overlap = reach - dist;
                let closing = (second.velocity - first.velocity).dot(normal);
                let inv_sum = first.inv_mass + second.inv_mass;
                let impulse = if closing < 0.0 && inv_sum > 0.0 {
                    -(1.0 + self.restitution) * closing / inv_sum
                } else {
                    0.0
                };
                let (id_a, id_b) = (first.id, second.id);
                let (inv_a, inv_b) = (first.inv_mass, second.inv_mass);

                if let Some(first) = pool.get_mut(a) {
                    first.position -= normal * overlap * 0.5;
                    first.vlambda -= normal * impulse * inv_a;
                    first.sleep_state = SleepState::Awake;
                    first.notify(&BodyEvent::Collision { other: id_b });
                }
                if let Some(second) = pool.get_mut(b) {
                    second.position += normal * overlap * 0.5;
                    second.vlambda += normal * impulse * inv_b;
                    second.sleep_state = SleepState::Awake;
                    second.notify(&BodyEvent::Collision { other: id_a });
                }
            }
        }

        for &slot in attached {
            if let Some(body) = pool.get_mut(slot) {
                body.velocity += body.vlambda;
                body.interpolated_position = body.position;
            }
        }
    }

    fn update_sleep(&self, body: &mut Body, dt: f64) {
        if body.velocity.length_squared() >= self.sleep_speed_limit * self.sleep_speed_limit {
            body.idle_time = 0.0;
            body.sleep_state = SleepState::Awake;
            return;
        }

        body.idle_time += dt;
        match body.sleep_state {
            SleepState::Awake => {
                body.sleep_state = SleepState::Sleepy;
                body.time_last_sleepy = self.time;
            }
            SleepState::Sleepy if self.time - body.time_last_sleepy > self.sleep_time_limit => {
                body.sleep_state = SleepState::Sleeping;
                body.velocity = DVec2::ZERO;
                body.notify(&BodyEvent::FellAsleep);
            }
            _ => {}
        }
    }
}

impl PhysicsWorld for ArenaWorld {
    fn id(&self) -> WorldId {
        self.id
    }

    fn step(&mut self, pool: &mut BodyPool, dt: f64) {
        let attached: Vec<usize> = pool
            .iter()
            .filter(|(_, body)| body.world == Some(self.id))
            .map(|(slot, _)| slot)
            .collect();

        for &slot in &attached {
            if let Some(body) = pool.get_mut(slot) {
                Self::integrate(body, dt);
            }
        }

        self.solve_contacts(pool, &attached);
        self.time += dt;

        for &slot in &attached {
            if let Some(body) = pool.get_mut(slot) {
                self.update_sleep(body, dt);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn spec() -> BodySpec {
        BodySpec {
            mass: 2.0,
            shape: HullBox {
                width: 4.0,
                height: 8.0,
            },
            damping: 0.1,
            angular_damping: 0.3,
            fixed_rotation: true,
        }
    }

    #[test]
    fn reset_clears_state_and_keeps_class() {
        let mut pool = BodyPool::new();
        let mut world = ArenaWorld::new();
        let body = pool.allocate(0, &spec());
        world.attach(body);
        body.position = DVec2::new(3.0, 4.0);
        body.previous_position = DVec2::new(2.0, 4.0);
        body.interpolated_position = DVec2::new(2.5, 4.0);
        body.velocity = DVec2::new(1.0, -1.0);
        body.angle = 1.0;
        body.previous_angle = 0.5;
        body.interpolated_angle = 0.75;
        body.angular_velocity = 2.0;
        body.force = DVec2::new(10.0, 0.0);
        body.torque = 1.5;
        body.vlambda = DVec2::new(0.1, 0.2);
        body.wlambda = 0.3;
        body.idle_time = 4.0;
        body.time_last_sleepy = 9.0;
        body.aabb = Some(Aabb {
            min: DVec2::ZERO,
            max: DVec2::ONE,
        });
        body.wants_wake = true;
        body.add_listener(Arc::new(|_, _| {}));
        let old_id = body.id;
        let (mass, inertia, shape, damping, angular_damping) = (
            body.mass,
            body.inertia,
            body.shape,
            body.damping,
            body.angular_damping,
        );

        let body = pool.reset(0).unwrap();

        assert_ne!(body.id, old_id);
        assert_eq!(body.world, None);
        assert_eq!(body.listener_count(), 0);
        assert_eq!(body.position, DVec2::ZERO);
        assert_eq!(body.previous_position, DVec2::ZERO);
        assert_eq!(body.interpolated_position, DVec2::ZERO);
        assert_eq!(body.velocity, DVec2::ZERO);
        assert_eq!(body.angle, 0.0);
        assert_eq!(body.previous_angle, 0.0);
        assert_eq!(body.interpolated_angle, 0.0);
        assert_eq!(body.angular_velocity, 0.0);
        assert_eq!(body.force, DVec2::ZERO);
        assert_eq!(body.torque, 0.0);
        assert_eq!(body.vlambda, DVec2::ZERO);
        assert_eq!(body.wlambda, 0.0);
        assert_eq!(body.idle_time, 0.0);
        assert_eq!(body.time_last_sleepy, 0.0);
        assert_eq!(body.aabb, None);
        assert!(!body.wants_wake);

        assert_eq!(body.mass, mass);
        assert_eq!(body.inertia, inertia);
        assert_eq!(body.shape, shape);
        assert_eq!(body.damping, damping);
        assert_eq!(body.angular_damping, angular_damping);
        assert!(body.fixed_rotation);
    }

    #[test]
    fn step_integrates_force_and_clears_it() {
        let mut pool = BodyPool::new();
        let mut world = ArenaWorld::new();
        let body = pool.allocate(0, &BodySpec { damping: 0.0, ..spec() });
        world.attach(body);
        body.force = DVec2::new(4.0, 0.0);

        world.step(&mut pool, 0.5);

        let body = pool.get(0).unwrap();
        // a = F / m = 2, v = 1, x = 0.5
        assert_eq!(body.velocity, DVec2::new(1.0, 0.0));
        assert_eq!(body.position, DVec2::new(0.5, 0.0));
        assert_eq!(body.previous_position, DVec2::ZERO);
        assert_eq!(body.force, DVec2::ZERO);
        assert!(body.aabb.is_some());
    }

    #[test]
    fn detached_bodies_are_not_stepped() {
        let mut pool = BodyPool::new();
        let mut world = ArenaWorld::new();
        let body = pool.allocate(0, &spec());
        body.velocity = DVec2::new(1.0, 0.0);

        world.step(&mut pool, 1.0);

        assert_eq!(pool.get(0).unwrap().position, DVec2::ZERO);
    }

    #[test]
    fn overlapping_bodies_separate_and_notify() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut pool = BodyPool::new();
        let mut world = ArenaWorld::new();
        for (slot, x) in [(0, 0.0), (1, 2.0)] {
            let body = pool.allocate(slot, &spec());
            world.attach(body);
            body.position = DVec2::new(x, 0.0);
            let hits = hits.clone();
            body.add_listener(Arc::new(move |_, event| {
                if matches!(event, BodyEvent::Collision { .. }) {
                    hits.fetch_add(1, Ordering::Relaxed);
                }
            }));
        }

        world.step(&mut pool, 0.01);

        let a = pool.get(0).unwrap().position;
        let b = pool.get(1).unwrap().position;
        assert!((b - a).length() >= 8.0 - 1e-9);
        assert_eq!(hits.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn local_force_follows_heading() {
        let mut body = Body::new(0, &spec());
        body.angle = std::f64::consts::FRAC_PI_2;
        body.apply_force_local(DVec2::new(1.0, 0.0));
        assert!((body.force - DVec2::new(0.0, 1.0)).length() < 1e-12);
    }
}
