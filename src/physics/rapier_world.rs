/// Physics integration with Rapier
///
/// Provides:
/// - `PhysicsWorld` implementation on top of rapier3d
/// - Layer filtering through interaction groups built from the layer matrix
/// - Begin / Stay / End contact and trigger events by diffing touching pairs
///   after every step
///
/// Every body owns exactly one collider; compound shapes become one rapier
/// compound collider and the child index is the sub-shape id.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use glam::{DVec3, Quat, Vec3};
use nalgebra as na;
use rapier3d::parry::query::ShapeCastOptions;
use rapier3d::parry::shape::{Ball, Capsule, Cuboid, Shape};
use rapier3d::prelude::*;
use tracing::{debug, warn};

use super::body_settings::{BodySettings, MotionType};
use super::events::{BodyCallbacks, CollisionEvent, ContactEventType, TriggerEvent};
use super::layers::{Layer, LayerMatrix};
use super::query::{QueryFilter, RayHit, RaycastOptions, SweepHit};
use super::shape::CollisionShape;
use super::{BodyId, BodyTransform, DebugBodyView, PhysicsWorld};
use crate::error::PhysicsError;

/// Points per ring when a tapered cylinder is approximated by a convex hull
const TAPERED_RING_POINTS: usize = 16;

#[derive(Debug, Clone)]
struct BodyRecord {
    handle: RigidBodyHandle,
    collider: ColliderHandle,
    shape: CollisionShape,
    motion_type: MotionType,
    layer: Layer,
    user_data: u64,
    is_sensor: bool,
}

/// Normalised pair key, lower body id first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PairKey {
    body_a: BodyId,
    body_b: BodyId,
    sub_a: u32,
    sub_b: u32,
}

#[derive(Debug, Clone, Copy)]
struct ContactSnapshot {
    point: Vec3,
    /// Points from body_a towards body_b
    normal: Vec3,
    penetration: f32,
}

/// Physics world wrapper
pub struct RapierPhysicsWorld {
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub gravity: Vector<Real>,
    pub integration_params: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub query_pipeline: QueryPipeline,

    bodies: HashMap<BodyId, BodyRecord>,
    next_body_id: u32,
    layer_matrix: LayerMatrix,
    callbacks: HashMap<BodyId, BodyCallbacks>,
    contacts: BTreeMap<PairKey, ContactSnapshot>,
    triggers: BTreeSet<(BodyId, BodyId)>,
}

impl Default for RapierPhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl RapierPhysicsWorld {
    /// Create a world with zero gravity and a 60 Hz default step
    pub fn new() -> Self {
        let mut integration_params = IntegrationParameters::default();
        integration_params.dt = 1.0 / 60.0;

        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            gravity: vector![0.0, 0.0, 0.0],
            integration_params,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            bodies: HashMap::new(),
            next_body_id: 1,
            layer_matrix: LayerMatrix::new(),
            callbacks: HashMap::new(),
            contacts: BTreeMap::new(),
            triggers: BTreeSet::new(),
        }
    }

    pub fn with_gravity(gravity: Vec3) -> Self {
        let mut world = Self::new();
        world.gravity = vec3_to_vector(gravity);
        world
    }

    pub fn layer_matrix(&self) -> &LayerMatrix {
        &self.layer_matrix
    }

    fn record(&self, id: BodyId) -> Option<&BodyRecord> {
        self.bodies.get(&id)
    }

    fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.record(id).and_then(|r| self.rigid_body_set.get(r.handle))
    }

    fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        let handle = self.bodies.get(&id)?.handle;
        self.rigid_body_set.get_mut(handle)
    }

    fn interaction_groups(&self, layer: Layer) -> InteractionGroups {
        InteractionGroups::new(
            Group::from_bits_truncate(layer.bit()),
            Group::from_bits_truncate(self.layer_matrix.row(layer)),
        )
    }

    fn body_id_of_collider(&self, handle: ColliderHandle) -> BodyId {
        self.collider_set
            .get(handle)
            .map(|c| BodyId(c.user_data as u32))
            .unwrap_or(BodyId::INVALID)
    }

    fn accepts_collider(&self, filter: &QueryFilter, collider: &Collider) -> bool {
        let id = BodyId(collider.user_data as u32);
        match self.record(id) {
            Some(record) => filter.accepts(id, record.layer, record.is_sensor),
            None => false,
        }
    }

    fn refresh_queries(&mut self) {
        self.rigid_body_set
            .propagate_modified_body_positions_to_colliders(&mut self.collider_set);
        self.query_pipeline.update(&self.collider_set);
    }

    fn build_shape(shape: &CollisionShape) -> Result<(SharedShape, Isometry<Real>), PhysicsError> {
        match shape {
            CollisionShape::Plane { normal, offset } => {
                let n = normalize_nonzero(*normal).ok_or_else(|| {
                    PhysicsError::UnsupportedShape("plane normal must be non-zero".into())
                })?;
                if !offset.is_finite() {
                    return Err(PhysicsError::UnsupportedShape("plane offset must be finite".into()));
                }
                let axis = na::Unit::new_normalize(vec3_to_vector(n));
                let local = Isometry::translation(n.x * offset, n.y * offset, n.z * offset);
                Ok((SharedShape::halfspace(axis), local))
            }
            CollisionShape::Compound { children } => {
                if children.is_empty() {
                    return Err(PhysicsError::UnsupportedShape("compound has no children".into()));
                }
                let mut parts = Vec::with_capacity(children.len());
                for (i, child) in children.iter().enumerate() {
                    if matches!(
                        child.shape,
                        CollisionShape::Plane { .. } | CollisionShape::Compound { .. }
                    ) {
                        return Err(PhysicsError::UnsupportedShape(format!(
                            "compound child {} cannot be a {}",
                            i,
                            child.shape.kind_name()
                        )));
                    }
                    let child_shape = Self::build_convex(&child.shape)?;
                    parts.push((glam_to_isometry(child.position, child.rotation), child_shape));
                }
                Ok((SharedShape::compound(parts), Isometry::identity()))
            }
            other => Ok((Self::build_convex(other)?, Isometry::identity())),
        }
    }

    fn build_convex(shape: &CollisionShape) -> Result<SharedShape, PhysicsError> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        let unsupported = |what: &str| PhysicsError::UnsupportedShape(what.to_string());
        match shape {
            CollisionShape::Box { half_extents } => {
                if !(positive(half_extents.x) && positive(half_extents.y) && positive(half_extents.z)) {
                    return Err(unsupported("box half extents must be positive"));
                }
                Ok(SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z))
            }
            CollisionShape::Sphere { radius } => {
                if !positive(*radius) {
                    return Err(unsupported("sphere radius must be positive"));
                }
                Ok(SharedShape::ball(*radius))
            }
            CollisionShape::Capsule { radius, half_height } => {
                if !positive(*radius) || !(half_height.is_finite() && *half_height >= 0.0) {
                    return Err(unsupported("capsule dimensions out of range"));
                }
                Ok(SharedShape::capsule_y(*half_height, *radius))
            }
            CollisionShape::Cylinder { radius, half_height } => {
                if !positive(*radius) || !positive(*half_height) {
                    return Err(unsupported("cylinder dimensions must be positive"));
                }
                Ok(SharedShape::cylinder(*half_height, *radius))
            }
            CollisionShape::TaperedCylinder {
                half_height,
                top_radius,
                bottom_radius,
            } => {
                let valid_radius = |r: f32| r.is_finite() && r >= 0.0;
                if !positive(*half_height)
                    || !valid_radius(*top_radius)
                    || !valid_radius(*bottom_radius)
                    || (*top_radius <= 0.0 && *bottom_radius <= 0.0)
                {
                    return Err(unsupported("tapered cylinder dimensions out of range"));
                }
                if (top_radius - bottom_radius).abs() <= f32::EPSILON {
                    return Ok(SharedShape::cylinder(*half_height, *top_radius));
                }
                let mut points = Vec::with_capacity(TAPERED_RING_POINTS * 2);
                push_ring(&mut points, *half_height, *top_radius);
                push_ring(&mut points, -*half_height, *bottom_radius);
                SharedShape::convex_hull(&points)
                    .ok_or_else(|| unsupported("tapered cylinder hull failed"))
            }
            CollisionShape::Plane { .. } | CollisionShape::Compound { .. } => {
                Err(unsupported("shape is not convex"))
            }
        }
    }

    /// Child index of a compound collider closest to a collider-local point
    fn closest_sub_shape(collider: &Collider, local_point: &Point<Real>) -> u32 {
        let Some(compound) = collider.shape().as_compound() else {
            return 0;
        };
        let mut best = (0u32, Real::MAX);
        for (i, (iso, child)) in compound.shapes().iter().enumerate() {
            let p = iso.inverse_transform_point(local_point);
            let d = child.distance_to_local_point(&p, true);
            if d < best.1 {
                best = (i as u32, d);
            }
        }
        best.0
    }

    fn ray_sub_shape(collider: &Collider, ray: &Ray, max_toi: Real, solid: bool) -> u32 {
        let Some(compound) = collider.shape().as_compound() else {
            return 0;
        };
        let mut best = (0u32, Real::MAX);
        for (i, (iso, child)) in compound.shapes().iter().enumerate() {
            let m = collider.position() * iso;
            if let Some(toi) = child.cast_ray(&m, ray, max_toi, solid) {
                if toi < best.1 {
                    best = (i as u32, toi);
                }
            }
        }
        best.0
    }

    fn sweep(
        &self,
        shape: &dyn Shape,
        start: DVec3,
        rotation: Quat,
        direction: Vec3,
        distance: f32,
        filter: &QueryFilter,
    ) -> SweepHit {
        let Some(dir) = normalize_nonzero(direction) else {
            return SweepHit::default();
        };
        if !(distance > 0.0) || !distance.is_finite() {
            return SweepHit::default();
        }

        let predicate = |_: ColliderHandle, c: &Collider| self.accepts_collider(filter, c);
        let rapier_filter = rapier3d::pipeline::QueryFilter::default().predicate(&predicate);
        let pos = glam_to_isometry(start.as_vec3(), rotation);
        let vel = vec3_to_vector(dir);
        let options = ShapeCastOptions {
            max_time_of_impact: distance,
            target_distance: 0.0,
            stop_at_penetration: true,
            compute_impact_geometry_on_penetration: true,
        };

        let Some((handle, hit)) = self.query_pipeline.cast_shape(
            &self.rigid_body_set,
            &self.collider_set,
            &pos,
            &vel,
            shape,
            options,
            rapier_filter,
        ) else {
            return SweepHit::default();
        };
        let Some(collider) = self.collider_set.get(handle) else {
            return SweepHit::default();
        };

        let body_id = BodyId(collider.user_data as u32);
        let world_point = collider.position() * hit.witness1;
        let world_normal = collider.position().rotation * hit.normal1.into_inner();
        SweepHit {
            hit: true,
            position: point_to_vec3(&world_point),
            normal: vector_to_vec3(&world_normal),
            distance: hit.time_of_impact,
            fraction: (hit.time_of_impact / distance).clamp(0.0, 1.0),
            body_id,
            sub_shape_id: Self::closest_sub_shape(collider, &hit.witness1),
            layer: self.record(body_id).map(|r| r.layer).unwrap_or_default(),
        }
    }

    fn overlap(&self, shape: &dyn Shape, pos: Isometry<Real>, filter: &QueryFilter) -> Vec<BodyId> {
        let predicate = |_: ColliderHandle, c: &Collider| self.accepts_collider(filter, c);
        let rapier_filter = rapier3d::pipeline::QueryFilter::default().predicate(&predicate);
        let mut found = BTreeSet::new();
        self.query_pipeline.intersections_with_shape(
            &self.rigid_body_set,
            &self.collider_set,
            &pos,
            shape,
            rapier_filter,
            |handle| {
                let id = self.body_id_of_collider(handle);
                if id.is_valid() {
                    found.insert(id);
                }
                true
            },
        );
        found.into_iter().collect()
    }

    /// Snapshot every touching solid sub-shape pair
    fn gather_contacts(&self) -> BTreeMap<PairKey, ContactSnapshot> {
        let mut current = BTreeMap::new();
        for pair in self.narrow_phase.contact_pairs() {
            if !pair.has_any_active_contact {
                continue;
            }
            let id1 = self.body_id_of_collider(pair.collider1);
            let id2 = self.body_id_of_collider(pair.collider2);
            if !id1.is_valid() || !id2.is_valid() {
                continue;
            }
            let pos1 = match self.collider_set.get(pair.collider1) {
                Some(c) => *c.position(),
                None => continue,
            };

            for manifold in &pair.manifolds {
                let (point, dist) = if let Some(sc) = manifold.data.solver_contacts.first() {
                    (sc.point, sc.dist)
                } else if let Some(tc) = manifold.points.iter().find(|p| p.dist <= 0.0) {
                    (pos1 * tc.local_p1, tc.dist)
                } else {
                    continue;
                };

                let normal = vector_to_vec3(&manifold.data.normal);
                let snapshot = ContactSnapshot {
                    point: point_to_vec3(&point),
                    normal,
                    penetration: (-dist).max(0.0),
                };
                let key = if id1 <= id2 {
                    PairKey {
                        body_a: id1,
                        body_b: id2,
                        sub_a: manifold.subshape1,
                        sub_b: manifold.subshape2,
                    }
                } else {
                    PairKey {
                        body_a: id2,
                        body_b: id1,
                        sub_a: manifold.subshape2,
                        sub_b: manifold.subshape1,
                    }
                };
                let snapshot = if id1 <= id2 {
                    snapshot
                } else {
                    ContactSnapshot {
                        normal: -snapshot.normal,
                        ..snapshot
                    }
                };
                current.entry(key).or_insert(snapshot);
            }
        }
        current
    }

    fn gather_triggers(&self) -> BTreeSet<(BodyId, BodyId)> {
        let mut current = BTreeSet::new();
        for (c1, c2, intersecting) in self.narrow_phase.intersection_pairs() {
            if !intersecting {
                continue;
            }
            let a = self.body_id_of_collider(c1);
            let b = self.body_id_of_collider(c2);
            if a.is_valid() && b.is_valid() {
                current.insert((a.min(b), a.max(b)));
            }
        }
        current
    }

    fn collision_event(&self, kind: ContactEventType, key: &PairKey, snap: &ContactSnapshot) -> CollisionEvent {
        let a = self.record(key.body_a);
        let b = self.record(key.body_b);
        CollisionEvent {
            event_type: kind,
            self_body: key.body_a,
            other_body: key.body_b,
            self_sub_shape: key.sub_a,
            other_sub_shape: key.sub_b,
            point: snap.point,
            normal: snap.normal,
            penetration_depth: snap.penetration,
            self_user_data: a.map(|r| r.user_data).unwrap_or(0),
            other_user_data: b.map(|r| r.user_data).unwrap_or(0),
            self_layer: a.map(|r| r.layer).unwrap_or_default(),
            other_layer: b.map(|r| r.layer).unwrap_or_default(),
        }
    }

    fn trigger_event(&self, kind: ContactEventType, a: BodyId, b: BodyId) -> TriggerEvent {
        let ra = self.record(a);
        let rb = self.record(b);
        TriggerEvent {
            event_type: kind,
            self_body: a,
            other_body: b,
            self_sub_shape: 0,
            other_sub_shape: 0,
            self_user_data: ra.map(|r| r.user_data).unwrap_or(0),
            other_user_data: rb.map(|r| r.user_data).unwrap_or(0),
            self_layer: ra.map(|r| r.layer).unwrap_or_default(),
            other_layer: rb.map(|r| r.layer).unwrap_or_default(),
        }
    }

    /// Diff touching pairs against the previous step and dispatch callbacks
    fn dispatch_events(&mut self) {
        let current = self.gather_contacts();
        let mut collisions = Vec::new();
        for (key, snap) in &current {
            let kind = if self.contacts.contains_key(key) {
                ContactEventType::Stay
            } else {
                ContactEventType::Begin
            };
            collisions.push(self.collision_event(kind, key, snap));
        }
        for (key, snap) in &self.contacts {
            if !current.contains_key(key) {
                collisions.push(self.collision_event(ContactEventType::End, key, snap));
            }
        }
        self.contacts = current;

        let current_triggers = self.gather_triggers();
        let mut triggers = Vec::new();
        for &(a, b) in &current_triggers {
            let kind = if self.triggers.contains(&(a, b)) {
                ContactEventType::Stay
            } else {
                ContactEventType::Begin
            };
            triggers.push(self.trigger_event(kind, a, b));
        }
        for &(a, b) in &self.triggers {
            if !current_triggers.contains(&(a, b)) {
                triggers.push(self.trigger_event(ContactEventType::End, a, b));
            }
        }
        self.triggers = current_triggers;

        if self.callbacks.is_empty() {
            return;
        }
        for event in &collisions {
            self.deliver_collision(event);
            self.deliver_collision(&event.mirrored());
        }
        for event in &triggers {
            self.deliver_trigger(event);
            self.deliver_trigger(&event.mirrored());
        }
    }

    fn deliver_collision(&mut self, event: &CollisionEvent) {
        if let Some(cb) = self
            .callbacks
            .get_mut(&event.self_body)
            .and_then(|c| c.on_collision.as_mut())
        {
            cb(event);
        }
    }

    fn deliver_trigger(&mut self, event: &TriggerEvent) {
        if let Some(cb) = self
            .callbacks
            .get_mut(&event.self_body)
            .and_then(|c| c.on_trigger.as_mut())
        {
            cb(event);
        }
    }
}

impl PhysicsWorld for RapierPhysicsWorld {
    fn step(&mut self, dt: f32) {
        if !(dt > 0.0) || !dt.is_finite() {
            return;
        }
        self.integration_params.dt = dt;

        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );

        // Forces apply for a single step.
        for (_, body) in self.rigid_body_set.iter_mut() {
            body.reset_forces(false);
            body.reset_torques(false);
        }

        self.query_pipeline.update(&self.collider_set);
        self.dispatch_events();
    }

    fn create_body(&mut self, settings: &BodySettings) -> Result<BodyId, PhysicsError> {
        if !crate::world::is_finite(settings.position) {
            return Err(PhysicsError::InvalidSettings("position is not finite".into()));
        }
        if matches!(settings.shape, CollisionShape::Plane { .. }) && settings.motion_type != MotionType::Static {
            return Err(PhysicsError::InvalidSettings(
                "plane shapes require a static body".into(),
            ));
        }
        if settings.motion_type == MotionType::Dynamic && !(settings.mass.is_finite() && settings.mass > 0.0) {
            return Err(PhysicsError::InvalidSettings(format!(
                "dynamic body mass must be positive, got {}",
                settings.mass
            )));
        }
        if settings.layer.index() >= super::layers::LAYER_COUNT {
            return Err(PhysicsError::InvalidSettings(format!(
                "layer {} out of range",
                settings.layer.0
            )));
        }

        let (shape, collider_offset) = Self::build_shape(&settings.shape)?;

        let id = BodyId(self.next_body_id);
        self.next_body_id = self.next_body_id.wrapping_add(1).max(1);

        let rotation = crate::world::sanitize_rotation(settings.rotation);
        let builder = match settings.motion_type {
            MotionType::Static => RigidBodyBuilder::fixed(),
            MotionType::Kinematic => RigidBodyBuilder::kinematic_velocity_based(),
            MotionType::Dynamic => RigidBodyBuilder::dynamic(),
        };
        let mut builder = builder
            .position(glam_to_isometry(settings.position.as_vec3(), rotation))
            .linear_damping(settings.linear_damping.max(0.0))
            .angular_damping(settings.angular_damping.max(0.0))
            .gravity_scale(settings.gravity_scale)
            .can_sleep(settings.allow_sleeping)
            .user_data(id.0 as u128);
        if settings.motion_type != MotionType::Static {
            builder = builder
                .linvel(vec3_to_vector(settings.linear_velocity))
                .angvel(vec3_to_vector(settings.angular_velocity))
                .sleeping(!settings.start_active);
        }
        let handle = self.rigid_body_set.insert(builder.build());

        let mut collider = ColliderBuilder::new(shape)
            .position(collider_offset)
            .friction(settings.friction.max(0.0))
            .restitution(settings.restitution.max(0.0))
            .sensor(settings.is_sensor)
            .collision_groups(self.interaction_groups(settings.layer))
            .user_data(id.0 as u128);
        if settings.motion_type == MotionType::Dynamic {
            collider = collider.mass(settings.mass);
        }
        if settings.is_sensor {
            collider = collider.active_collision_types(ActiveCollisionTypes::all());
        }
        let collider = self
            .collider_set
            .insert_with_parent(collider.build(), handle, &mut self.rigid_body_set);

        self.bodies.insert(
            id,
            BodyRecord {
                handle,
                collider,
                shape: settings.shape.clone(),
                motion_type: settings.motion_type,
                layer: settings.layer,
                user_data: settings.user_data,
                is_sensor: settings.is_sensor,
            },
        );
        self.refresh_queries();

        debug!(
            "Created {} {} body {} on layer {}",
            settings.motion_type.name(),
            settings.shape.kind_name(),
            id.0,
            settings.layer.0
        );
        Ok(id)
    }

    fn destroy_body(&mut self, id: BodyId) {
        let Some(record) = self.bodies.remove(&id) else {
            return;
        };
        self.rigid_body_set.remove(
            record.handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
        self.callbacks.remove(&id);
        self.contacts.retain(|k, _| k.body_a != id && k.body_b != id);
        self.triggers.retain(|&(a, b)| a != id && b != id);
        self.query_pipeline.update(&self.collider_set);
    }

    fn is_body_valid(&self, id: BodyId) -> bool {
        id.is_valid() && self.bodies.contains_key(&id)
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn get_transform(&self, id: BodyId) -> BodyTransform {
        match self.body(id) {
            Some(rb) => BodyTransform {
                position: vector_to_dvec3(rb.translation()),
                rotation: unit_to_quat(rb.rotation()),
            },
            None => BodyTransform::default(),
        }
    }

    fn get_position(&self, id: BodyId) -> DVec3 {
        self.body(id)
            .map(|rb| vector_to_dvec3(rb.translation()))
            .unwrap_or(DVec3::ZERO)
    }

    fn get_rotation(&self, id: BodyId) -> Quat {
        self.body(id)
            .map(|rb| unit_to_quat(rb.rotation()))
            .unwrap_or(Quat::IDENTITY)
    }

    fn get_linear_velocity(&self, id: BodyId) -> Vec3 {
        self.body(id)
            .map(|rb| vector_to_vec3(rb.linvel()))
            .unwrap_or(Vec3::ZERO)
    }

    fn get_angular_velocity(&self, id: BodyId) -> Vec3 {
        self.body(id)
            .map(|rb| vector_to_vec3(rb.angvel()))
            .unwrap_or(Vec3::ZERO)
    }

    fn get_user_data(&self, id: BodyId) -> u64 {
        self.record(id).map(|r| r.user_data).unwrap_or(0)
    }

    fn get_layer(&self, id: BodyId) -> Layer {
        self.record(id).map(|r| r.layer).unwrap_or_default()
    }

    fn is_active(&self, id: BodyId) -> bool {
        self.body(id)
            .map(|rb| !rb.is_fixed() && !rb.is_sleeping())
            .unwrap_or(false)
    }

    fn set_position(&mut self, id: BodyId, position: DVec3) {
        if !crate::world::is_finite(position) {
            return;
        }
        if let Some(rb) = self.body_mut(id) {
            rb.set_translation(dvec3_to_vector(position), true);
            self.refresh_queries();
        }
    }

    fn set_rotation(&mut self, id: BodyId, rotation: Quat) {
        let rotation = crate::world::sanitize_rotation(rotation);
        if let Some(rb) = self.body_mut(id) {
            rb.set_rotation(quat_to_unit(rotation), true);
            self.refresh_queries();
        }
    }

    fn set_transform(&mut self, id: BodyId, position: DVec3, rotation: Quat) {
        if !crate::world::is_finite(position) {
            return;
        }
        let rotation = crate::world::sanitize_rotation(rotation);
        if let Some(rb) = self.body_mut(id) {
            rb.set_position(glam_to_isometry(position.as_vec3(), rotation), true);
            self.refresh_queries();
        }
    }

    fn set_linear_velocity(&mut self, id: BodyId, velocity: Vec3) {
        if !crate::world::is_finite_f(velocity) {
            return;
        }
        if let Some(rb) = self.body_mut(id) {
            rb.set_linvel(vec3_to_vector(velocity), true);
        }
    }

    fn set_angular_velocity(&mut self, id: BodyId, velocity: Vec3) {
        if !crate::world::is_finite_f(velocity) {
            return;
        }
        if let Some(rb) = self.body_mut(id) {
            rb.set_angvel(vec3_to_vector(velocity), true);
        }
    }

    fn add_force(&mut self, id: BodyId, force: Vec3) {
        if !crate::world::is_finite_f(force) {
            return;
        }
        if let Some(rb) = self.body_mut(id) {
            rb.add_force(vec3_to_vector(force), true);
        }
    }

    fn add_impulse(&mut self, id: BodyId, impulse: Vec3) {
        if !crate::world::is_finite_f(impulse) {
            return;
        }
        if let Some(rb) = self.body_mut(id) {
            rb.apply_impulse(vec3_to_vector(impulse), true);
        }
    }

    fn add_torque(&mut self, id: BodyId, torque: Vec3) {
        if !crate::world::is_finite_f(torque) {
            return;
        }
        if let Some(rb) = self.body_mut(id) {
            rb.add_torque(vec3_to_vector(torque), true);
        }
    }

    fn activate(&mut self, id: BodyId) {
        if let Some(rb) = self.body_mut(id) {
            rb.wake_up(true);
        }
    }

    fn deactivate(&mut self, id: BodyId) {
        if let Some(rb) = self.body_mut(id) {
            rb.sleep();
        }
    }

    fn set_user_data(&mut self, id: BodyId, user_data: u64) {
        if let Some(record) = self.bodies.get_mut(&id) {
            record.user_data = user_data;
        }
    }

    fn shift_origin(&mut self, delta_local: DVec3) {
        if !crate::world::is_finite(delta_local) || crate::world::is_zero(delta_local) {
            return;
        }
        for (_, rb) in self.rigid_body_set.iter_mut() {
            let shifted = vector_to_dvec3(rb.translation()) + delta_local;
            rb.set_translation(dvec3_to_vector(shifted), false);
        }
        self.refresh_queries();
    }

    fn shift_velocity_origin(&mut self, delta_local_velocity: DVec3) {
        if !crate::world::is_finite(delta_local_velocity) || crate::world::is_zero(delta_local_velocity) {
            return;
        }
        for (_, rb) in self.rigid_body_set.iter_mut() {
            if rb.is_fixed() {
                continue;
            }
            let shifted = vector_to_dvec3(rb.linvel()) - delta_local_velocity;
            rb.set_linvel(dvec3_to_vector(shifted), false);
        }
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        if crate::world::is_finite_f(gravity) {
            self.gravity = vec3_to_vector(gravity);
        }
    }

    fn gravity(&self) -> Vec3 {
        vector_to_vec3(&self.gravity)
    }

    fn set_layer_collision(&mut self, a: Layer, b: Layer, should_collide: bool) {
        self.layer_matrix.set(a, b, should_collide);
        let updates: Vec<(ColliderHandle, InteractionGroups)> = self
            .bodies
            .values()
            .map(|r| (r.collider, self.interaction_groups(r.layer)))
            .collect();
        for (handle, groups) in updates {
            if let Some(collider) = self.collider_set.get_mut(handle) {
                collider.set_collision_groups(groups);
            }
        }
    }

    fn layer_collides(&self, a: Layer, b: Layer) -> bool {
        self.layer_matrix.should_collide(a, b)
    }

    fn raycast(&self, origin: DVec3, direction: Vec3, options: &RaycastOptions) -> RayHit {
        let Some(dir) = normalize_nonzero(direction) else {
            return RayHit::default();
        };
        if !crate::world::is_finite(origin) || !(options.max_distance > 0.0) {
            return RayHit::default();
        }

        let ray = Ray::new(dvec3_to_point(origin), vec3_to_vector(dir));
        let solid = options.backface_culling;
        let predicate = |_: ColliderHandle, c: &Collider| self.accepts_collider(&options.filter, c);
        let filter = rapier3d::pipeline::QueryFilter::default().predicate(&predicate);

        let Some((handle, hit)) = self.query_pipeline.cast_ray_and_get_normal(
            &self.rigid_body_set,
            &self.collider_set,
            &ray,
            options.max_distance,
            solid,
            filter,
        ) else {
            return RayHit::default();
        };
        let Some(collider) = self.collider_set.get(handle) else {
            return RayHit::default();
        };

        let body_id = BodyId(collider.user_data as u32);
        let position = origin + dir.as_dvec3() * hit.time_of_impact as f64;
        RayHit {
            hit: true,
            position: position.as_vec3(),
            normal: vector_to_vec3(&hit.normal),
            distance: hit.time_of_impact,
            body_id,
            sub_shape_id: Self::ray_sub_shape(collider, &ray, options.max_distance, solid),
            layer: self.record(body_id).map(|r| r.layer).unwrap_or_default(),
        }
    }

    fn sweep_sphere(
        &self,
        radius: f32,
        start: DVec3,
        direction: Vec3,
        distance: f32,
        filter: &QueryFilter,
    ) -> SweepHit {
        if !(radius > 0.0) {
            return SweepHit::default();
        }
        self.sweep(&Ball::new(radius), start, Quat::IDENTITY, direction, distance, filter)
    }

    fn sweep_capsule(
        &self,
        radius: f32,
        half_height: f32,
        start: DVec3,
        rotation: Quat,
        direction: Vec3,
        distance: f32,
        filter: &QueryFilter,
    ) -> SweepHit {
        if !(radius > 0.0) || !(half_height >= 0.0) {
            return SweepHit::default();
        }
        let capsule = Capsule::new_y(half_height, radius);
        self.sweep(&capsule, start, rotation, direction, distance, filter)
    }

    fn overlap_sphere(&self, center: DVec3, radius: f32, filter: &QueryFilter) -> Vec<BodyId> {
        if !(radius > 0.0) || !crate::world::is_finite(center) {
            return Vec::new();
        }
        self.overlap(
            &Ball::new(radius),
            glam_to_isometry(center.as_vec3(), Quat::IDENTITY),
            filter,
        )
    }

    fn overlap_box(
        &self,
        center: DVec3,
        half_extents: Vec3,
        rotation: Quat,
        filter: &QueryFilter,
    ) -> Vec<BodyId> {
        if !crate::world::is_finite(center) || half_extents.min_element() <= 0.0 {
            return Vec::new();
        }
        let cuboid = Cuboid::new(vec3_to_vector(half_extents));
        self.overlap(
            &cuboid,
            glam_to_isometry(center.as_vec3(), crate::world::sanitize_rotation(rotation)),
            filter,
        )
    }

    fn set_body_callbacks(&mut self, id: BodyId, callbacks: BodyCallbacks) {
        if !self.is_body_valid(id) {
            warn!("Ignoring callbacks for unknown body {}", id.0);
            return;
        }
        self.callbacks.insert(id, callbacks);
    }

    fn clear_body_callbacks(&mut self, id: BodyId) {
        self.callbacks.remove(&id);
    }

    fn for_each_debug_body(&self, visit: &mut dyn FnMut(&DebugBodyView<'_>)) {
        let mut ids: Vec<BodyId> = self.bodies.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            let (Some(record), Some(rb)) = (self.record(id), self.body(id)) else {
                continue;
            };
            visit(&DebugBodyView {
                id,
                shape: &record.shape,
                position: vector_to_dvec3(rb.translation()),
                rotation: unit_to_quat(rb.rotation()),
                motion_type: record.motion_type,
                layer: record.layer,
                is_active: !rb.is_fixed() && !rb.is_sleeping(),
                is_sensor: record.is_sensor,
            });
        }
    }
}

fn push_ring(points: &mut Vec<Point<Real>>, y: f32, radius: f32) {
    if radius <= 0.0 {
        points.push(point![0.0, y, 0.0]);
        return;
    }
    for i in 0..TAPERED_RING_POINTS {
        let a = i as f32 / TAPERED_RING_POINTS as f32 * std::f32::consts::TAU;
        points.push(point![radius * a.cos(), y, radius * a.sin()]);
    }
}

fn normalize_nonzero(v: Vec3) -> Option<Vec3> {
    let len2 = v.length_squared();
    if len2.is_finite() && len2 > 1.0e-12 {
        Some(v / len2.sqrt())
    } else {
        None
    }
}

// Helper functions for converting between glam and nalgebra types

fn vec3_to_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

fn dvec3_to_vector(v: DVec3) -> Vector<Real> {
    vector![v.x as f32, v.y as f32, v.z as f32]
}

fn dvec3_to_point(v: DVec3) -> Point<Real> {
    point![v.x as f32, v.y as f32, v.z as f32]
}

fn vector_to_vec3(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

fn vector_to_dvec3(v: &Vector<Real>) -> DVec3 {
    DVec3::new(v.x as f64, v.y as f64, v.z as f64)
}

fn point_to_vec3(p: &Point<Real>) -> Vec3 {
    Vec3::new(p.x, p.y, p.z)
}

fn quat_to_unit(q: Quat) -> na::UnitQuaternion<f32> {
    na::UnitQuaternion::from_quaternion(na::Quaternion::new(q.w, q.x, q.y, q.z))
}

fn unit_to_quat(q: &na::UnitQuaternion<f32>) -> Quat {
    Quat::from_xyzw(q.i, q.j, q.k, q.w)
}

fn glam_to_isometry(position: Vec3, rotation: Quat) -> Isometry<Real> {
    Isometry::from_parts(
        na::Translation3::new(position.x, position.y, position.z),
        quat_to_unit(rotation),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quat_round_trip() {
        let q = Quat::from_rotation_y(0.7);
        let back = unit_to_quat(&quat_to_unit(q));
        assert!(q.abs_diff_eq(back, 1e-6));
    }

    #[test]
    fn test_tapered_cylinder_builds_hull() {
        let shape = CollisionShape::tapered_cylinder(1.0, 0.0, 2.0);
        assert!(RapierPhysicsWorld::build_convex(&shape).is_ok());
    }

    #[test]
    fn test_nested_compound_rejected() {
        let inner = CollisionShape::compound(vec![crate::physics::CompoundChild::new(
            CollisionShape::sphere(1.0),
            Vec3::ZERO,
            Quat::IDENTITY,
        )]);
        let outer = CollisionShape::compound(vec![crate::physics::CompoundChild::new(
            inner,
            Vec3::ZERO,
            Quat::IDENTITY,
        )]);
        assert!(matches!(
            RapierPhysicsWorld::build_shape(&outer),
            Err(PhysicsError::UnsupportedShape(_))
        ));
    }
}
