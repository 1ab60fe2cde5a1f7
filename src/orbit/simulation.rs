/// Fixed-step N-body propagator
///
/// Massive bodies attract each other pairwise; spacecraft are test particles.
/// Integration is kick-drift-kick leapfrog in barycentric coordinates. A
/// maneuver plan fires RTN impulses in time order, splitting the step at
/// each impulse so burns land at their exact time.

use glam::DVec3;

use super::frames::compute_rtn_frame;
use super::helpers::point_mass_accel;
use super::types::{BodyHandle, BodyId, MassiveBody, Spacecraft, SpacecraftHandle, SpacecraftId, G_SI};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimConfig {
    pub gravitational_constant: f64,
    /// Plummer softening length, 0 disables
    pub softening_length_m: f64,
    pub enable_events: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            gravitational_constant: G_SI,
            softening_length_m: 0.0,
            enable_events: false,
        }
    }
}

/// Instantaneous delta-v for one spacecraft
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManeuverImpulse {
    pub spacecraft_id: SpacecraftId,
    pub time_s: f64,
    /// Radial, tangential, normal
    pub dv_rtn_mps: DVec3,
    /// Central body of the RTN frame. Invalid selects the body with the
    /// strongest pull at burn time.
    pub rtn_body: BodyId,
}

/// Impulses kept sorted by time (stable for equal times)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManeuverPlan {
    impulses: Vec<ManeuverImpulse>,
}

impl ManeuverPlan {
    pub fn new(mut impulses: Vec<ManeuverImpulse>) -> Self {
        impulses.retain(|i| i.time_s.is_finite() && i.dv_rtn_mps.is_finite());
        impulses.sort_by(|a, b| a.time_s.total_cmp(&b.time_s));
        Self { impulses }
    }

    pub fn push(&mut self, impulse: ManeuverImpulse) {
        if !impulse.time_s.is_finite() || !impulse.dv_rtn_mps.is_finite() {
            return;
        }
        let index = self.impulses.partition_point(|i| i.time_s <= impulse.time_s);
        self.impulses.insert(index, impulse);
    }

    pub fn impulses(&self) -> &[ManeuverImpulse] {
        &self.impulses
    }

    pub fn len(&self) -> usize {
        self.impulses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.impulses.is_empty()
    }

    pub fn max_time_s(&self) -> Option<f64> {
        self.impulses.last().map(|i| i.time_s)
    }
}

#[derive(Debug, Clone)]
pub struct GameSimulation {
    config: SimConfig,
    time_s: f64,
    bodies: Vec<MassiveBody>,
    spacecraft: Vec<Spacecraft>,
    plan: ManeuverPlan,
    /// Index of the next unfired impulse in `plan`
    next_impulse: usize,
    next_body_id: u32,
    next_spacecraft_id: u32,
}

impl Default for GameSimulation {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl GameSimulation {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            time_s: 0.0,
            bodies: Vec::new(),
            spacecraft: Vec::new(),
            plan: ManeuverPlan::default(),
            next_impulse: 0,
            next_body_id: 1,
            next_spacecraft_id: 1,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn time_s(&self) -> f64 {
        self.time_s
    }

    pub fn set_time_s(&mut self, time_s: f64) {
        if time_s.is_finite() {
            self.time_s = time_s;
        }
    }

    /// Adds a body and assigns its id. Non-positive mass or a non-finite
    /// state yields an invalid handle.
    pub fn create_body(&mut self, mut body: MassiveBody) -> BodyHandle {
        if !(body.mass_kg > 0.0) || !body.mass_kg.is_finite() || !body.state.is_finite() {
            return BodyHandle::default();
        }
        body.id = BodyId(self.next_body_id);
        self.next_body_id += 1;
        let id = body.id;
        self.bodies.push(body);
        BodyHandle { id }
    }

    pub fn create_spacecraft(&mut self, mut spacecraft: Spacecraft) -> SpacecraftHandle {
        if !spacecraft.state.is_finite() {
            return SpacecraftHandle::default();
        }
        spacecraft.id = SpacecraftId(self.next_spacecraft_id);
        self.next_spacecraft_id += 1;
        let id = spacecraft.id;
        self.spacecraft.push(spacecraft);
        SpacecraftHandle { id }
    }

    pub fn remove_spacecraft(&mut self, id: SpacecraftId) -> bool {
        let before = self.spacecraft.len();
        self.spacecraft.retain(|sc| sc.id != id);
        self.spacecraft.len() != before
    }

    pub fn body_by_id(&self, id: BodyId) -> Option<&MassiveBody> {
        self.bodies.iter().find(|b| b.id == id)
    }

    pub fn body_by_id_mut(&mut self, id: BodyId) -> Option<&mut MassiveBody> {
        self.bodies.iter_mut().find(|b| b.id == id)
    }

    pub fn spacecraft_by_id(&self, id: SpacecraftId) -> Option<&Spacecraft> {
        self.spacecraft.iter().find(|s| s.id == id)
    }

    pub fn spacecraft_by_id_mut(&mut self, id: SpacecraftId) -> Option<&mut Spacecraft> {
        self.spacecraft.iter_mut().find(|s| s.id == id)
    }

    pub fn massive_bodies(&self) -> &[MassiveBody] {
        &self.bodies
    }

    pub fn spacecraft(&self) -> &[Spacecraft] {
        &self.spacecraft
    }

    /// Install a plan. Impulses earlier than the current time never fire.
    pub fn set_maneuver_plan(&mut self, plan: ManeuverPlan) {
        let now = self.time_s;
        self.next_impulse = plan.impulses.partition_point(|i| i.time_s < now);
        self.plan = plan;
    }

    pub fn maneuver_plan(&self) -> &ManeuverPlan {
        &self.plan
    }

    /// Drop every spacecraft and the plan, keeping bodies and time
    pub(crate) fn strip_spacecraft(&mut self) {
        self.spacecraft.clear();
        self.plan = ManeuverPlan::default();
        self.next_impulse = 0;
    }

    /// Number of impulses already applied or skipped
    pub fn fired_impulse_count(&self) -> usize {
        self.next_impulse
    }

    /// Body with the largest gravitational pull at `position_m`
    pub fn dominant_body(&self, position_m: DVec3) -> Option<&MassiveBody> {
        let g = self.config.gravitational_constant;
        let eps2 = self.config.softening_length_m * self.config.softening_length_m;
        self.bodies.iter().max_by(|a, b| {
            let aa = point_mass_accel(g, a.mass_kg, position_m - a.state.position_m, eps2).length_squared();
            let ab = point_mass_accel(g, b.mass_kg, position_m - b.state.position_m, eps2).length_squared();
            aa.total_cmp(&ab)
        })
    }

    /// Advance by `dt_s`, firing every impulse whose time falls inside the step
    pub fn step(&mut self, dt_s: f64) {
        if !(dt_s > 0.0) || !dt_s.is_finite() {
            return;
        }
        let t_end = self.time_s + dt_s;

        while let Some(impulse) = self.plan.impulses.get(self.next_impulse).copied() {
            if impulse.time_s > t_end {
                break;
            }
            let t_burn = impulse.time_s.max(self.time_s);
            if t_burn > self.time_s {
                self.integrate(t_burn - self.time_s);
                self.time_s = t_burn;
            }
            self.apply_impulse(&impulse);
            self.next_impulse += 1;
        }

        let remaining = t_end - self.time_s;
        if remaining > 0.0 {
            self.integrate(remaining);
        }
        self.time_s = t_end;
    }

    fn apply_impulse(&mut self, impulse: &ManeuverImpulse) {
        let Some(sc_state) = self.spacecraft_by_id(impulse.spacecraft_id).map(|s| s.state) else {
            return;
        };

        let center = if impulse.rtn_body.is_valid() {
            self.body_by_id(impulse.rtn_body)
        } else {
            None
        }
        .or_else(|| self.dominant_body(sc_state.position_m))
        .map(|b| b.state);

        let rel = match center {
            Some(c) => sc_state.relative_to(&c),
            None => sc_state,
        };
        let dv_world = compute_rtn_frame(rel.position_m, rel.velocity_mps).to_world(impulse.dv_rtn_mps);

        if let Some(sc) = self.spacecraft_by_id_mut(impulse.spacecraft_id) {
            sc.state.velocity_mps += dv_world;
        }
    }

    /// One kick-drift-kick leapfrog step
    fn integrate(&mut self, h: f64) {
        let half = 0.5 * h;

        let (a_bodies, a_sc) = self.accelerations();
        self.kick(&a_bodies, &a_sc, half);

        for b in &mut self.bodies {
            b.state.position_m += b.state.velocity_mps * h;
        }
        for s in &mut self.spacecraft {
            s.state.position_m += s.state.velocity_mps * h;
        }

        let (a_bodies, a_sc) = self.accelerations();
        self.kick(&a_bodies, &a_sc, half);
    }

    fn kick(&mut self, a_bodies: &[DVec3], a_sc: &[DVec3], h: f64) {
        for (b, a) in self.bodies.iter_mut().zip(a_bodies) {
            b.state.velocity_mps += *a * h;
        }
        for (s, a) in self.spacecraft.iter_mut().zip(a_sc) {
            s.state.velocity_mps += *a * h;
        }
    }

    fn accelerations(&self) -> (Vec<DVec3>, Vec<DVec3>) {
        let g = self.config.gravitational_constant;
        let eps2 = self.config.softening_length_m * self.config.softening_length_m;

        let mut a_bodies = vec![DVec3::ZERO; self.bodies.len()];
        for i in 0..self.bodies.len() {
            for j in (i + 1)..self.bodies.len() {
                let r_ij = self.bodies[i].state.position_m - self.bodies[j].state.position_m;
                a_bodies[i] += point_mass_accel(g, self.bodies[j].mass_kg, r_ij, eps2);
                a_bodies[j] += point_mass_accel(g, self.bodies[i].mass_kg, -r_ij, eps2);
            }
        }

        let a_sc = self
            .spacecraft
            .iter()
            .map(|s| {
                self.bodies.iter().fold(DVec3::ZERO, |acc, b| {
                    acc + point_mass_accel(g, b.mass_kg, s.state.position_m - b.state.position_m, eps2)
                })
            })
            .collect();

        (a_bodies, a_sc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orbit::helpers::{circular_orbit_relative_state_xz, two_body_circular_barycentric_xz};
    use crate::orbit::types::make_state;

    const EARTH_MASS: f64 = 5.972e24;
    const MOON_MASS: f64 = 7.342e22;

    fn earth_moon() -> GameSimulation {
        let mut sim = GameSimulation::default();
        let init = two_body_circular_barycentric_xz(G_SI, EARTH_MASS, MOON_MASS, 3.844e8, 0.0);
        sim.create_body(MassiveBody {
            mass_kg: EARTH_MASS,
            radius_m: 6.371e6,
            state: init.state_a,
            ..Default::default()
        });
        sim.create_body(MassiveBody {
            mass_kg: MOON_MASS,
            radius_m: 1.7374e6,
            state: init.state_b,
            ..Default::default()
        });
        sim
    }

    #[test]
    fn test_rejects_invalid_bodies() {
        let mut sim = GameSimulation::default();
        assert!(!sim.create_body(MassiveBody::default()).valid());
        let h = sim.create_body(MassiveBody {
            mass_kg: 1.0,
            ..Default::default()
        });
        assert!(h.valid());
        assert!(sim.body_by_id(h.id).is_some());
    }

    #[test]
    fn test_momentum_stays_bounded() {
        let mut sim = earth_moon();
        let momentum = |sim: &GameSimulation| {
            sim.massive_bodies()
                .iter()
                .fold(DVec3::ZERO, |acc, b| acc + b.mass_kg * b.state.velocity_mps)
        };
        let scale = EARTH_MASS * 12.5;
        for _ in 0..10_000 {
            sim.step(60.0);
        }
        assert!(momentum(&sim).length() / scale < 1e-9);
        assert!((sim.time_s() - 600_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_impulse_fires_once_at_its_time() {
        let mut sim = GameSimulation::default();
        let earth = sim.create_body(MassiveBody {
            mass_kg: EARTH_MASS,
            ..Default::default()
        });
        let rel = circular_orbit_relative_state_xz(G_SI, EARTH_MASS, 6.771e6, 0.0);
        let sc = sim.create_spacecraft(Spacecraft {
            state: make_state(rel.position_m, rel.velocity_mps),
            ..Default::default()
        });

        sim.set_maneuver_plan(ManeuverPlan::new(vec![ManeuverImpulse {
            spacecraft_id: sc.id,
            time_s: 0.5,
            dv_rtn_mps: DVec3::new(0.0, 10.0, 0.0),
            rtn_body: earth.id,
        }]));

        let v0 = sim.spacecraft_by_id(sc.id).map(|s| s.state.velocity_mps.length()).unwrap();
        sim.step(1.0);
        assert_eq!(sim.fired_impulse_count(), 1);
        let v1 = sim.spacecraft_by_id(sc.id).map(|s| s.state.velocity_mps.length()).unwrap();
        assert!((v1 - v0 - 10.0).abs() < 0.05);

        sim.step(1.0);
        let v2 = sim.spacecraft_by_id(sc.id).map(|s| s.state.velocity_mps.length()).unwrap();
        assert!((v2 - v1).abs() < 0.05);
    }

    #[test]
    fn test_past_impulses_are_skipped() {
        let mut sim = GameSimulation::default();
        sim.set_time_s(100.0);
        sim.set_maneuver_plan(ManeuverPlan::new(vec![ManeuverImpulse {
            spacecraft_id: SpacecraftId(1),
            time_s: 10.0,
            dv_rtn_mps: DVec3::Y,
            rtn_body: BodyId::INVALID,
        }]));
        assert_eq!(sim.fired_impulse_count(), 1);
    }
}
