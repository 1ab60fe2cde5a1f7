/// Scenario description and the live orbital scenario built from it
///
/// `celestials[0]` is the reference body: the rendered world is centred on it
/// at `system_center`, and prediction works in its body-centred frame.

use glam::{DVec3, Quat, Vec3};

use crate::game::{EntityId, PrimitiveType};
use crate::orbit::{BodyId, GameSimulation, SpacecraftId};
use crate::physics::{BodySettings, CollisionShape, Layer};
use crate::world::WorldVec3;

pub const SCENARIO_SCHEMA_VERSION: i64 = 1;
pub const DEFAULT_MU_BASE: f64 = 3.986004418e14;
pub const DEFAULT_SYSTEM_CENTER: WorldVec3 = DVec3::new(1.0e12, 0.0, 0.0);

#[derive(Debug, Clone, PartialEq)]
pub struct CelestialDef {
    pub name: String,
    pub mass_kg: f64,
    pub radius_m: f64,
    pub atmosphere_top_m: f64,
    pub terrain_max_m: f64,
    pub soi_radius_m: f64,
    /// Distance from the reference body; 0 for the reference body itself
    pub orbit_distance_m: f64,
    pub has_terrain: bool,
    pub albedo_dir: String,
    pub height_dir: String,
    pub height_max_m: f64,
    pub emission_dir: String,
    pub emission_factor: Vec3,
    /// Visual scale for celestials drawn as plain spheres
    pub render_scale: f32,
}

impl Default for CelestialDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            mass_kg: 0.0,
            radius_m: 0.0,
            atmosphere_top_m: 0.0,
            terrain_max_m: 0.0,
            soi_radius_m: 0.0,
            orbit_distance_m: 0.0,
            has_terrain: false,
            albedo_dir: String::new(),
            height_dir: String::new(),
            height_max_m: 0.0,
            emission_dir: String::new(),
            emission_factor: Vec3::ZERO,
            render_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrbiterDef {
    pub name: String,
    /// Altitude above the reference surface (primary orbiter only)
    pub orbit_altitude_m: f64,
    /// Position relative to the primary orbiter
    pub offset_from_player: DVec3,
    /// Velocity relative to the primary orbiter
    pub relative_velocity: DVec3,
    pub primitive: PrimitiveType,
    pub render_scale: Vec3,
    pub body_settings: BodySettings,
    pub is_player: bool,
    pub is_rebase_anchor: bool,
}

impl Default for OrbiterDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            orbit_altitude_m: 0.0,
            offset_from_player: DVec3::ZERO,
            relative_velocity: DVec3::ZERO,
            primitive: PrimitiveType::Capsule,
            render_scale: Vec3::ONE,
            body_settings: BodySettings::default(),
            is_player: false,
            is_rebase_anchor: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub celestials: Vec<CelestialDef>,
    pub orbiters: Vec<OrbiterDef>,
    pub speed_scale: f64,
    /// m^3/s^2, scaled by speed_scale^2
    pub mu_base: f64,
    pub system_center: WorldVec3,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        default_earth_moon_config()
    }
}

impl ScenarioConfig {
    pub fn reference(&self) -> Option<&CelestialDef> {
        self.celestials.first()
    }

    /// `mu_base · speed_scale²`
    pub fn mu(&self) -> f64 {
        self.mu_base * self.speed_scale * self.speed_scale
    }
}

/// Earth with the Moon at its real distance, a player ship in a 400 km orbit
/// and a probe drifting 25 km above it.
pub fn default_earth_moon_config() -> ScenarioConfig {
    let earth = CelestialDef {
        name: "earth".to_string(),
        mass_kg: 5.972e24,
        radius_m: 6_371_000.0,
        atmosphere_top_m: 100_000.0,
        terrain_max_m: 8_848.0,
        soi_radius_m: 9.24e8,
        ..CelestialDef::default()
    };
    let moon = CelestialDef {
        name: "moon".to_string(),
        mass_kg: 7.342e22,
        radius_m: 1_737_400.0,
        soi_radius_m: 6.61e7,
        orbit_distance_m: 384_400_000.0,
        ..CelestialDef::default()
    };

    let ship = OrbiterDef {
        name: "ship".to_string(),
        orbit_altitude_m: 400_000.0,
        primitive: PrimitiveType::Capsule,
        render_scale: Vec3::splat(4.0),
        body_settings: BodySettings::new()
            .with_shape(CollisionShape::capsule(2.0, 2.0))
            .with_layer(Layer::PLAYER)
            .with_gravity_scale(0.0)
            .with_friction(0.2)
            .with_restitution(0.05)
            .with_linear_damping(0.0)
            .with_angular_damping(0.0),
        is_player: true,
        is_rebase_anchor: true,
        ..OrbiterDef::default()
    };
    let probe = OrbiterDef {
        name: "probe".to_string(),
        offset_from_player: DVec3::new(0.0, 25_000.0, 0.0),
        relative_velocity: DVec3::new(0.0, 0.0, -10.0),
        primitive: PrimitiveType::Sphere,
        render_scale: Vec3::splat(2.0),
        body_settings: BodySettings::new()
            .with_shape(CollisionShape::sphere(1.0))
            .with_layer(Layer::DYNAMIC)
            .with_gravity_scale(0.0)
            .with_restitution(0.1)
            .with_linear_damping(0.0)
            .with_angular_damping(0.0),
        ..OrbiterDef::default()
    };

    ScenarioConfig {
        celestials: vec![earth, moon],
        orbiters: vec![ship, probe],
        speed_scale: 1.0,
        mu_base: DEFAULT_MU_BASE,
        system_center: DEFAULT_SYSTEM_CENTER,
    }
}

/// Sim body paired with the entity that renders it
#[derive(Debug, Clone)]
pub struct CelestialBodyInfo {
    pub sim_id: BodyId,
    pub render_entity: EntityId,
    pub name: String,
    pub radius_m: f64,
    pub mass_kg: f64,
}

/// Rails-only state of an orbiter
#[derive(Debug, Clone, Copy)]
pub struct RailsState {
    pub sc_id: SpacecraftId,
    pub rotation: Quat,
    pub angular_velocity: Vec3,
    pub sas_enabled: bool,
    pub sas_toggle_prev_down: bool,
}

impl Default for RailsState {
    fn default() -> Self {
        Self {
            sc_id: SpacecraftId::INVALID,
            rotation: Quat::IDENTITY,
            angular_velocity: Vec3::ZERO,
            sas_enabled: false,
            sas_toggle_prev_down: false,
        }
    }
}

/// Scenario link between an entity and the rails simulator
#[derive(Debug, Clone)]
pub struct OrbiterInfo {
    pub entity: EntityId,
    pub name: String,
    pub apply_gravity: bool,
    pub is_player: bool,
    pub is_rebase_anchor: bool,
    pub rails: RailsState,
}

/// Live N-body scenario plus the celestial render bindings
#[derive(Debug, Clone)]
pub struct OrbitalScenario {
    pub sim: GameSimulation,
    pub bodies: Vec<CelestialBodyInfo>,
    pub reference_body_index: usize,
}

impl OrbitalScenario {
    pub fn reference_body(&self) -> Option<&CelestialBodyInfo> {
        self.bodies.get(self.reference_body_index)
    }

    pub fn reference_sim_id(&self) -> Option<BodyId> {
        self.reference_body().map(|b| b.sim_id)
    }

    /// Barycentric state of the reference body
    pub fn reference_state(&self) -> Option<crate::orbit::State> {
        let id = self.reference_sim_id()?;
        self.sim.body_by_id(id).map(|b| b.state)
    }

    pub fn reference_mass_kg(&self) -> Option<f64> {
        self.reference_body().map(|b| b.mass_kg)
    }

    pub fn reference_radius_m(&self) -> Option<f64> {
        self.reference_body().map(|b| b.radius_m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_shape() {
        let cfg = default_earth_moon_config();
        assert_eq!(cfg.celestials.len(), 2);
        assert_eq!(cfg.reference().map(|c| c.name.as_str()), Some("earth"));
        assert_eq!(cfg.orbiters.iter().filter(|o| o.is_player).count(), 1);
        assert_eq!(cfg.system_center, DVec3::new(1.0e12, 0.0, 0.0));
        assert!((cfg.mu() - DEFAULT_MU_BASE).abs() < 1.0);
    }

    #[test]
    fn test_mu_scales_with_speed() {
        let mut cfg = default_earth_moon_config();
        cfg.speed_scale = 2.0;
        assert!((cfg.mu() - 4.0 * DEFAULT_MU_BASE).abs() < 1.0);
    }
}
