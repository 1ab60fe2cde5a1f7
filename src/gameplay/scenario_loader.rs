/// Scenario JSON loader
///
/// Walks a `serde_json::Value` tree so every failure can name the offending
/// field (`root.celestials[0].mass_kg is required`). Unknown enum strings warn
/// and fall back; wrong types and out-of-range numbers reject the file.

use std::fs;
use std::path::Path;

use glam::{DVec3, Quat, Vec3};
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use super::scenario::{
    CelestialDef, OrbiterDef, ScenarioConfig, DEFAULT_MU_BASE, DEFAULT_SYSTEM_CENTER, SCENARIO_SCHEMA_VERSION,
};
use crate::error::ScenarioError;
use crate::game::PrimitiveType;
use crate::physics::{BodySettings, CollisionShape, Layer, MotionType, LAYER_COUNT};

type LoadResult<T> = Result<T, ScenarioError>;

/// Load and validate a scenario file. Errors are logged and reported as `None`
/// so the caller can fall back to the built-in scenario.
pub fn load_scenario_config(path: impl AsRef<Path>) -> Option<ScenarioConfig> {
    let path = path.as_ref();
    match read_scenario_config(path) {
        Ok(config) => {
            info!(
                "Loaded scenario '{}' ({} celestials, {} orbiters)",
                path.display(),
                config.celestials.len(),
                config.orbiters.len()
            );
            Some(config)
        }
        Err(e) => {
            error!("Scenario '{}' rejected: {}", path.display(), e);
            None
        }
    }
}

pub fn read_scenario_config(path: impl AsRef<Path>) -> LoadResult<ScenarioConfig> {
    let text = fs::read_to_string(path)?;
    parse_scenario_config(&text)
}

pub fn parse_scenario_config(text: &str) -> LoadResult<ScenarioConfig> {
    let root: Value = serde_json::from_str(text)?;
    parse_root(&root, "root")
}

/// Pretty JSON (2-space indent) that `parse_scenario_config` reads back
pub fn serialize_scenario_config(config: &ScenarioConfig) -> String {
    let value = json!({
        "schema_version": SCENARIO_SCHEMA_VERSION,
        "speed_scale": config.speed_scale,
        "mu_base": config.mu_base,
        "system_center": dvec3_json(config.system_center),
        "celestials": config.celestials.iter().map(celestial_json).collect::<Vec<_>>(),
        "orbiters": config.orbiters.iter().map(orbiter_json).collect::<Vec<_>>(),
    });
    serde_json::to_string_pretty(&value).unwrap_or_default()
}

pub fn save_scenario_config(config: &ScenarioConfig, path: impl AsRef<Path>) -> LoadResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serialize_scenario_config(config))?;
    Ok(())
}

// ----------------------------------------------------------------------------
// Parsing
// ----------------------------------------------------------------------------

fn parse_root(root: &Value, path: &str) -> LoadResult<ScenarioConfig> {
    let obj = as_object(root, path)?;

    let version_path = child(path, "schema_version");
    let version = required(obj, "schema_version", path)?
        .as_i64()
        .ok_or_else(|| ScenarioError::validation(&version_path, "must be an integer"))?;
    if version != SCENARIO_SCHEMA_VERSION {
        return Err(ScenarioError::SchemaVersion {
            found: version,
            expected: SCENARIO_SCHEMA_VERSION,
        });
    }

    let speed_scale = opt_f64(obj, "speed_scale", path, 1.0)?;
    check_positive(speed_scale, &child(path, "speed_scale"))?;
    let mu_base = opt_f64(obj, "mu_base", path, DEFAULT_MU_BASE)?;
    check_positive(mu_base, &child(path, "mu_base"))?;
    let system_center = opt_dvec3(obj, "system_center", path, DEFAULT_SYSTEM_CENTER)?;

    let celestials = required_array(obj, "celestials", path)?
        .iter()
        .enumerate()
        .map(|(i, v)| parse_celestial(v, &format!("{}.celestials[{}]", path, i)))
        .collect::<LoadResult<Vec<_>>>()?;

    let orbiters = required_array(obj, "orbiters", path)?
        .iter()
        .enumerate()
        .map(|(i, v)| parse_orbiter(v, &format!("{}.orbiters[{}]", path, i)))
        .collect::<LoadResult<Vec<_>>>()?;

    Ok(ScenarioConfig {
        celestials,
        orbiters,
        speed_scale,
        mu_base,
        system_center,
    })
}

fn parse_celestial(value: &Value, path: &str) -> LoadResult<CelestialDef> {
    let obj = as_object(value, path)?;

    let name = required_string(obj, "name", path)?;
    let mass_kg = to_f64(required(obj, "mass_kg", path)?, &child(path, "mass_kg"))?;
    check_positive(mass_kg, &child(path, "mass_kg"))?;
    let radius_m = to_f64(required(obj, "radius_m", path)?, &child(path, "radius_m"))?;
    check_positive(radius_m, &child(path, "radius_m"))?;

    let non_negative = |key: &str| -> LoadResult<f64> {
        let v = opt_f64(obj, key, path, 0.0)?;
        check_non_negative(v, &child(path, key))?;
        Ok(v)
    };

    let def = CelestialDef {
        name,
        mass_kg,
        radius_m,
        atmosphere_top_m: non_negative("atmosphere_top_m")?,
        terrain_max_m: non_negative("terrain_max_m")?,
        soi_radius_m: non_negative("soi_radius_m")?,
        orbit_distance_m: non_negative("orbit_distance_m")?,
        has_terrain: opt_bool(obj, "has_terrain", path, false)?,
        albedo_dir: opt_string(obj, "albedo_dir", path)?,
        height_dir: opt_string(obj, "height_dir", path)?,
        height_max_m: non_negative("height_max_m")?,
        emission_dir: opt_string(obj, "emission_dir", path)?,
        emission_factor: opt_vec3(obj, "emission_factor", path, Vec3::ZERO)?,
        render_scale: opt_f64(obj, "render_scale", path, 1.0)? as f32,
    };

    check_positive(f64::from(def.render_scale), &child(path, "render_scale"))?;
    if def.has_terrain {
        if def.albedo_dir.is_empty() {
            return Err(ScenarioError::validation(child(path, "albedo_dir"), "is required when has_terrain is true"));
        }
        if def.height_dir.is_empty() {
            return Err(ScenarioError::validation(child(path, "height_dir"), "is required when has_terrain is true"));
        }
    }
    Ok(def)
}

fn parse_orbiter(value: &Value, path: &str) -> LoadResult<OrbiterDef> {
    let obj = as_object(value, path)?;

    let name = required_string(obj, "name", path)?;
    let orbit_altitude_m = opt_f64(obj, "orbit_altitude_m", path, 0.0)?;
    check_non_negative(orbit_altitude_m, &child(path, "orbit_altitude_m"))?;

    let primitive = match field(obj, "primitive") {
        None => PrimitiveType::Capsule,
        Some(v) => {
            let s = to_str(v, &child(path, "primitive"))?;
            PrimitiveType::from_name(s).unwrap_or_else(|| {
                warn!("{} has unsupported value '{}', using sphere", child(path, "primitive"), s);
                PrimitiveType::Sphere
            })
        }
    };

    let render_scale = opt_vec3(obj, "render_scale", path, Vec3::ONE)?;
    if render_scale.min_element() <= 0.0 {
        return Err(ScenarioError::validation(child(path, "render_scale"), "components must be > 0"));
    }

    let body_settings = match field(obj, "body_settings") {
        None => BodySettings::default(),
        Some(v) => parse_body_settings(v, &child(path, "body_settings"))?,
    };

    Ok(OrbiterDef {
        name,
        orbit_altitude_m,
        offset_from_player: opt_dvec3(obj, "offset_from_player", path, DVec3::ZERO)?,
        relative_velocity: opt_dvec3(obj, "relative_velocity", path, DVec3::ZERO)?,
        primitive,
        render_scale,
        body_settings,
        is_player: opt_bool(obj, "is_player", path, false)?,
        is_rebase_anchor: opt_bool(obj, "is_rebase_anchor", path, false)?,
    })
}

fn parse_body_settings(value: &Value, path: &str) -> LoadResult<BodySettings> {
    let obj = as_object(value, path)?;
    let defaults = BodySettings::default();

    let mut settings = BodySettings::new();
    if let Some(shape) = field(obj, "shape") {
        settings.shape = parse_shape(shape, &child(path, "shape"))?;
    }

    if let Some(v) = field(obj, "user_data") {
        settings.user_data = v
            .as_u64()
            .ok_or_else(|| ScenarioError::validation(child(path, "user_data"), "must be a non-negative integer"))?;
    }
    settings.position = opt_dvec3(obj, "position", path, DVec3::ZERO)?;
    if let Some(v) = field(obj, "rotation") {
        settings.rotation = parse_quat(v, &child(path, "rotation"))?;
    }

    settings.motion_type = match field(obj, "motion_type") {
        None => MotionType::Dynamic,
        Some(v) => {
            let key_path = child(path, "motion_type");
            match to_str(v, &key_path)? {
                "static" => MotionType::Static,
                "kinematic" => MotionType::Kinematic,
                "dynamic" => MotionType::Dynamic,
                other => {
                    warn!("{} has unsupported value '{}', using dynamic", key_path, other);
                    MotionType::Dynamic
                }
            }
        }
    };

    let non_negative = |key: &str, default: f32| -> LoadResult<f32> {
        let v = opt_f64(obj, key, path, f64::from(default))?;
        check_non_negative(v, &child(path, key))?;
        Ok(v as f32)
    };
    settings.mass = non_negative("mass", defaults.mass)?;
    settings.friction = non_negative("friction", defaults.friction)?;
    settings.restitution = non_negative("restitution", defaults.restitution)?;
    settings.linear_damping = non_negative("linear_damping", defaults.linear_damping)?;
    settings.angular_damping = non_negative("angular_damping", defaults.angular_damping)?;
    settings.gravity_scale = non_negative("gravity_scale", defaults.gravity_scale)?;

    if let Some(v) = field(obj, "layer") {
        let layer_path = child(path, "layer");
        let index = v
            .as_u64()
            .ok_or_else(|| ScenarioError::validation(&layer_path, "must be a non-negative integer"))?;
        settings.layer = u32::try_from(index)
            .ok()
            .and_then(Layer::from_index)
            .ok_or_else(|| ScenarioError::validation(&layer_path, format!("must be < {}", LAYER_COUNT)))?;
    }

    settings.is_sensor = opt_bool(obj, "is_sensor", path, defaults.is_sensor)?;
    settings.start_active = opt_bool(obj, "start_active", path, defaults.start_active)?;
    settings.allow_sleeping = opt_bool(obj, "allow_sleeping", path, defaults.allow_sleeping)?;
    Ok(settings)
}

fn parse_shape(value: &Value, path: &str) -> LoadResult<CollisionShape> {
    let obj = as_object(value, path)?;
    let type_path = child(path, "type");
    let kind = to_str(required(obj, "type", path)?, &type_path)?;

    let positive = |key: &str| -> LoadResult<f32> {
        let v = to_f64(required(obj, key, path)?, &child(path, key))?;
        check_positive(v, &child(path, key))?;
        Ok(v as f32)
    };

    let shape = match kind {
        "sphere" => CollisionShape::sphere(positive("radius")?),
        "capsule" => CollisionShape::capsule(positive("radius")?, positive("half_height")?),
        "cylinder" => CollisionShape::cylinder(positive("radius")?, positive("half_height")?),
        "box" => {
            let half = opt_vec3(obj, "half_extents", path, Vec3::splat(0.5))?;
            if half.min_element() <= 0.0 {
                return Err(ScenarioError::validation(child(path, "half_extents"), "components must be > 0"));
            }
            CollisionShape::cuboid(half.x, half.y, half.z)
        }
        other => {
            warn!("{} has unsupported value '{}', using box", type_path, other);
            CollisionShape::default()
        }
    };
    Ok(shape)
}

fn parse_quat(value: &Value, path: &str) -> LoadResult<Quat> {
    let obj = as_object(value, path)?;
    let w = opt_f64(obj, "w", path, 1.0)?;
    let x = opt_f64(obj, "x", path, 0.0)?;
    let y = opt_f64(obj, "y", path, 0.0)?;
    let z = opt_f64(obj, "z", path, 0.0)?;
    Ok(crate::world::sanitize_rotation(Quat::from_xyzw(x as f32, y as f32, z as f32, w as f32)))
}

// ----------------------------------------------------------------------------
// Field access
// ----------------------------------------------------------------------------

fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> LoadResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ScenarioError::validation(path, "must be an object"))
}

/// Null counts as absent
fn field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn required<'a>(obj: &'a Map<String, Value>, key: &str, path: &str) -> LoadResult<&'a Value> {
    field(obj, key).ok_or_else(|| ScenarioError::validation(child(path, key), "is required"))
}

fn required_array<'a>(obj: &'a Map<String, Value>, key: &str, path: &str) -> LoadResult<&'a Vec<Value>> {
    let key_path = child(path, key);
    let array = required(obj, key, path)?
        .as_array()
        .ok_or_else(|| ScenarioError::validation(&key_path, "must be an array"))?;
    if array.is_empty() {
        return Err(ScenarioError::validation(&key_path, "must not be empty"));
    }
    Ok(array)
}

fn to_f64(value: &Value, path: &str) -> LoadResult<f64> {
    let v = value
        .as_f64()
        .ok_or_else(|| ScenarioError::validation(path, "must be a number"))?;
    if !v.is_finite() {
        return Err(ScenarioError::validation(path, "must be finite"));
    }
    Ok(v)
}

fn to_str<'a>(value: &'a Value, path: &str) -> LoadResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| ScenarioError::validation(path, "must be a string"))
}

fn opt_f64(obj: &Map<String, Value>, key: &str, path: &str, default: f64) -> LoadResult<f64> {
    match field(obj, key) {
        Some(v) => to_f64(v, &child(path, key)),
        None => Ok(default),
    }
}

fn opt_bool(obj: &Map<String, Value>, key: &str, path: &str, default: bool) -> LoadResult<bool> {
    match field(obj, key) {
        Some(v) => v
            .as_bool()
            .ok_or_else(|| ScenarioError::validation(child(path, key), "must be a boolean")),
        None => Ok(default),
    }
}

fn opt_string(obj: &Map<String, Value>, key: &str, path: &str) -> LoadResult<String> {
    match field(obj, key) {
        Some(v) => to_str(v, &child(path, key)).map(str::to_string),
        None => Ok(String::new()),
    }
}

fn required_string(obj: &Map<String, Value>, key: &str, path: &str) -> LoadResult<String> {
    let key_path = child(path, key);
    let s = to_str(required(obj, key, path)?, &key_path)?;
    if s.is_empty() {
        return Err(ScenarioError::validation(&key_path, "must not be empty"));
    }
    Ok(s.to_string())
}

fn opt_dvec3(obj: &Map<String, Value>, key: &str, path: &str, default: DVec3) -> LoadResult<DVec3> {
    let Some(v) = field(obj, key) else {
        return Ok(default);
    };
    let key_path = child(path, key);
    let xyz = as_object(v, &key_path)?;
    Ok(DVec3::new(
        opt_f64(xyz, "x", &key_path, default.x)?,
        opt_f64(xyz, "y", &key_path, default.y)?,
        opt_f64(xyz, "z", &key_path, default.z)?,
    ))
}

fn opt_vec3(obj: &Map<String, Value>, key: &str, path: &str, default: Vec3) -> LoadResult<Vec3> {
    opt_dvec3(obj, key, path, default.as_dvec3()).map(|v| v.as_vec3())
}

fn check_positive(value: f64, path: &str) -> LoadResult<()> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ScenarioError::validation(path, "must be > 0"))
    }
}

fn check_non_negative(value: f64, path: &str) -> LoadResult<()> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ScenarioError::validation(path, "must be >= 0"))
    }
}

// ----------------------------------------------------------------------------
// Serialization
// ----------------------------------------------------------------------------

fn dvec3_json(v: DVec3) -> Value {
    json!({ "x": v.x, "y": v.y, "z": v.z })
}

fn vec3_json(v: Vec3) -> Value {
    json!({ "x": v.x, "y": v.y, "z": v.z })
}

fn celestial_json(c: &CelestialDef) -> Value {
    json!({
        "name": c.name,
        "mass_kg": c.mass_kg,
        "radius_m": c.radius_m,
        "atmosphere_top_m": c.atmosphere_top_m,
        "terrain_max_m": c.terrain_max_m,
        "soi_radius_m": c.soi_radius_m,
        "orbit_distance_m": c.orbit_distance_m,
        "has_terrain": c.has_terrain,
        "albedo_dir": c.albedo_dir,
        "height_dir": c.height_dir,
        "height_max_m": c.height_max_m,
        "emission_dir": c.emission_dir,
        "emission_factor": vec3_json(c.emission_factor),
        "render_scale": c.render_scale,
    })
}

fn orbiter_json(o: &OrbiterDef) -> Value {
    json!({
        "name": o.name,
        "orbit_altitude_m": o.orbit_altitude_m,
        "offset_from_player": dvec3_json(o.offset_from_player),
        "relative_velocity": dvec3_json(o.relative_velocity),
        "primitive": o.primitive.name(),
        "render_scale": vec3_json(o.render_scale),
        "is_player": o.is_player,
        "is_rebase_anchor": o.is_rebase_anchor,
        "body_settings": body_settings_json(&o.body_settings),
    })
}

fn body_settings_json(s: &BodySettings) -> Value {
    json!({
        "shape": shape_json(&s.shape),
        "user_data": s.user_data,
        "position": dvec3_json(s.position),
        "rotation": { "w": s.rotation.w, "x": s.rotation.x, "y": s.rotation.y, "z": s.rotation.z },
        "motion_type": s.motion_type.name(),
        "mass": s.mass,
        "friction": s.friction,
        "restitution": s.restitution,
        "linear_damping": s.linear_damping,
        "angular_damping": s.angular_damping,
        "layer": s.layer.index(),
        "is_sensor": s.is_sensor,
        "start_active": s.start_active,
        "allow_sleeping": s.allow_sleeping,
        "gravity_scale": s.gravity_scale,
    })
}

/// Shapes the file format cannot express are written as the default box
fn shape_json(shape: &CollisionShape) -> Value {
    match shape {
        CollisionShape::Sphere { radius } => json!({ "type": "sphere", "radius": radius }),
        CollisionShape::Capsule { radius, half_height } => {
            json!({ "type": "capsule", "radius": radius, "half_height": half_height })
        }
        CollisionShape::Cylinder { radius, half_height } => {
            json!({ "type": "cylinder", "radius": radius, "half_height": half_height })
        }
        CollisionShape::Box { half_extents } => json!({ "type": "box", "half_extents": vec3_json(*half_extents) }),
        _ => json!({ "type": "box", "half_extents": vec3_json(Vec3::splat(0.5)) }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gameplay::scenario::default_earth_moon_config;

    fn minimal() -> Value {
        json!({
            "schema_version": 1,
            "celestials": [{ "name": "earth", "mass_kg": 5.972e24, "radius_m": 6.371e6 }],
            "orbiters": [{ "name": "ship", "is_player": true, "orbit_altitude_m": 400000.0 }]
        })
    }

    fn error_text(value: &Value) -> String {
        match parse_scenario_config(&value.to_string()) {
            Ok(_) => String::new(),
            Err(e) => e.to_string(),
        }
    }

    #[test]
    fn test_minimal_uses_defaults() {
        let cfg = parse_scenario_config(&minimal().to_string()).unwrap();
        assert_eq!(cfg.speed_scale, 1.0);
        assert_eq!(cfg.mu_base, DEFAULT_MU_BASE);
        assert_eq!(cfg.system_center, DEFAULT_SYSTEM_CENTER);
        assert_eq!(cfg.orbiters[0].primitive, PrimitiveType::Capsule);
        assert_eq!(cfg.orbiters[0].body_settings, BodySettings::default());
    }

    #[test]
    fn test_missing_mass_names_path() {
        let mut v = minimal();
        v["celestials"][0].as_object_mut().unwrap().remove("mass_kg");
        assert_eq!(error_text(&v), "root.celestials[0].mass_kg: is required");
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let mut v = minimal();
        v["orbiters"][0]["is_player"] = json!("yes");
        assert_eq!(error_text(&v), "root.orbiters[0].is_player: must be a boolean");
    }

    #[test]
    fn test_schema_version_checked() {
        let mut v = minimal();
        v["schema_version"] = json!(2);
        assert!(matches!(
            parse_scenario_config(&v.to_string()),
            Err(ScenarioError::SchemaVersion { found: 2, expected: 1 })
        ));
    }

    #[test]
    fn test_unknown_enums_fall_back() {
        let mut v = minimal();
        v["orbiters"][0]["primitive"] = json!("torus");
        v["orbiters"][0]["body_settings"] = json!({
            "shape": { "type": "cone" },
            "motion_type": "floating"
        });
        let cfg = parse_scenario_config(&v.to_string()).unwrap();
        assert_eq!(cfg.orbiters[0].primitive, PrimitiveType::Sphere);
        assert_eq!(cfg.orbiters[0].body_settings.shape, CollisionShape::default());
        assert_eq!(cfg.orbiters[0].body_settings.motion_type, MotionType::Dynamic);
    }

    #[test]
    fn test_layer_range() {
        let mut v = minimal();
        v["orbiters"][0]["body_settings"] = json!({ "layer": 16 });
        assert_eq!(error_text(&v), "root.orbiters[0].body_settings.layer: must be < 16");
    }

    #[test]
    fn test_terrain_requires_dirs() {
        let mut v = minimal();
        v["celestials"][0]["has_terrain"] = json!(true);
        assert_eq!(
            error_text(&v),
            "root.celestials[0].albedo_dir: is required when has_terrain is true"
        );
    }

    #[test]
    fn test_serialize_round_trip() {
        let cfg = default_earth_moon_config();
        let text = serialize_scenario_config(&cfg);
        assert!(text.contains("\n  \"celestials\""));
        let back = parse_scenario_config(&text).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn test_file_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenarios").join("earth_moon.json");
        let cfg = default_earth_moon_config();
        save_scenario_config(&cfg, &path).unwrap();
        assert_eq!(load_scenario_config(&path), Some(cfg));

        assert_eq!(load_scenario_config(dir.path().join("missing.json")), None);
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(read_scenario_config(&path), Err(ScenarioError::Json(_))));
    }
}
