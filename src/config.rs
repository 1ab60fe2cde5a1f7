use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::gameplay::sim::VelocityOriginMode;
use crate::logging::{LogLevel, LogTarget};

/// Registered game selected with `--game=`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameKind {
    #[default]
    Example,
    RebasingTest,
    SpaceCombat,
}

impl GameKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "example" => Some(GameKind::Example),
            "rebasing_test" => Some(GameKind::RebasingTest),
            "space_combat" | "sc" => Some(GameKind::SpaceCombat),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GameKind::Example => "example",
            GameKind::RebasingTest => "rebasing_test",
            GameKind::SpaceCombat => "space_combat",
        }
    }
}

/// Command line options (`--key=value`)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LaunchOptions {
    pub game: GameKind,
    pub log_target: LogTarget,
    pub log_level: LogLevel,
}

impl LaunchOptions {
    /// Parse arguments (without the program name). Bad flags are collected
    /// and the affected option keeps its default.
    pub fn parse<I, S>(args: I) -> (Self, Vec<ConfigError>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();
        let mut errors = Vec::new();

        for arg in args {
            let arg = arg.as_ref();
            let Some(body) = arg.strip_prefix("--") else {
                errors.push(ConfigError::UnknownFlag(arg.to_string()));
                continue;
            };
            let (key, value) = body.split_once('=').unwrap_or((body, ""));

            let invalid = || ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            };
            match key {
                "game" => match GameKind::parse(value) {
                    Some(game) => options.game = game,
                    None => errors.push(invalid()),
                },
                "log" => match LogTarget::parse(value) {
                    Some(target) => options.log_target = target,
                    None => errors.push(invalid()),
                },
                "log-level" => match LogLevel::parse(value) {
                    Some(level) => options.log_level = level,
                    None => errors.push(invalid()),
                },
                _ => errors.push(ConfigError::UnknownFlag(arg.to_string())),
            }
        }

        (options, errors)
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub physics: PhysicsConfigData,
    pub prediction: PredictionConfigData,
    pub debug_draw: DebugDrawConfigData,
    pub runtime: RuntimeConfigData,
}

impl EngineConfig {
    /// Load configuration from JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file with pretty formatting
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::load(path).unwrap_or_else(|_| {
            let config = Self::default();
            // Try to save the default config
            let _ = config.save(path);
            config
        })
    }
}

/// Fixed step and floating origin tunables
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhysicsConfigData {
    pub fixed_dt: f64,
    pub origin_threshold_m: f64,
    pub origin_snap_m: f64,
    pub velocity_threshold_mps: f64,
    pub velocity_origin_mode: VelocityOriginMode,
}

impl Default for PhysicsConfigData {
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            origin_threshold_m: 20_000.0,
            origin_snap_m: 10_000.0,
            velocity_threshold_mps: 2_000.0,
            velocity_origin_mode: VelocityOriginMode::FreeFallAnchorFrame,
        }
    }
}

/// Orbit prediction refresh and drawing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PredictionConfigData {
    pub enabled: bool,
    pub thrust_refresh_s: f64,
    pub periodic_refresh_s: f64,
    pub future_window_s: f64,
    pub draw_full_orbit: bool,
    pub draw_future_segment: bool,
    pub draw_velocity_ray: bool,
}

impl Default for PredictionConfigData {
    fn default() -> Self {
        Self {
            enabled: true,
            thrust_refresh_s: 0.1,
            periodic_refresh_s: 0.0,
            future_window_s: 120.0,
            draw_full_orbit: true,
            draw_future_segment: true,
            draw_velocity_ray: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugDrawConfigData {
    pub enabled: bool,
    pub segments: u32,
    pub layer_mask: u32,
    pub physics_colliders: crate::debug_draw::PhysicsDebugSettings,
}

impl Default for DebugDrawConfigData {
    fn default() -> Self {
        Self {
            enabled: true,
            segments: 32,
            layer_mask: crate::debug_draw::DebugDrawLayer::ALL_MASK,
            physics_colliders: crate::debug_draw::PhysicsDebugSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfigData {
    /// Headless frame bound, 0 = unlimited
    pub max_frames: u64,
    /// Optional scenario JSON
    pub scenario_path: Option<String>,
}

/// Serde adapter: `DVec3` as `{x, y, z}`
pub mod dvec3_serde {
    use glam::DVec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct DVec3Data {
        x: f64,
        y: f64,
        z: f64,
    }

    pub fn serialize<S>(vec: &DVec3, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        DVec3Data {
            x: vec.x,
            y: vec.y,
            z: vec.z,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DVec3, D::Error>
    where
        D: Deserializer<'de>,
    {
        let data = DVec3Data::deserialize(deserializer)?;
        Ok(DVec3::new(data.x, data.y, data.z))
    }
}

/// Serde adapter: `Vec3` as `{x, y, z}`
pub mod vec3_serde {
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Vec3Data {
        x: f32,
        y: f32,
        z: f32,
    }

    pub fn serialize<S>(vec: &Vec3, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Vec3Data {
            x: vec.x,
            y: vec.y,
            z: vec.z,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec3, D::Error>
    where
        D: Deserializer<'de>,
    {
        let data = Vec3Data::deserialize(deserializer)?;
        Ok(Vec3::new(data.x, data.y, data.z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.physics.origin_threshold_m, 20_000.0);
        assert_eq!(config.debug_draw.segments, 32);
        assert_eq!(config.runtime.max_frames, 0);
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");

        let mut config = EngineConfig::default();
        config.prediction.future_window_s = 42.0;
        config.save(&path).unwrap();
        let loaded = EngineConfig::load(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_parse_launch_options() {
        let (opts, errors) = LaunchOptions::parse(["--game=sc", "--log=both", "--log-level=debug"]);
        assert!(errors.is_empty());
        assert_eq!(opts.game, GameKind::SpaceCombat);
        assert_eq!(opts.log_target, LogTarget::Both);
        assert_eq!(opts.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_bad_flags_fall_back() {
        let (opts, errors) = LaunchOptions::parse(["--game=pong", "--verbose"]);
        assert_eq!(opts.game, GameKind::Example);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1], ConfigError::UnknownFlag("--verbose".into()));
    }
}
