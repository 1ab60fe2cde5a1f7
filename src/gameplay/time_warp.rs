/// Time-warp levels and modes
///
/// Level 0 is realtime, 1..=3 run extra physics substeps, 4..=6 freeze the
/// rigid-body world and advance only the rails simulator.

pub const WARP_FACTORS: [f64; 7] = [1.0, 2.0, 5.0, 10.0, 50.0, 100.0, 1000.0];
pub const MAX_PHYSICS_WARP_LEVEL: i32 = 3;
pub const MAX_WARP_LEVEL: i32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WarpMode {
    #[default]
    Realtime,
    PhysicsWarp,
    RailsWarp,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimeWarpState {
    pub mode: WarpMode,
    pub warp_level: i32,
}

impl TimeWarpState {
    pub fn factor(&self) -> f64 {
        factor_for_level(self.warp_level)
    }

    /// Physics substeps per fixed update outside rails warp
    pub fn physics_substeps(&self) -> u32 {
        match self.mode {
            WarpMode::RailsWarp => 0,
            _ => self.factor().floor().max(1.0) as u32,
        }
    }

    pub fn is_rails(&self) -> bool {
        self.mode == WarpMode::RailsWarp
    }
}

pub fn factor_for_level(level: i32) -> f64 {
    WARP_FACTORS[level.clamp(0, MAX_WARP_LEVEL) as usize]
}

pub fn mode_for_level(level: i32) -> WarpMode {
    if level <= 0 {
        WarpMode::Realtime
    } else if level <= MAX_PHYSICS_WARP_LEVEL {
        WarpMode::PhysicsWarp
    } else {
        WarpMode::RailsWarp
    }
}

/// Highest rails level whose step fits in `remaining_s`; the lowest rails
/// level when none does (the caller clamps that last step).
pub fn rails_level_for_remaining(fixed_dt_s: f64, remaining_s: f64) -> i32 {
    (MAX_PHYSICS_WARP_LEVEL + 1..=MAX_WARP_LEVEL)
        .rev()
        .find(|&level| fixed_dt_s * factor_for_level(level) <= remaining_s)
        .unwrap_or(MAX_PHYSICS_WARP_LEVEL + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_for_level() {
        assert_eq!(mode_for_level(-1), WarpMode::Realtime);
        assert_eq!(mode_for_level(0), WarpMode::Realtime);
        assert_eq!(mode_for_level(2), WarpMode::PhysicsWarp);
        assert_eq!(mode_for_level(3), WarpMode::PhysicsWarp);
        assert_eq!(mode_for_level(4), WarpMode::RailsWarp);
        assert_eq!(mode_for_level(6), WarpMode::RailsWarp);
    }

    #[test]
    fn test_factor_clamps() {
        assert_eq!(factor_for_level(99), 1000.0);
        assert_eq!(factor_for_level(-3), 1.0);
    }

    #[test]
    fn test_rails_level_for_remaining() {
        let dt = 1.0 / 60.0;
        assert_eq!(rails_level_for_remaining(dt, 3600.0), 6);
        assert_eq!(rails_level_for_remaining(dt, 2.0), 5);
        assert_eq!(rails_level_for_remaining(dt, 0.9), 4);
        assert_eq!(rails_level_for_remaining(dt, 0.01), 4);
    }

    #[test]
    fn test_physics_substeps() {
        let warp = TimeWarpState {
            mode: WarpMode::PhysicsWarp,
            warp_level: 2,
        };
        assert_eq!(warp.physics_substeps(), 5);
        assert_eq!(TimeWarpState::default().physics_substeps(), 1);
    }
}
