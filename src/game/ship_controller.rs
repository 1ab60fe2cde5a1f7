/// Keyboard ship control
///
/// Translation: W/S forward/back (-Z/+Z), A/D left/right, Space/LeftCtrl up/down.
/// Rotation: arrows pitch/yaw, Q/E roll. T toggles SAS (edge triggered).
/// Thrust and torque are given in ship space and rotated into the physics frame
/// by the body's current rotation.

use std::any::Any;

use glam::Vec3;
use winit::keyboard::KeyCode;

use super::component::{Component, ComponentContext};
use super::entity::Entity;

/// Angular speed below which SAS snaps the residual to zero
const SAS_REST_EPS: f32 = 1.0e-4;

#[derive(Debug, Clone)]
pub struct ShipController {
    pub thrust_force: f32,
    pub torque_strength: f32,
    /// Exponential damping rate (1/s) applied while SAS is on
    pub sas_damping: f32,
    pub sas_enabled: bool,
    pub enabled: bool,
    sas_toggle_prev_down: bool,
    last_thrust_dir: Vec3,
    thrust_applied_this_tick: bool,
}

impl Default for ShipController {
    fn default() -> Self {
        Self::new(500.0, 50.0)
    }
}

impl ShipController {
    pub fn new(thrust_force: f32, torque_strength: f32) -> Self {
        Self {
            thrust_force,
            torque_strength,
            sas_damping: 5.0,
            sas_enabled: false,
            enabled: true,
            sas_toggle_prev_down: false,
            last_thrust_dir: Vec3::ZERO,
            thrust_applied_this_tick: false,
        }
    }

    pub fn with_sas(mut self, enabled: bool) -> Self {
        self.sas_enabled = enabled;
        self
    }

    pub fn last_thrust_dir(&self) -> Vec3 {
        self.last_thrust_dir
    }

    pub fn thrust_applied_this_tick(&self) -> bool {
        self.thrust_applied_this_tick
    }

    /// Ship-space unit thrust direction from held keys
    pub fn read_thrust(down: impl Fn(KeyCode) -> bool) -> Vec3 {
        let mut t = Vec3::ZERO;
        if down(KeyCode::KeyW) {
            t.z -= 1.0;
        }
        if down(KeyCode::KeyS) {
            t.z += 1.0;
        }
        if down(KeyCode::KeyA) {
            t.x -= 1.0;
        }
        if down(KeyCode::KeyD) {
            t.x += 1.0;
        }
        if down(KeyCode::Space) {
            t.y += 1.0;
        }
        if down(KeyCode::ControlLeft) {
            t.y -= 1.0;
        }
        t.normalize_or_zero()
    }

    /// Ship-space unit torque direction from held keys
    pub fn read_torque(down: impl Fn(KeyCode) -> bool) -> Vec3 {
        let mut t = Vec3::ZERO;
        if down(KeyCode::ArrowUp) {
            t.x -= 1.0;
        }
        if down(KeyCode::ArrowDown) {
            t.x += 1.0;
        }
        if down(KeyCode::ArrowLeft) {
            t.y += 1.0;
        }
        if down(KeyCode::ArrowRight) {
            t.y -= 1.0;
        }
        if down(KeyCode::KeyQ) {
            t.z -= 1.0;
        }
        if down(KeyCode::KeyE) {
            t.z += 1.0;
        }
        t.normalize_or_zero()
    }

    /// Toggle SAS on the rising edge of `toggle_down`. Fixed updates may run
    /// several times per frame, so the edge is tracked here rather than using
    /// the per-frame pressed set.
    pub fn update_sas_toggle(&mut self, toggle_down: bool) {
        if toggle_down && !self.sas_toggle_prev_down {
            self.sas_enabled = !self.sas_enabled;
        }
        self.sas_toggle_prev_down = toggle_down;
    }

    /// ω · exp(-k·dt), snapping tiny residuals to zero
    pub fn damp_angular_velocity(&self, omega: Vec3, dt: f32) -> Vec3 {
        let k = self.sas_damping.max(0.0);
        let damped = omega * (-k * dt.max(0.0)).exp();
        if damped.length() < SAS_REST_EPS {
            Vec3::ZERO
        } else {
            damped
        }
    }
}

impl Component for ShipController {
    fn on_fixed_update(&mut self, entity: &mut Entity, ctx: &mut ComponentContext, fixed_dt: f32) {
        self.thrust_applied_this_tick = false;
        let Some(input) = ctx.input else {
            return;
        };
        let body = entity.body_id();
        let Some(physics) = ctx.physics.as_deref_mut() else {
            return;
        };
        if !physics.is_body_valid(body) {
            return;
        }

        let allow_keyboard = !ctx.ui_capture_keyboard;
        let down = |key: KeyCode| allow_keyboard && input.key_down_raw(key);

        self.update_sas_toggle(down(KeyCode::KeyT));

        let local_thrust = Self::read_thrust(down);
        let local_torque = Self::read_torque(down);
        self.last_thrust_dir = local_thrust;
        let has_rotation_input = local_torque != Vec3::ZERO;

        let rotation = physics.get_rotation(body);
        let world_force = rotation * (local_thrust * self.thrust_force);
        let world_torque = rotation * (local_torque * self.torque_strength);

        if world_force.length_squared() > 0.0 {
            physics.add_force(body, world_force);
            self.thrust_applied_this_tick = true;
        }
        if world_torque.length_squared() > 0.0 {
            physics.add_torque(body, world_torque);
        }

        if self.sas_enabled && !has_rotation_input {
            let omega = physics.get_angular_velocity(body);
            if omega != Vec3::ZERO {
                physics.set_angular_velocity(body, self.damp_angular_velocity(omega, fixed_dt));
            }
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
