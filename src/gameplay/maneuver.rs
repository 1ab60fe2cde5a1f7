/// Maneuver nodes: planned impulsive burns in the reference body's RTN frame
///
/// Node edits only touch this state; the gameplay state turns the result
/// into prediction rebuilds, warp-to requests and the actual velocity change.

use glam::{DVec3, Vec4};

use crate::debug_draw::{DebugDrawLayer, DebugDrawSystem, DebugStyle};
use crate::orbit::{
    compute_rtn_frame, sample_state_hermite, sample_state_linear, BodyId, ManeuverImpulse, ManeuverPlan, RtnFrame,
    SpacecraftId, TrajectorySample,
};
use crate::world::{safe_length, WorldVec3};

/// A node fires once `now + EXECUTE_EPS_S >= time_s`
pub const EXECUTE_EPS_S: f64 = 1.0e-4;
/// Default lead time of a freshly added node
pub const NEW_NODE_LEAD_S: f64 = 60.0;

const NODE_RADIUS_M: f32 = 9_000.0;
const RTN_AXIS_LENGTH_M: f64 = 30_000.0;
const DV_ARROW_MIN_MPS: f64 = 0.05;
const NODE_COLOR: Vec4 = Vec4::new(0.3, 0.8, 1.0, 0.85);
const SELECTED_COLOR: Vec4 = Vec4::new(1.0, 0.82, 0.25, 0.95);
const DV_COLOR: Vec4 = Vec4::new(0.2, 0.7, 1.0, 0.9);
const R_COLOR: Vec4 = Vec4::new(1.0, 0.25, 0.25, 0.75);
const T_COLOR: Vec4 = Vec4::new(0.25, 1.0, 0.25, 0.75);
const N_COLOR: Vec4 = Vec4::new(0.25, 0.6, 1.0, 0.75);

#[derive(Debug, Clone, PartialEq)]
pub struct ManeuverNode {
    pub id: u32,
    /// Absolute sim time
    pub time_s: f64,
    /// (radial, tangential, normal)
    pub dv_rtn_mps: DVec3,
    // Derived, refreshed when the overlay is drawn
    pub total_dv_mps: f64,
    pub position_world: WorldVec3,
    pub burn_direction_world: DVec3,
}

impl ManeuverNode {
    pub fn new(id: u32, time_s: f64) -> Self {
        Self {
            id,
            time_s,
            dv_rtn_mps: DVec3::ZERO,
            total_dv_mps: 0.0,
            position_world: DVec3::ZERO,
            burn_direction_world: DVec3::ZERO,
        }
    }
}

/// Pending warp that ends at a target time and restores a warp level
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WarpToTime {
    pub active: bool,
    pub target_s: f64,
    pub restore_level: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManeuverState {
    /// Sorted by time
    pub nodes: Vec<ManeuverNode>,
    pub selected_node_id: Option<u32>,
    pub execute_armed: bool,
    pub execute_node_id: Option<u32>,
    pub warp_to: WarpToTime,
    pub enabled: bool,
    pub debug_draw: bool,
    next_node_id: u32,
}

impl Default for ManeuverState {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            selected_node_id: None,
            execute_armed: false,
            execute_node_id: None,
            warp_to: WarpToTime::default(),
            enabled: true,
            debug_draw: true,
            next_node_id: 0,
        }
    }
}

impl ManeuverState {
    pub fn find(&self, id: u32) -> Option<&ManeuverNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn find_mut(&mut self, id: u32) -> Option<&mut ManeuverNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn selected(&self) -> Option<&ManeuverNode> {
        self.selected_node_id.and_then(|id| self.find(id))
    }

    /// New zero-dv node `NEW_NODE_LEAD_S` ahead, selected
    pub fn add_node(&mut self, now_s: f64) -> u32 {
        let id = self.next_node_id;
        self.next_node_id += 1;
        self.nodes.push(ManeuverNode::new(id, now_s + NEW_NODE_LEAD_S));
        self.selected_node_id = Some(id);
        self.sort();
        id
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.selected_node_id = None;
        self.disarm();
    }

    pub fn delete(&mut self, id: u32) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.id != id);
        if self.nodes.len() == before {
            return false;
        }
        if self.execute_node_id == Some(id) {
            self.disarm();
        }
        if self.selected_node_id == Some(id) {
            self.selected_node_id = self.nodes.first().map(|n| n.id);
        }
        true
    }

    pub fn select(&mut self, id: u32) -> bool {
        if self.find(id).is_none() {
            return false;
        }
        self.selected_node_id = Some(id);
        true
    }

    /// Node times never move into the past
    pub fn set_node_time(&mut self, id: u32, time_s: f64, now_s: f64) -> bool {
        let Some(node) = self.find_mut(id) else {
            return false;
        };
        node.time_s = if time_s.is_finite() { time_s.max(now_s) } else { now_s };
        self.sort();
        true
    }

    pub fn set_node_dv(&mut self, id: u32, dv_rtn_mps: DVec3) -> bool {
        let Some(node) = self.find_mut(id) else {
            return false;
        };
        node.dv_rtn_mps = if dv_rtn_mps.is_finite() { dv_rtn_mps } else { DVec3::ZERO };
        node.total_dv_mps = safe_length(node.dv_rtn_mps);
        true
    }

    pub fn arm(&mut self, id: u32) -> bool {
        if self.find(id).is_none() {
            return false;
        }
        self.execute_armed = true;
        self.execute_node_id = Some(id);
        true
    }

    pub fn disarm(&mut self) {
        self.execute_armed = false;
        self.execute_node_id = None;
    }

    /// Armed node whose time has come
    pub fn due_node(&self, now_s: f64) -> Option<&ManeuverNode> {
        if !self.execute_armed {
            return None;
        }
        let node = self.find(self.execute_node_id?)?;
        (now_s + EXECUTE_EPS_S >= node.time_s).then_some(node)
    }

    /// Drop an executed node, reselect the earliest remaining one and disarm
    pub fn finish_execution(&mut self, id: u32) {
        self.nodes.retain(|n| n.id != id);
        self.selected_node_id = self.nodes.first().map(|n| n.id);
        self.disarm();
    }

    pub fn start_warp_to(&mut self, target_s: f64, restore_level: i32) {
        self.warp_to = WarpToTime {
            active: true,
            target_s,
            restore_level,
        };
    }

    pub fn cancel_warp_to(&mut self) {
        self.warp_to.active = false;
    }

    pub fn max_time_s(&self) -> Option<f64> {
        self.nodes.iter().map(|n| n.time_s).reduce(f64::max)
    }

    /// Impulse plan for one spacecraft, skipping nodes before `now_s`
    pub fn to_plan(&self, spacecraft_id: SpacecraftId, rtn_body: BodyId, now_s: f64) -> ManeuverPlan {
        ManeuverPlan::new(
            self.nodes
                .iter()
                .filter(|n| n.time_s >= now_s)
                .map(|n| ManeuverImpulse {
                    spacecraft_id,
                    time_s: n.time_s,
                    dv_rtn_mps: n.dv_rtn_mps,
                    rtn_body,
                })
                .collect(),
        )
    }

    fn sort(&mut self) {
        self.nodes.sort_by(|a, b| a.time_s.total_cmp(&b.time_s));
    }
}

/// RTN frame and world position of the trajectory at `t_s`. The basis uses
/// linear interpolation just before the node so the burn does not skew it.
fn node_frame(trajectory_bci: &[TrajectorySample], ref_body_world: WorldVec3, t_s: f64) -> Option<(WorldVec3, RtnFrame)> {
    let at = sample_state_hermite(trajectory_bci, t_s)?;
    let basis = sample_state_linear(trajectory_bci, t_s - 1.0e-3)?;
    if !at.is_finite() || !basis.is_finite() {
        return None;
    }
    Some((
        ref_body_world + at.position_m,
        compute_rtn_frame(basis.position_m, basis.velocity_mps),
    ))
}

/// Refresh derived node fields and draw markers, dv arrows and the RTN axes
/// of the selected node
pub fn emit_maneuver_debug(
    state: &mut ManeuverState,
    draw: &mut DebugDrawSystem,
    trajectory_bci: &[TrajectorySample],
    ref_body_world: WorldVec3,
    align_delta: DVec3,
    ttl_s: f32,
) {
    let selected = state.selected_node_id;
    for node in &mut state.nodes {
        let Some((position, frame)) = node_frame(trajectory_bci, ref_body_world, node.time_s) else {
            continue;
        };
        let position = position + align_delta;
        let dv_world = frame.to_world(node.dv_rtn_mps);
        node.position_world = position;
        node.total_dv_mps = safe_length(node.dv_rtn_mps);
        node.burn_direction_world = crate::world::normalized_or(dv_world, DVec3::ZERO);

        let is_selected = selected == Some(node.id);
        let color = if is_selected { SELECTED_COLOR } else { NODE_COLOR };
        let style = DebugStyle::new(color).ttl(ttl_s).on_top().layer(DebugDrawLayer::Misc);
        draw.add_sphere(position, NODE_RADIUS_M, &style);

        if node.total_dv_mps > DV_ARROW_MIN_MPS {
            let length = (node.total_dv_mps * 100.0).clamp(1.0e3, 1.0e5);
            let dv_style = DebugStyle::new(DV_COLOR).ttl(ttl_s).on_top().layer(DebugDrawLayer::Misc);
            draw.add_ray(position, dv_world, length, &dv_style);
        }

        if is_selected {
            for (axis, color) in [(frame.r, R_COLOR), (frame.t, T_COLOR), (frame.n, N_COLOR)] {
                let axis_style = DebugStyle::new(color).ttl(ttl_s).on_top().layer(DebugDrawLayer::Misc);
                draw.add_ray(position, axis, RTN_AXIS_LENGTH_M, &axis_style);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_selects_and_sorts() {
        let mut m = ManeuverState::default();
        let a = m.add_node(100.0);
        let b = m.add_node(0.0);
        assert_eq!(m.selected_node_id, Some(b));
        assert_eq!(m.nodes[0].id, b);
        assert_eq!(m.nodes[1].id, a);
        assert_eq!(m.nodes[0].time_s, 60.0);
    }

    #[test]
    fn test_time_clamped_to_now() {
        let mut m = ManeuverState::default();
        let id = m.add_node(0.0);
        m.set_node_time(id, 5.0, 30.0);
        assert_eq!(m.find(id).map(|n| n.time_s), Some(30.0));
    }

    #[test]
    fn test_due_node_requires_arming() {
        let mut m = ManeuverState::default();
        let id = m.add_node(0.0);
        assert!(m.due_node(100.0).is_none());
        m.arm(id);
        assert!(m.due_node(59.0).is_none());
        assert_eq!(m.due_node(60.0 - 0.5e-4).map(|n| n.id), Some(id));
    }

    #[test]
    fn test_finish_reselects_first() {
        let mut m = ManeuverState::default();
        let a = m.add_node(0.0);
        let b = m.add_node(10.0);
        m.arm(a);
        m.finish_execution(a);
        assert_eq!(m.selected_node_id, Some(b));
        assert!(!m.execute_armed);
        m.finish_execution(b);
        assert_eq!(m.selected_node_id, None);
    }

    #[test]
    fn test_plan_skips_past_nodes() {
        let mut m = ManeuverState::default();
        let a = m.add_node(0.0);
        m.add_node(100.0);
        m.set_node_dv(a, DVec3::new(0.0, 5.0, 0.0));
        let plan = m.to_plan(SpacecraftId(1), BodyId(1), 100.0);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.max_time_s(), Some(160.0));
    }
}
