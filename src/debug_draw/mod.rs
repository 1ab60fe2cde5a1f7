/// Debug line drawing
///
/// Commands are queued in world space with a time-to-live, then tessellated
/// into line-list vertices relative to a render origin. Output is split into
/// two contiguous buckets: depth-tested first, then always-on-top overlay.

use bytemuck::{Pod, Zeroable};
use glam::{DVec3, Quat, Vec3, Vec4};

use crate::world::{world_to_local, WorldVec3};

pub mod colliders;

pub use colliders::{debug_draw_physics_colliders, PhysicsDebugSettings};

pub const MIN_SEGMENTS: u32 = 3;
pub const MAX_SEGMENTS: u32 = 256;
pub const MAX_CONE_ANGLE_DEG: f32 = 89.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugDepth {
    #[default]
    DepthTested,
    AlwaysOnTop,
}

/// Category bits used to filter commands at build time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DebugDrawLayer {
    Physics = 1 << 0,
    Picking = 1 << 1,
    Lights = 1 << 2,
    Particles = 1 << 3,
    Volumetrics = 1 << 4,
    Misc = 1 << 5,
}

impl DebugDrawLayer {
    pub const ALL_MASK: u32 = 0x3f;

    pub fn bit(self) -> u32 {
        self as u32
    }
}

/// Line-list vertex, layout-compatible with the debug line shader
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DebugDrawVertex {
    pub position: Vec3,
    pub _pad: f32,
    pub color: Vec4,
}

impl DebugDrawVertex {
    pub fn new(position: Vec3, color: Vec4) -> Self {
        Self {
            position,
            _pad: 0.0,
            color,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebugDrawSettings {
    pub enabled: bool,
    pub show_depth_tested: bool,
    pub show_overlay: bool,
    pub layer_mask: u32,
    pub segments: u32,
}

impl Default for DebugDrawSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            show_depth_tested: true,
            show_overlay: true,
            layer_mask: DebugDrawLayer::ALL_MASK,
            segments: 32,
        }
    }
}

/// Color, lifetime, depth mode and layer of a submitted command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugStyle {
    pub color: Vec4,
    /// Seconds to live; zero, negative or non-finite means one frame
    pub seconds: f32,
    pub depth: DebugDepth,
    pub layer: DebugDrawLayer,
}

impl DebugStyle {
    pub fn new(color: Vec4) -> Self {
        Self {
            color,
            seconds: 0.0,
            depth: DebugDepth::DepthTested,
            layer: DebugDrawLayer::Misc,
        }
    }

    pub fn ttl(mut self, seconds: f32) -> Self {
        self.seconds = seconds;
        self
    }

    pub fn depth(mut self, depth: DebugDepth) -> Self {
        self.depth = depth;
        self
    }

    pub fn on_top(self) -> Self {
        self.depth(DebugDepth::AlwaysOnTop)
    }

    pub fn layer(mut self, layer: DebugDrawLayer) -> Self {
        self.layer = layer;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Primitive {
    Line {
        a: WorldVec3,
        b: WorldVec3,
    },
    Aabb {
        center: WorldVec3,
        half_extents: Vec3,
    },
    Sphere {
        center: WorldVec3,
        radius: f32,
    },
    Capsule {
        p0: WorldVec3,
        p1: WorldVec3,
        radius: f32,
    },
    Circle {
        center: WorldVec3,
        normal: DVec3,
        radius: f32,
    },
    Cone {
        apex: WorldVec3,
        direction: DVec3,
        length: f32,
        angle_degrees: f32,
    },
    Obb {
        corners: [WorldVec3; 8],
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Command {
    primitive: Primitive,
    color: Vec4,
    depth: DebugDepth,
    layer: DebugDrawLayer,
    /// Negative means one frame
    ttl_seconds: f32,
}

/// Tessellated output: `vertices[..depth_vertex_count]` are depth tested,
/// the remaining `overlay_vertex_count` are drawn on top.
#[derive(Debug, Clone, Default)]
pub struct LineVertexLists {
    pub vertices: Vec<DebugDrawVertex>,
    pub depth_vertex_count: u32,
    pub overlay_vertex_count: u32,
}

impl LineVertexLists {
    pub fn depth_vertices(&self) -> &[DebugDrawVertex] {
        &self.vertices[..self.depth_vertex_count as usize]
    }

    pub fn overlay_vertices(&self) -> &[DebugDrawVertex] {
        &self.vertices[self.depth_vertex_count as usize..]
    }
}

#[derive(Debug, Clone, Default)]
pub struct DebugDrawSystem {
    pub settings: DebugDrawSettings,
    commands: Vec<Command>,
}

fn ttl_from_seconds(seconds: f32) -> f32 {
    if !seconds.is_finite() || seconds <= 0.0 {
        -1.0
    } else {
        seconds
    }
}

fn clamp_nonnegative_finite(v: f32) -> f32 {
    if v.is_finite() {
        v.max(0.0)
    } else {
        0.0
    }
}

fn clamp_segments(segments: u32) -> u32 {
    segments.clamp(MIN_SEGMENTS, MAX_SEGMENTS)
}

fn safe_normalize(v: Vec3, fallback: Vec3) -> Vec3 {
    let len2 = v.length_squared();
    if !len2.is_finite() || len2 <= 1.0e-12 {
        return fallback;
    }
    v / len2.sqrt()
}

/// Orthonormal pair perpendicular to `n`
pub fn basis_from_normal(n: Vec3) -> (Vec3, Vec3) {
    let nn = safe_normalize(n, Vec3::Y);
    let a = if nn.y.abs() < 0.999 { Vec3::Y } else { Vec3::X };
    let u = safe_normalize(nn.cross(a), Vec3::X);
    let v = safe_normalize(nn.cross(u), Vec3::Z);
    (u, v)
}

fn push_line(dst: &mut Vec<DebugDrawVertex>, a: Vec3, b: Vec3, color: Vec4) {
    dst.push(DebugDrawVertex::new(a, color));
    dst.push(DebugDrawVertex::new(b, color));
}

const BOX_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 3),
    (3, 2),
    (2, 0),
    (4, 5),
    (5, 7),
    (7, 6),
    (6, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

fn box_corners(e: Vec3) -> [Vec3; 8] {
    [
        Vec3::new(-e.x, -e.y, -e.z),
        Vec3::new(e.x, -e.y, -e.z),
        Vec3::new(-e.x, e.y, -e.z),
        Vec3::new(e.x, e.y, -e.z),
        Vec3::new(-e.x, -e.y, e.z),
        Vec3::new(e.x, -e.y, e.z),
        Vec3::new(-e.x, e.y, e.z),
        Vec3::new(e.x, e.y, e.z),
    ]
}

fn emit_box(dst: &mut Vec<DebugDrawVertex>, corners: &[Vec3; 8], color: Vec4) {
    for &(a, b) in BOX_EDGES.iter() {
        push_line(dst, corners[a], corners[b], color);
    }
}

fn emit_circle(dst: &mut Vec<DebugDrawVertex>, center: Vec3, normal: Vec3, radius: f32, segments: u32, color: Vec4) {
    let radius = clamp_nonnegative_finite(radius);
    if radius <= 0.0 {
        return;
    }
    let (u, v) = basis_from_normal(normal);
    let seg = clamp_segments(segments);

    let mut prev = Vec3::ZERO;
    for i in 0..=seg {
        let t = i as f32 / seg as f32 * std::f32::consts::TAU;
        let p = center + (u * t.cos() + v * t.sin()) * radius;
        if i > 0 {
            push_line(dst, prev, p, color);
        }
        prev = p;
    }
}

fn emit_sphere(dst: &mut Vec<DebugDrawVertex>, center: Vec3, radius: f32, segments: u32, color: Vec4) {
    let radius = clamp_nonnegative_finite(radius);
    if radius <= 0.0 {
        return;
    }
    emit_circle(dst, center, Vec3::Z, radius, segments, color);
    emit_circle(dst, center, Vec3::Y, radius, segments, color);
    emit_circle(dst, center, Vec3::X, radius, segments, color);
}

fn emit_cone(
    dst: &mut Vec<DebugDrawVertex>,
    apex: Vec3,
    direction: Vec3,
    length: f32,
    angle_degrees: f32,
    segments: u32,
    color: Vec4,
) {
    let length = clamp_nonnegative_finite(length);
    if length <= 0.0 {
        return;
    }
    let angle = if angle_degrees.is_finite() { angle_degrees } else { 0.0 };
    let angle = angle.clamp(0.0, MAX_CONE_ANGLE_DEG);
    let radius = length * angle.to_radians().tan();

    let dir = safe_normalize(direction, Vec3::NEG_Y);
    let base = apex + dir * length;
    push_line(dst, apex, base, color);

    let (u, v) = basis_from_normal(dir);
    let seg = clamp_segments(segments);
    let mut first = Vec3::ZERO;
    let mut prev = Vec3::ZERO;
    for i in 0..seg {
        let t = i as f32 / seg as f32 * std::f32::consts::TAU;
        let p = base + (u * t.cos() + v * t.sin()) * radius;
        if i == 0 {
            first = p;
        } else {
            push_line(dst, prev, p, color);
        }
        push_line(dst, apex, p, color);
        prev = p;
    }
    push_line(dst, prev, first, color);
}

fn emit_capsule(dst: &mut Vec<DebugDrawVertex>, p0: Vec3, p1: Vec3, radius: f32, segments: u32, color: Vec4) {
    let radius = clamp_nonnegative_finite(radius);
    if radius <= 0.0 {
        return;
    }
    let axis = p1 - p0;
    let axis_len2 = axis.length_squared();
    if !axis_len2.is_finite() || axis_len2 <= 1.0e-10 {
        emit_sphere(dst, p0, radius, segments, color);
        return;
    }
    let u = axis / axis_len2.sqrt();
    let a = if u.y.abs() < 0.999 { Vec3::Y } else { Vec3::X };
    let v = safe_normalize(u.cross(a), Vec3::X);
    let w = safe_normalize(u.cross(v), Vec3::Z);

    let seg = clamp_segments(segments);

    let (mut prev0, mut prev1, mut first0, mut first1) = (Vec3::ZERO, Vec3::ZERO, Vec3::ZERO, Vec3::ZERO);
    for i in 0..seg {
        let t = i as f32 / seg as f32 * std::f32::consts::TAU;
        let offset = (v * t.cos() + w * t.sin()) * radius;
        let a0 = p0 + offset;
        let a1 = p1 + offset;
        if i == 0 {
            first0 = a0;
            first1 = a1;
        } else {
            push_line(dst, prev0, a0, color);
            push_line(dst, prev1, a1, color);
        }
        push_line(dst, a0, a1, color);
        prev0 = a0;
        prev1 = a1;
    }
    push_line(dst, prev0, first0, color);
    push_line(dst, prev1, first1, color);

    // Two meridian arcs per hemisphere
    let half_seg = (seg / 2).max(3);
    for i in 0..half_seg {
        let t0 = i as f32 / half_seg as f32 * std::f32::consts::PI;
        let t1 = (i + 1) as f32 / half_seg as f32 * std::f32::consts::PI;
        for side in [v, w] {
            push_line(
                dst,
                p0 + (side * t0.cos() - u * t0.sin()) * radius,
                p0 + (side * t1.cos() - u * t1.sin()) * radius,
                color,
            );
            push_line(
                dst,
                p1 + (side * t0.cos() + u * t0.sin()) * radius,
                p1 + (side * t1.cos() + u * t1.sin()) * radius,
                color,
            );
        }
    }
}

impl DebugDrawSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Expire one-frame commands and age timed ones. Call before new submissions.
    pub fn begin_frame(&mut self, dt_seconds: f32) {
        let dt = if dt_seconds.is_finite() && dt_seconds > 0.0 {
            dt_seconds
        } else {
            0.0
        };
        self.commands.retain_mut(|cmd| {
            if cmd.ttl_seconds < 0.0 {
                return false;
            }
            if dt > 0.0 {
                cmd.ttl_seconds -= dt;
            }
            cmd.ttl_seconds > 0.0
        });
    }

    fn push(&mut self, primitive: Primitive, style: &DebugStyle) {
        self.commands.push(Command {
            primitive,
            color: style.color,
            depth: style.depth,
            layer: style.layer,
            ttl_seconds: ttl_from_seconds(style.seconds),
        });
    }

    pub fn add_line(&mut self, a: WorldVec3, b: WorldVec3, style: &DebugStyle) {
        self.push(Primitive::Line { a, b }, style);
    }

    /// Non-positive or non-finite lengths are ignored; a zero direction draws along +Y.
    pub fn add_ray(&mut self, origin: WorldVec3, direction: DVec3, length: f64, style: &DebugStyle) {
        if !length.is_finite() || length <= 0.0 {
            return;
        }
        let len2 = direction.length_squared();
        let d = if !len2.is_finite() || len2 <= 1.0e-18 {
            DVec3::Y
        } else {
            direction / len2.sqrt()
        };
        self.add_line(origin, origin + d * length, style);
    }

    pub fn add_aabb(&mut self, center: WorldVec3, half_extents: Vec3, style: &DebugStyle) {
        self.push(Primitive::Aabb { center, half_extents }, style);
    }

    pub fn add_sphere(&mut self, center: WorldVec3, radius: f32, style: &DebugStyle) {
        self.push(Primitive::Sphere { center, radius }, style);
    }

    pub fn add_capsule(&mut self, p0: WorldVec3, p1: WorldVec3, radius: f32, style: &DebugStyle) {
        self.push(Primitive::Capsule { p0, p1, radius }, style);
    }

    pub fn add_circle(&mut self, center: WorldVec3, normal: DVec3, radius: f32, style: &DebugStyle) {
        self.push(Primitive::Circle { center, normal, radius }, style);
    }

    pub fn add_cone(
        &mut self,
        apex: WorldVec3,
        direction: DVec3,
        length: f32,
        angle_degrees: f32,
        style: &DebugStyle,
    ) {
        self.push(
            Primitive::Cone {
                apex,
                direction,
                length,
                angle_degrees,
            },
            style,
        );
    }

    pub fn add_obb(&mut self, center: WorldVec3, rotation: Quat, half_extents: Vec3, style: &DebugStyle) {
        let local = box_corners(half_extents.max(Vec3::ZERO));
        let corners = local.map(|c| center + (rotation * c).as_dvec3());
        self.add_obb_corners(corners, style);
    }

    pub fn add_obb_corners(&mut self, corners: [WorldVec3; 8], style: &DebugStyle) {
        self.push(Primitive::Obb { corners }, style);
    }

    /// Two circles plus four side lines
    pub fn add_cylinder(
        &mut self,
        center: WorldVec3,
        axis: DVec3,
        radius: f32,
        half_height: f32,
        style: &DebugStyle,
    ) {
        self.add_tapered_cylinder(center, axis, half_height, radius, radius, style);
    }

    /// Either radius may be zero (cone)
    pub fn add_tapered_cylinder(
        &mut self,
        center: WorldVec3,
        axis: DVec3,
        half_height: f32,
        top_radius: f32,
        bottom_radius: f32,
        style: &DebugStyle,
    ) {
        let half_height = clamp_nonnegative_finite(half_height);
        let top_radius = clamp_nonnegative_finite(top_radius);
        let bottom_radius = clamp_nonnegative_finite(bottom_radius);
        if top_radius <= 0.0 && bottom_radius <= 0.0 {
            return;
        }

        let axis_n = safe_normalize(axis.as_vec3(), Vec3::Y);
        let axis_d = axis_n.as_dvec3();
        let top = center + axis_d * half_height as f64;
        let bottom = center - axis_d * half_height as f64;

        if top_radius > 0.0 {
            self.add_circle(top, axis_d, top_radius, style);
        }
        if bottom_radius > 0.0 {
            self.add_circle(bottom, axis_d, bottom_radius, style);
        }

        let (u, v) = basis_from_normal(axis_n);
        for d in [u, -u, v, -v] {
            let p0 = bottom + (d * bottom_radius).as_dvec3();
            let p1 = top + (d * top_radius).as_dvec3();
            self.add_line(p0, p1, style);
        }
    }

    /// Square outline on a plane
    pub fn add_plane_patch(&mut self, point: WorldVec3, normal: DVec3, half_size: f32, style: &DebugStyle) {
        let half_size = clamp_nonnegative_finite(half_size);
        if half_size <= 0.0 {
            return;
        }
        let n = safe_normalize(normal.as_vec3(), Vec3::Y);
        let (u, v) = basis_from_normal(n);
        let du = (u * half_size).as_dvec3();
        let dv = (v * half_size).as_dvec3();

        let c0 = point + du + dv;
        let c1 = point + du - dv;
        let c2 = point - du - dv;
        let c3 = point - du + dv;
        self.add_line(c0, c1, style);
        self.add_line(c1, c2, style);
        self.add_line(c2, c3, style);
        self.add_line(c3, c0, style);
    }

    fn bucket_for<'a>(
        &self,
        cmd: &Command,
        depth: &'a mut Vec<DebugDrawVertex>,
        overlay: &'a mut Vec<DebugDrawVertex>,
    ) -> Option<&'a mut Vec<DebugDrawVertex>> {
        if self.settings.layer_mask & cmd.layer.bit() == 0 {
            return None;
        }
        match cmd.depth {
            DebugDepth::DepthTested if self.settings.show_depth_tested => Some(depth),
            DebugDepth::AlwaysOnTop if self.settings.show_overlay => Some(overlay),
            _ => None,
        }
    }

    /// Tessellate every queued command into vertices local to `origin_world`
    pub fn build_line_vertices(&self, origin_world: WorldVec3) -> LineVertexLists {
        if !self.settings.enabled {
            return LineVertexLists::default();
        }

        let mut depth = Vec::new();
        let mut overlay = Vec::new();
        let seg = clamp_segments(self.settings.segments);
        let local = |p: WorldVec3| world_to_local(p, origin_world);

        for cmd in &self.commands {
            let Some(dst) = self.bucket_for(cmd, &mut depth, &mut overlay) else {
                continue;
            };
            match &cmd.primitive {
                Primitive::Line { a, b } => push_line(dst, local(*a), local(*b), cmd.color),
                Primitive::Aabb { center, half_extents } => {
                    let c = local(*center);
                    let corners = box_corners(half_extents.max(Vec3::ZERO)).map(|p| c + p);
                    emit_box(dst, &corners, cmd.color);
                }
                Primitive::Sphere { center, radius } => emit_sphere(dst, local(*center), *radius, seg, cmd.color),
                Primitive::Capsule { p0, p1, radius } => {
                    emit_capsule(dst, local(*p0), local(*p1), *radius, seg, cmd.color)
                }
                Primitive::Circle { center, normal, radius } => {
                    emit_circle(dst, local(*center), normal.as_vec3(), *radius, seg, cmd.color)
                }
                Primitive::Cone {
                    apex,
                    direction,
                    length,
                    angle_degrees,
                } => emit_cone(
                    dst,
                    local(*apex),
                    direction.as_vec3(),
                    *length,
                    *angle_degrees,
                    seg,
                    cmd.color,
                ),
                Primitive::Obb { corners } => {
                    let corners = corners.map(local);
                    emit_box(dst, &corners, cmd.color);
                }
            }
        }

        let depth_vertex_count = depth.len() as u32;
        let overlay_vertex_count = overlay.len() as u32;
        depth.extend(overlay);
        LineVertexLists {
            vertices: depth,
            depth_vertex_count,
            overlay_vertex_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_is_32_bytes() {
        assert_eq!(std::mem::size_of::<DebugDrawVertex>(), 32);
    }

    #[test]
    fn test_basis_is_orthonormal() {
        for n in [Vec3::Y, Vec3::X, Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO] {
            let (u, v) = basis_from_normal(n);
            let nn = safe_normalize(n, Vec3::Y);
            assert!(u.dot(nn).abs() < 1e-5);
            assert!(v.dot(nn).abs() < 1e-5);
            assert!(u.dot(v).abs() < 1e-5);
        }
    }

    #[test]
    fn test_capsule_segment_counts() {
        let mut dst = Vec::new();
        emit_capsule(&mut dst, Vec3::ZERO, Vec3::Y, 1.0, 8, Vec4::ONE);
        // 8 side lines, 2 rings of 8, 3 arcs sections * 4 lines (half_seg = max(3, 4) = 4)
        let lines = dst.len() / 2;
        assert_eq!(lines, 8 + 16 + 4 * 4);
    }
}
