/// Collision shapes
///
/// Tagged union over the primitive shapes the core knows about. Compound shapes
/// hold a flat list of children; the child index is reported as the sub-shape
/// id in contact events and query hits.

use glam::{Quat, Vec3};

#[derive(Debug, Clone, PartialEq)]
pub enum CollisionShape {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    /// Y-aligned capsule: cylinder of `2 * half_height` plus two hemispheres
    Capsule { radius: f32, half_height: f32 },
    /// Y-aligned cylinder
    Cylinder { radius: f32, half_height: f32 },
    /// Y-aligned cylinder with different top and bottom radii (either may be 0)
    TaperedCylinder {
        half_height: f32,
        top_radius: f32,
        bottom_radius: f32,
    },
    /// Infinite plane `dot(normal, p) = offset`
    Plane { normal: Vec3, offset: f32 },
    Compound { children: Vec<CompoundChild> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompoundChild {
    pub position: Vec3,
    pub rotation: Quat,
    pub shape: CollisionShape,
    pub user_data: u32,
}

impl CompoundChild {
    pub fn new(shape: CollisionShape, position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            shape,
            user_data: 0,
        }
    }

    pub fn with_user_data(mut self, user_data: u32) -> Self {
        self.user_data = user_data;
        self
    }
}

impl Default for CollisionShape {
    fn default() -> Self {
        Self::Box {
            half_extents: Vec3::splat(0.5),
        }
    }
}

impl CollisionShape {
    pub fn cuboid(hx: f32, hy: f32, hz: f32) -> Self {
        Self::Box {
            half_extents: Vec3::new(hx, hy, hz),
        }
    }

    pub fn sphere(radius: f32) -> Self {
        Self::Sphere { radius }
    }

    pub fn capsule(radius: f32, half_height: f32) -> Self {
        Self::Capsule { radius, half_height }
    }

    pub fn cylinder(radius: f32, half_height: f32) -> Self {
        Self::Cylinder { radius, half_height }
    }

    pub fn tapered_cylinder(half_height: f32, top_radius: f32, bottom_radius: f32) -> Self {
        Self::TaperedCylinder {
            half_height,
            top_radius,
            bottom_radius,
        }
    }

    /// Plane through the origin facing +Y
    pub fn ground_plane() -> Self {
        Self::Plane {
            normal: Vec3::Y,
            offset: 0.0,
        }
    }

    pub fn plane(normal: Vec3, offset: f32) -> Self {
        Self::Plane { normal, offset }
    }

    pub fn compound(children: Vec<CompoundChild>) -> Self {
        Self::Compound { children }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Box { .. } => "box",
            Self::Sphere { .. } => "sphere",
            Self::Capsule { .. } => "capsule",
            Self::Cylinder { .. } => "cylinder",
            Self::TaperedCylinder { .. } => "tapered_cylinder",
            Self::Plane { .. } => "plane",
            Self::Compound { .. } => "compound",
        }
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, Self::Compound { .. })
    }

    /// Number of addressable sub-shapes (1 for primitives)
    pub fn sub_shape_count(&self) -> usize {
        match self {
            Self::Compound { children } => children.len(),
            _ => 1,
        }
    }

    /// Conservative bounding radius around the shape's local origin.
    /// Planes report infinity.
    pub fn bounding_radius(&self) -> f32 {
        match self {
            Self::Box { half_extents } => half_extents.length(),
            Self::Sphere { radius } => *radius,
            Self::Capsule { radius, half_height } => radius + half_height,
            Self::Cylinder { radius, half_height } => (radius * radius + half_height * half_height).sqrt(),
            Self::TaperedCylinder {
                half_height,
                top_radius,
                bottom_radius,
            } => {
                let r = top_radius.max(*bottom_radius);
                (r * r + half_height * half_height).sqrt()
            }
            Self::Plane { .. } => f32::INFINITY,
            Self::Compound { children } => children
                .iter()
                .map(|c| c.position.length() + c.shape.bounding_radius())
                .fold(0.0, f32::max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_half_unit_box() {
        assert_eq!(
            CollisionShape::default(),
            CollisionShape::Box {
                half_extents: Vec3::splat(0.5)
            }
        );
    }

    #[test]
    fn test_compound_sub_shapes() {
        let shape = CollisionShape::compound(vec![
            CompoundChild::new(CollisionShape::sphere(1.0), Vec3::X * 2.0, Quat::IDENTITY),
            CompoundChild::new(CollisionShape::cuboid(1.0, 1.0, 1.0), Vec3::ZERO, Quat::IDENTITY),
        ]);
        assert_eq!(shape.sub_shape_count(), 2);
        assert!((shape.bounding_radius() - 3.0).abs() < 1e-6);
    }
}
