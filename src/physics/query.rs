/// Ray, sweep and overlap query options and results

use glam::Vec3;

use super::layers::{Layer, ALL_LAYERS};
use super::BodyId;

/// Filter shared by every query kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryFilter {
    pub layer_mask: u32,
    pub ignore_body: BodyId,
    pub include_sensors: bool,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            layer_mask: ALL_LAYERS,
            ignore_body: BodyId::INVALID,
            include_sensors: false,
        }
    }
}

impl QueryFilter {
    pub fn accepts(&self, body: BodyId, layer: Layer, is_sensor: bool) -> bool {
        if self.ignore_body.is_valid() && body == self.ignore_body {
            return false;
        }
        if is_sensor && !self.include_sensors {
            return false;
        }
        (self.layer_mask & layer.bit()) != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastOptions {
    pub max_distance: f32,
    pub filter: QueryFilter,
    /// Ignore hits on faces pointing away from the ray (and hits from inside a shape)
    pub backface_culling: bool,
}

impl Default for RaycastOptions {
    fn default() -> Self {
        Self {
            max_distance: 1000.0,
            filter: QueryFilter::default(),
            backface_culling: true,
        }
    }
}

impl RaycastOptions {
    pub fn with_max_distance(mut self, max_distance: f32) -> Self {
        self.max_distance = max_distance;
        self
    }

    pub fn with_layer_mask(mut self, mask: u32) -> Self {
        self.filter.layer_mask = mask;
        self
    }

    pub fn ignoring(mut self, body: BodyId) -> Self {
        self.filter.ignore_body = body;
        self
    }

    pub fn with_sensors(mut self, include: bool) -> Self {
        self.filter.include_sensors = include;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RayHit {
    pub hit: bool,
    /// Local-frame hit position
    pub position: Vec3,
    pub normal: Vec3,
    pub distance: f32,
    pub body_id: BodyId,
    pub sub_shape_id: u32,
    pub layer: Layer,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SweepHit {
    pub hit: bool,
    pub position: Vec3,
    pub normal: Vec3,
    pub distance: f32,
    /// distance / sweep length, in [0, 1]
    pub fraction: f32,
    pub body_id: BodyId,
    pub sub_shape_id: u32,
    pub layer: Layer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_accepts() {
        let filter = QueryFilter {
            layer_mask: Layer::DYNAMIC.bit(),
            ignore_body: BodyId(3),
            include_sensors: false,
        };
        assert!(filter.accepts(BodyId(1), Layer::DYNAMIC, false));
        assert!(!filter.accepts(BodyId(3), Layer::DYNAMIC, false));
        assert!(!filter.accepts(BodyId(1), Layer::STATIC, false));
        assert!(!filter.accepts(BodyId(1), Layer::DYNAMIC, true));
    }
}
