/// Collision layers and the symmetric layer collision matrix

use serde::{Deserialize, Serialize};

pub const LAYER_COUNT: usize = 16;

/// Object layer index (0..LAYER_COUNT)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Layer(pub u8);

impl Layer {
    pub const DEFAULT: Layer = Layer(0);
    pub const STATIC: Layer = Layer(1);
    pub const DYNAMIC: Layer = Layer(2);
    pub const KINEMATIC: Layer = Layer(3);
    pub const PLAYER: Layer = Layer(4);
    pub const ENEMY: Layer = Layer(5);
    pub const PROJECTILE: Layer = Layer(6);
    pub const TRIGGER: Layer = Layer(7);
    pub const DEBRIS: Layer = Layer(8);

    /// Layer from a raw index; out-of-range indices are rejected.
    pub fn from_index(index: u32) -> Option<Layer> {
        if (index as usize) < LAYER_COUNT {
            Some(Layer(index as u8))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn bit(self) -> u32 {
        1u32 << (self.0 as u32 % LAYER_COUNT as u32)
    }
}

/// Layer mask that accepts every layer
pub const ALL_LAYERS: u32 = (1u32 << LAYER_COUNT) - 1;

/// Symmetric N x N collision matrix stored as one bit row per layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerMatrix {
    rows: [u32; LAYER_COUNT],
}

impl Default for LayerMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerMatrix {
    /// Everything collides with everything except static vs static.
    pub fn new() -> Self {
        let mut matrix = Self {
            rows: [ALL_LAYERS; LAYER_COUNT],
        };
        matrix.set(Layer::STATIC, Layer::STATIC, false);
        matrix
    }

    pub fn set(&mut self, a: Layer, b: Layer, should_collide: bool) {
        let (ia, ib) = (a.index() % LAYER_COUNT, b.index() % LAYER_COUNT);
        if should_collide {
            self.rows[ia] |= b.bit();
            self.rows[ib] |= a.bit();
        } else {
            self.rows[ia] &= !b.bit();
            self.rows[ib] &= !a.bit();
        }
    }

    pub fn should_collide(&self, a: Layer, b: Layer) -> bool {
        (self.rows[a.index() % LAYER_COUNT] & b.bit()) != 0
    }

    /// Bit row of layers that `layer` collides with
    pub fn row(&self, layer: Layer) -> u32 {
        self.rows[layer.index() % LAYER_COUNT]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matrix() {
        let m = LayerMatrix::new();
        assert!(!m.should_collide(Layer::STATIC, Layer::STATIC));
        assert!(m.should_collide(Layer::STATIC, Layer::DYNAMIC));
        assert!(m.should_collide(Layer::PLAYER, Layer::DEBRIS));
    }

    #[test]
    fn test_set_is_symmetric() {
        let mut m = LayerMatrix::new();
        m.set(Layer::PLAYER, Layer::PROJECTILE, false);
        assert!(!m.should_collide(Layer::PLAYER, Layer::PROJECTILE));
        assert!(!m.should_collide(Layer::PROJECTILE, Layer::PLAYER));
        m.set(Layer::PROJECTILE, Layer::PLAYER, true);
        assert!(m.should_collide(Layer::PLAYER, Layer::PROJECTILE));
    }

    #[test]
    fn test_from_index_bounds() {
        assert_eq!(Layer::from_index(15), Some(Layer(15)));
        assert_eq!(Layer::from_index(16), None);
    }
}
