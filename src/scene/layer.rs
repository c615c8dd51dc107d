// scene/layer.rs
use bitflags::bitflags;

bitflags! {
    /// 32-bit render layer mask. Cameras carry a culling mask, renderables
    /// and lights carry a layer mask; an object is considered for a camera
    /// when the two intersect.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LayerMask: u32 {
        const DEFAULT = 1;
        const ALL = u32::MAX;
    }
}

impl LayerMask {
    /// Mask with only the given layer (0..=31) set.
    pub fn layer(index: u32) -> Self {
        Self::from_bits_truncate(1u32 << (index & 31))
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_intersects_all() {
        assert!(LayerMask::ALL.intersects(LayerMask::DEFAULT));
        assert!(!LayerMask::layer(3).intersects(LayerMask::DEFAULT));
    }

    #[test]
    fn layer_index_wraps() {
        assert_eq!(LayerMask::layer(0), LayerMask::DEFAULT);
        assert_eq!(LayerMask::layer(33), LayerMask::layer(1));
    }
}
