// renderer/shadows.rs
use std::sync::Arc;

use log::{debug, warn};

use crate::renderer::backend::{Limits, RenderBackend};
use crate::renderer::resources::{RenderTarget, RenderTargetDescriptor};
use crate::scene::light::LightKind;
use crate::settings::RenderSettings;

pub const POINT_SHADOW_FACE_COUNT: usize = 6;

/// The three shadow-map pools: flat 2D maps (spot lights), cubemaps
/// (point lights) and the cascade array (directional lights).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShadowMapKind {
    Map2D,
    Cube,
    Array,
}

impl ShadowMapKind {
    pub fn for_light(kind: LightKind) -> Self {
        match kind {
            LightKind::Spot => ShadowMapKind::Map2D,
            LightKind::Point => ShadowMapKind::Cube,
            LightKind::Directional => ShadowMapKind::Array,
        }
    }

    fn index(self) -> usize {
        match self {
            ShadowMapKind::Map2D => 0,
            ShadowMapKind::Cube => 1,
            ShadowMapKind::Array => 2,
        }
    }
}

/// Per-frame slot allocator, one counter per shadow-map kind. Reset at the
/// start of every frame; running out degrades to the no-shadow sentinel
/// rather than failing.
pub struct ShadowBudget {
    used: [usize; 3],
    capacity: [usize; 3],
}

impl ShadowBudget {
    pub fn from_limits(limits: &Limits) -> Self {
        Self {
            used: [0; 3],
            capacity: [limits.max_shadow_maps, limits.max_shadow_maps, limits.max_cascades],
        }
    }

    pub fn reset(&mut self) {
        self.used = [0; 3];
    }

    /// Next free slot for the kind, or `None` when the budget is spent.
    pub fn allocate(&mut self, kind: ShadowMapKind) -> Option<i32> {
        let index = kind.index();
        if self.used[index] >= self.capacity[index] {
            debug!("shadow budget exhausted for {kind:?}");
            return None;
        }
        let slot = self.used[index] as i32;
        self.used[index] += 1;
        Some(slot)
    }

    pub fn remaining(&self, kind: ShadowMapKind) -> usize {
        let index = kind.index();
        self.capacity[index] - self.used[index]
    }
}

/// Pre-created depth-only shadow targets, one per budget slot. Point
/// lights get six face targets per slot.
pub struct ShadowResources {
    map_2d: Vec<Arc<RenderTarget>>,
    cube_faces: Vec<Arc<RenderTarget>>,
    array: Vec<Arc<RenderTarget>>,
}

impl ShadowResources {
    pub fn new(backend: &dyn RenderBackend, limits: &Limits, settings: &RenderSettings) -> Self {
        let size = settings.shadow_map_size;
        let cube_size = settings.point_shadow_size;

        let map_2d = (0..limits.max_shadow_maps)
            .map(|slot| {
                backend.create_render_target(&RenderTargetDescriptor::depth_only(
                    format!("SpotShadowMap{slot}"),
                    size,
                ))
            })
            .collect();

        let cube_faces = (0..limits.max_shadow_maps * POINT_SHADOW_FACE_COUNT)
            .map(|layer| {
                backend.create_render_target(&RenderTargetDescriptor::depth_only(
                    format!("PointShadowFace{layer}"),
                    cube_size,
                ))
            })
            .collect();

        let array = (0..limits.max_cascades)
            .map(|slot| {
                backend.create_render_target(&RenderTargetDescriptor::depth_only(
                    format!("DirectionalShadowMap{slot}"),
                    size,
                ))
            })
            .collect();

        Self {
            map_2d,
            cube_faces,
            array,
        }
    }

    pub fn map_2d(&self, slot: i32) -> Option<&Arc<RenderTarget>> {
        lookup(&self.map_2d, slot, "2D shadow map")
    }

    pub fn cube_face(&self, slot: i32, face: usize) -> Option<&Arc<RenderTarget>> {
        if slot < 0 || face >= POINT_SHADOW_FACE_COUNT {
            return None;
        }
        let index = slot as usize * POINT_SHADOW_FACE_COUNT + face;
        lookup(&self.cube_faces, index as i32, "cube shadow face")
    }

    pub fn array_slice(&self, slot: i32) -> Option<&Arc<RenderTarget>> {
        lookup(&self.array, slot, "shadow cascade")
    }
}

fn lookup<'a>(
    targets: &'a [Arc<RenderTarget>],
    slot: i32,
    label: &str,
) -> Option<&'a Arc<RenderTarget>> {
    if slot < 0 {
        return None;
    }
    let index = slot as usize;
    if index >= targets.len() {
        warn!("{label} slot {index} out of range (max: {})", targets.len());
        return None;
    }
    Some(&targets[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::NullBackend;

    #[test]
    fn budget_allocates_until_capacity() {
        let limits = Limits {
            max_lights: 16,
            max_shadow_maps: 2,
            max_cascades: 1,
        };
        let mut budget = ShadowBudget::from_limits(&limits);
        assert_eq!(budget.allocate(ShadowMapKind::Map2D), Some(0));
        assert_eq!(budget.allocate(ShadowMapKind::Map2D), Some(1));
        assert_eq!(budget.allocate(ShadowMapKind::Map2D), None);
        // Kinds are independent.
        assert_eq!(budget.allocate(ShadowMapKind::Cube), Some(0));
        assert_eq!(budget.allocate(ShadowMapKind::Array), Some(0));
        assert_eq!(budget.allocate(ShadowMapKind::Array), None);
    }

    #[test]
    fn reset_restores_the_budget() {
        let mut budget = ShadowBudget::from_limits(&Limits::default());
        while budget.allocate(ShadowMapKind::Array).is_some() {}
        budget.reset();
        assert_eq!(budget.allocate(ShadowMapKind::Array), Some(0));
    }

    #[test]
    fn resources_expose_per_slot_targets() {
        let backend = NullBackend::new();
        let limits = Limits::default();
        let resources = ShadowResources::new(&backend, &limits, &RenderSettings::default());

        assert!(resources.map_2d(0).is_some());
        assert!(resources.map_2d(-1).is_none());
        assert!(resources
            .cube_face((limits.max_shadow_maps - 1) as i32, 5)
            .is_some());
        assert!(resources.cube_face(0, 6).is_none());
        assert!(resources.array_slice(limits.max_cascades as i32).is_none());
    }
}
