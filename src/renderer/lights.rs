use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::scene::light::{Light, LightKind};

pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;
pub const MAX_POINT_LIGHTS: usize = 16;
pub const MAX_SPOT_LIGHTS: usize = 8;

/// Immutable snapshot of one light, captured on the present thread when a
/// `DrawLight` command executes. Keeps the serialization below independent
/// of later scene-side mutation.
#[derive(Clone, Copy, Debug)]
pub struct LightSample {
    pub kind: LightKind,
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
    pub inner_angle: f32,
    pub outer_angle: f32,
    pub shadow_slot: i32,
}

impl LightSample {
    pub fn capture(light: &Light) -> Self {
        let (inner_angle, outer_angle) = light.cone_angles();
        Self {
            kind: light.kind(),
            position: light.position(),
            direction: light.direction(),
            color: light.color(),
            intensity: light.intensity(),
            range: light.range(),
            inner_angle,
            outer_angle,
            shadow_slot: light.shadow_slot(),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct DirectionalLightRaw {
    /// xyz direction, w shadow-map slot (-1 when unshadowed).
    pub direction_shadow: [f32; 4],
    pub color_intensity: [f32; 4],
}

impl DirectionalLightRaw {
    pub fn from_sample(sample: &LightSample) -> Self {
        Self {
            direction_shadow: [
                sample.direction.x,
                sample.direction.y,
                sample.direction.z,
                sample.shadow_slot as f32,
            ],
            color_intensity: [
                sample.color.x,
                sample.color.y,
                sample.color.z,
                sample.intensity,
            ],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct PointLightRaw {
    pub position_range: [f32; 4],
    pub color_intensity: [f32; 4],
    /// x shadow-map slot, yzw reserved.
    pub params: [f32; 4],
}

impl PointLightRaw {
    pub fn from_sample(sample: &LightSample) -> Self {
        Self {
            position_range: [
                sample.position.x,
                sample.position.y,
                sample.position.z,
                sample.range,
            ],
            color_intensity: [
                sample.color.x,
                sample.color.y,
                sample.color.z,
                sample.intensity,
            ],
            params: [sample.shadow_slot as f32, 0.0, 0.0, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct SpotLightRaw {
    pub position_range: [f32; 4],
    pub direction: [f32; 4],
    pub color_intensity: [f32; 4],
    /// cos(inner), cos(outer), shadow-map slot, reserved.
    pub cone_params: [f32; 4],
}

impl SpotLightRaw {
    pub fn from_sample(sample: &LightSample) -> Self {
        let mut inner = sample.inner_angle;
        let mut outer = sample.outer_angle;
        if inner > outer {
            std::mem::swap(&mut inner, &mut outer);
        }
        let cos_inner = inner.cos();
        let cos_outer = outer.cos();

        Self {
            position_range: [
                sample.position.x,
                sample.position.y,
                sample.position.z,
                sample.range,
            ],
            direction: [sample.direction.x, sample.direction.y, sample.direction.z, 0.0],
            color_intensity: [
                sample.color.x,
                sample.color.y,
                sample.color.z,
                sample.intensity,
            ],
            cone_params: [cos_inner, cos_outer, sample.shadow_slot as f32, 0.0],
        }
    }
}

/// GPU layout of the per-camera light list, re-serialized at most once per
/// `DrawLight` batch (see the render context's `lights_updated` flag).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct LightsUniform {
    pub counts: [u32; 4],
    pub directionals: [DirectionalLightRaw; MAX_DIRECTIONAL_LIGHTS],
    pub points: [PointLightRaw; MAX_POINT_LIGHTS],
    pub spots: [SpotLightRaw; MAX_SPOT_LIGHTS],
}

impl LightsUniform {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn from_samples(samples: &[LightSample]) -> Self {
        let mut uniform = Self::zeroed();

        let directionals = samples
            .iter()
            .filter(|s| s.kind == LightKind::Directional);
        for (dst, src) in uniform
            .directionals
            .iter_mut()
            .zip(directionals.take(MAX_DIRECTIONAL_LIGHTS))
        {
            *dst = DirectionalLightRaw::from_sample(src);
            uniform.counts[0] += 1;
        }

        let points = samples.iter().filter(|s| s.kind == LightKind::Point);
        for (dst, src) in uniform.points.iter_mut().zip(points.take(MAX_POINT_LIGHTS)) {
            *dst = PointLightRaw::from_sample(src);
            uniform.counts[1] += 1;
        }

        let spots = samples.iter().filter(|s| s.kind == LightKind::Spot);
        for (dst, src) in uniform.spots.iter_mut().zip(spots.take(MAX_SPOT_LIGHTS)) {
            *dst = SpotLightRaw::from_sample(src);
            uniform.counts[2] += 1;
        }

        uniform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::transform::Transform;

    fn sample(kind: LightKind, x: f32) -> LightSample {
        LightSample {
            kind,
            position: Vec3::new(x, 0.0, 0.0),
            direction: Vec3::NEG_Z,
            color: Vec3::ONE,
            intensity: 1.0,
            range: 10.0,
            inner_angle: 0.3,
            outer_angle: 0.6,
            shadow_slot: -1,
        }
    }

    #[test]
    fn uniform_size_is_gpu_aligned() {
        assert_eq!(LightsUniform::SIZE % 16, 0);
    }

    #[test]
    fn counts_track_each_kind() {
        let samples = vec![
            sample(LightKind::Directional, 0.0),
            sample(LightKind::Point, 1.0),
            sample(LightKind::Point, 2.0),
            sample(LightKind::Spot, 3.0),
        ];
        let uniform = LightsUniform::from_samples(&samples);
        assert_eq!(uniform.counts, [1, 2, 1, 0]);
        assert_eq!(uniform.points[0].position_range[0], 1.0);
        assert_eq!(uniform.points[1].position_range[0], 2.0);
    }

    #[test]
    fn per_kind_overflow_is_clamped() {
        let samples: Vec<_> = (0..MAX_POINT_LIGHTS + 4)
            .map(|i| sample(LightKind::Point, i as f32))
            .collect();
        let uniform = LightsUniform::from_samples(&samples);
        assert_eq!(uniform.counts[1], MAX_POINT_LIGHTS as u32);
    }

    #[test]
    fn spot_cone_angles_are_ordered() {
        let mut s = sample(LightKind::Spot, 0.0);
        s.inner_angle = 0.9;
        s.outer_angle = 0.2;
        let raw = SpotLightRaw::from_sample(&s);
        // cos is decreasing, so cos(inner) >= cos(outer).
        assert!(raw.cone_params[0] >= raw.cone_params[1]);
    }

    #[test]
    fn capture_reads_shadow_slot() {
        let light = Light::spot("spot", 10.0, 0.2, 0.4);
        light.set_transform(Transform::from_translation(Vec3::new(1.0, 2.0, 3.0)));
        light.set_shadow_slot(3);
        let s = LightSample::capture(&light);
        assert_eq!(s.shadow_slot, 3);
        assert_eq!(s.position, Vec3::new(1.0, 2.0, 3.0));
    }
}
