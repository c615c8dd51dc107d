// scene/light.rs
use std::f32::consts::FRAC_PI_2;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Mutex;

use glam::{Mat4, Vec3, Vec4};

use crate::scene::camera::Camera;
use crate::scene::layer::LayerMask;
use crate::scene::transform::Transform;

/// Sentinel shadow slot for lights that render unshadowed this frame.
pub const NO_SHADOW_SLOT: i32 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

#[derive(Clone, Copy, Debug)]
struct LightData {
    transform: Transform,
    color: Vec3,
    intensity: f32,
    range: f32,
    inner_angle: f32,
    outer_angle: f32,
}

/// A scene light. Shared via `Arc`; command buffers reference it weakly and
/// the render system stamps the per-frame shadow slot through an atomic.
pub struct Light {
    name: String,
    kind: LightKind,
    active: AtomicBool,
    layer_mask: AtomicU32,
    casts_shadows: AtomicBool,
    shadow_slot: AtomicI32,
    data: Mutex<LightData>,
}

impl Light {
    pub fn directional(name: impl Into<String>) -> Self {
        Self::build(name.into(), LightKind::Directional, 0.0, 0.0, 0.0)
    }

    pub fn point(name: impl Into<String>, range: f32) -> Self {
        Self::build(name.into(), LightKind::Point, range, 0.0, 0.0)
    }

    pub fn spot(name: impl Into<String>, range: f32, inner_angle: f32, outer_angle: f32) -> Self {
        Self::build(name.into(), LightKind::Spot, range, inner_angle, outer_angle)
    }

    fn build(name: String, kind: LightKind, range: f32, inner: f32, outer: f32) -> Self {
        Self {
            name,
            kind,
            active: AtomicBool::new(true),
            layer_mask: AtomicU32::new(LayerMask::DEFAULT.bits()),
            casts_shadows: AtomicBool::new(false),
            shadow_slot: AtomicI32::new(NO_SHADOW_SLOT),
            data: Mutex::new(LightData {
                transform: Transform::IDENTITY,
                color: Vec3::ONE,
                intensity: 1.0,
                range,
                inner_angle: inner,
                outer_angle: outer,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LightKind {
        self.kind
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    pub fn layer_mask(&self) -> LayerMask {
        LayerMask::from_bits_truncate(self.layer_mask.load(Ordering::Relaxed))
    }

    pub fn set_layer_mask(&self, mask: LayerMask) {
        self.layer_mask.store(mask.bits(), Ordering::Relaxed);
    }

    pub fn casts_shadows(&self) -> bool {
        self.casts_shadows.load(Ordering::Relaxed)
    }

    pub fn set_casts_shadows(&self, casts: bool) {
        self.casts_shadows.store(casts, Ordering::Relaxed);
    }

    /// Shadow-map slot assigned for the current frame, or
    /// [`NO_SHADOW_SLOT`] when the light renders unshadowed.
    pub fn shadow_slot(&self) -> i32 {
        self.shadow_slot.load(Ordering::Relaxed)
    }

    pub(crate) fn set_shadow_slot(&self, slot: i32) {
        self.shadow_slot.store(slot, Ordering::Relaxed);
    }

    pub fn transform(&self) -> Transform {
        self.data.lock().unwrap().transform
    }

    pub fn set_transform(&self, transform: Transform) {
        self.data.lock().unwrap().transform = transform;
    }

    pub fn color(&self) -> Vec3 {
        self.data.lock().unwrap().color
    }

    pub fn set_color(&self, color: Vec3) {
        self.data.lock().unwrap().color = color;
    }

    pub fn intensity(&self) -> f32 {
        self.data.lock().unwrap().intensity
    }

    pub fn set_intensity(&self, intensity: f32) {
        self.data.lock().unwrap().intensity = intensity;
    }

    pub fn range(&self) -> f32 {
        self.data.lock().unwrap().range
    }

    pub fn set_range(&self, range: f32) {
        self.data.lock().unwrap().range = range;
    }

    pub fn cone_angles(&self) -> (f32, f32) {
        let data = self.data.lock().unwrap();
        (data.inner_angle, data.outer_angle)
    }

    pub fn position(&self) -> Vec3 {
        self.transform().translation
    }

    pub fn direction(&self) -> Vec3 {
        safe_normalize(self.transform().forward(), Vec3::new(0.0, -1.0, 0.0))
    }

    /// Sort key for the per-camera light list: squared distance to the
    /// camera. Directional lights affect the whole view and always sort
    /// first.
    pub fn distance_sq_to(&self, point: Vec3) -> f32 {
        match self.kind {
            LightKind::Directional => 0.0,
            _ => (self.position() - point).length_squared(),
        }
    }

    /// Frustum visibility for the given camera. Directional lights are
    /// always visible; point and spot lights test their range sphere
    /// against the camera frustum.
    pub fn cull(&self, camera: &Camera) -> bool {
        match self.kind {
            LightKind::Directional => true,
            LightKind::Point | LightKind::Spot => {
                let data = self.data.lock().unwrap();
                camera
                    .frustum()
                    .contains_sphere(data.transform.translation, data.range.max(0.0))
            }
        }
    }

    /// Orthographic shadow view-projection for a directional light, fitted
    /// around the camera's focus point.
    pub fn directional_shadow_matrix(&self, camera_pos: Vec3, camera_target: Vec3) -> Mat4 {
        const SHADOW_SIZE: f32 = 15.0;
        const SHADOW_DISTANCE: f32 = 30.0;

        let transform = self.transform();
        let direction = safe_normalize(transform.forward(), Vec3::new(0.0, -1.0, 0.0));

        let focus = if (camera_target - camera_pos).length_squared() > 1e-4 {
            camera_target
        } else {
            camera_pos
        };
        let light_pos = focus - direction * SHADOW_DISTANCE;

        let mut up = transform.up();
        if up.length_squared() > 0.0 {
            up = up.normalize();
        }
        if up.length_squared() <= 0.0 || up.abs().dot(direction).abs() > 0.999 {
            up = shadow_up(direction);
        }

        let view = Mat4::look_at_rh(light_pos, focus, up);

        let extent = SHADOW_SIZE;
        let near = 0.1;
        let far = SHADOW_DISTANCE * 2.0;
        let projection = Mat4::from_cols(
            Vec4::new(1.0 / extent, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 1.0 / extent, 0.0, 0.0),
            Vec4::new(0.0, 0.0, -1.0 / (far - near), 0.0),
            Vec4::new(0.0, 0.0, -near / (far - near), 1.0),
        );

        projection * view
    }

    /// Six cubemap-face view-projections for a point light.
    pub fn point_shadow_matrices(&self) -> [Mat4; 6] {
        let data = self.data.lock().unwrap();
        let position = data.transform.translation;
        let near = 0.1f32;
        let far = data.range.max(near + 0.1);
        let projection = Mat4::perspective_rh(FRAC_PI_2, 1.0, near, far);

        let dirs = [
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::Z,
            Vec3::NEG_Z,
        ];
        let ups = [Vec3::Y, Vec3::Y, Vec3::Z, Vec3::NEG_Z, Vec3::Y, Vec3::Y];

        let mut matrices = [Mat4::IDENTITY; 6];
        for ((matrix, dir), up) in matrices.iter_mut().zip(dirs.iter()).zip(ups.iter()) {
            let view = Mat4::look_at_rh(position, position + *dir, *up);
            *matrix = projection * view;
        }
        matrices
    }

    /// Perspective shadow view-projection for a spot light, covering the
    /// outer cone.
    pub fn spot_shadow_matrix(&self) -> Mat4 {
        let data = self.data.lock().unwrap();
        let near = 0.1f32;
        let far = data.range.max(near + 0.1);
        let fov = (data.outer_angle * 2.0).clamp(0.1, std::f32::consts::PI - 0.1);

        let position = data.transform.translation;
        let forward = safe_normalize(data.transform.forward(), Vec3::NEG_Z);

        let mut up = data.transform.up();
        if up.length_squared() < 1e-8 {
            up = Vec3::Y;
        }
        let mut right = forward.cross(up);
        if right.length_squared() < 1e-8 {
            let fallback = if forward.dot(Vec3::X).abs() < 0.9 {
                Vec3::X
            } else {
                Vec3::Y
            };
            right = forward.cross(fallback);
        }
        right = right.normalize();
        let up = right.cross(forward).normalize();

        let view = Mat4::look_at_rh(position, position + forward, up);
        let projection = Mat4::perspective_rh(fov, 1.0, near, far);
        projection * view
    }
}

fn safe_normalize(vec: Vec3, fallback: Vec3) -> Vec3 {
    if vec.length_squared() > 1e-6 {
        vec.normalize()
    } else {
        fallback
    }
}

fn shadow_up(direction: Vec3) -> Vec3 {
    let up = Vec3::Y;
    if direction.abs().dot(up) > 0.95 {
        Vec3::Z
    } else {
        up
    }
}
