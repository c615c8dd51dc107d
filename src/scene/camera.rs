// scene/camera.rs
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use glam::{Mat4, Vec3, Vec4};

use crate::renderer::command_buffer::CommandBuffer;
use crate::renderer::resources::RenderTarget;
use crate::renderer::stats::CameraStats;
use crate::scene::layer::LayerMask;
use crate::scene::transform::Transform;

/// Perspective projection parameters.
#[derive(Clone, Copy, Debug)]
pub struct Projection {
    pub fov_y_radians: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fov_y_radians: 60f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Projection {
    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, self.aspect, self.near, self.far)
    }
}

/// Six view-frustum planes extracted from a view-projection matrix,
/// stored as `(normal, d)` with normals pointing inward.
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    pub fn from_view_projection(vp: Mat4) -> Self {
        let r0 = vp.row(0);
        let r1 = vp.row(1);
        let r2 = vp.row(2);
        let r3 = vp.row(3);

        // Left, right, bottom, top, near (0..1 depth range), far.
        let mut planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2];
        for plane in &mut planes {
            let len = plane.truncate().length();
            if len > 1e-6 {
                *plane /= len;
            }
        }
        Self { planes }
    }

    pub fn contains_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(center) + plane.w >= -radius)
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.contains_sphere(point, 0.0)
    }
}

/// Which of a camera's externally-attached command-buffer lists a buffer
/// joins. Geometry buffers take part in the back-to-front sort; PostProcess
/// and Overlay buffers are appended afterwards in attachment order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferSlot {
    Geometry,
    PostProcess,
    Overlay,
}

impl BufferSlot {
    fn index(self) -> usize {
        match self {
            BufferSlot::Geometry => 0,
            BufferSlot::PostProcess => 1,
            BufferSlot::Overlay => 2,
        }
    }
}

/// Matrices and derived culling data for the frame being recorded, refreshed
/// once per camera per frame from the interpolated transform.
#[derive(Clone, Copy, Debug)]
struct CameraFrame {
    view: Mat4,
    view_projection: Mat4,
    position: Vec3,
    frustum: Frustum,
}

impl CameraFrame {
    fn compute(transform: &Transform, projection: &Projection) -> Self {
        let view = transform.matrix().inverse();
        let view_projection = projection.matrix() * view;
        Self {
            view,
            view_projection,
            position: transform.translation,
            frustum: Frustum::from_view_projection(view_projection),
        }
    }
}

/// A scene camera. Shared via `Arc` between the recording side and the
/// command buffers that reference it weakly; everything mutated per frame
/// sits behind interior mutability so the type stays `Send + Sync`.
pub struct Camera {
    name: String,
    renders_to_screen: bool,
    active: AtomicBool,
    culling_mask: AtomicU32,
    target: Mutex<Option<Arc<RenderTarget>>>,
    projection: Mutex<Projection>,
    transforms: Mutex<(Transform, Transform)>,
    frame: Mutex<CameraFrame>,
    attached: Mutex<[Vec<CommandBuffer>; 3]>,
    stats: Mutex<CameraStats>,
}

impl Camera {
    /// Camera that presents to the screen (or HMD) backbuffer.
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), true)
    }

    /// Camera that renders into an explicit target; until one is assigned
    /// via [`Camera::set_render_target`] the camera is skipped each frame.
    pub fn offscreen(name: impl Into<String>) -> Self {
        Self::build(name.into(), false)
    }

    fn build(name: String, renders_to_screen: bool) -> Self {
        let transform = Transform::IDENTITY;
        let projection = Projection::default();
        let frame = CameraFrame::compute(&transform, &projection);
        Self {
            name,
            renders_to_screen,
            active: AtomicBool::new(true),
            culling_mask: AtomicU32::new(LayerMask::ALL.bits()),
            target: Mutex::new(None),
            projection: Mutex::new(projection),
            transforms: Mutex::new((transform, transform)),
            frame: Mutex::new(frame),
            attached: Mutex::new([Vec::new(), Vec::new(), Vec::new()]),
            stats: Mutex::new(CameraStats::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn renders_to_screen(&self) -> bool {
        self.renders_to_screen
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    pub fn culling_mask(&self) -> LayerMask {
        LayerMask::from_bits_truncate(self.culling_mask.load(Ordering::Relaxed))
    }

    pub fn set_culling_mask(&self, mask: LayerMask) {
        self.culling_mask.store(mask.bits(), Ordering::Relaxed);
    }

    pub fn render_target(&self) -> Option<Arc<RenderTarget>> {
        self.target.lock().unwrap().clone()
    }

    pub fn set_render_target(&self, target: Option<Arc<RenderTarget>>) {
        *self.target.lock().unwrap() = target;
    }

    pub fn projection(&self) -> Projection {
        *self.projection.lock().unwrap()
    }

    pub fn set_projection(&self, projection: Projection) {
        *self.projection.lock().unwrap() = projection;
    }

    /// Advance the simulation transform; the previous value becomes the
    /// interpolation source for the next recorded frame.
    pub fn set_transform(&self, transform: Transform) {
        let mut pair = self.transforms.lock().unwrap();
        pair.0 = pair.1;
        pair.1 = transform;
    }

    /// Set both interpolation endpoints at once (teleport, initial placement).
    pub fn snap_transform(&self, transform: Transform) {
        *self.transforms.lock().unwrap() = (transform, transform);
    }

    pub fn interpolated_transform(&self, lerp: f32) -> Transform {
        let pair = self.transforms.lock().unwrap();
        pair.0.lerp(&pair.1, lerp)
    }

    /// Refresh the cached view/projection matrices and frustum from the
    /// interpolated transform. Called once per camera at the start of its
    /// recording pass.
    pub fn update_matrices(&self, lerp: f32) {
        let transform = self.interpolated_transform(lerp);
        let projection = self.projection();
        *self.frame.lock().unwrap() = CameraFrame::compute(&transform, &projection);
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.frame.lock().unwrap().view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection().matrix()
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.frame.lock().unwrap().view_projection
    }

    pub fn position(&self) -> Vec3 {
        self.frame.lock().unwrap().position
    }

    pub fn frustum(&self) -> Frustum {
        self.frame.lock().unwrap().frustum
    }

    /// Attach an externally-recorded buffer (debug overlays, GUI, custom
    /// post-processing). The buffer is merged into the camera's primary
    /// buffer every frame until detached.
    pub fn attach_buffer(&self, slot: BufferSlot, buffer: CommandBuffer) {
        self.attached.lock().unwrap()[slot.index()].push(buffer);
    }

    pub fn clear_buffers(&self, slot: BufferSlot) {
        self.attached.lock().unwrap()[slot.index()].clear();
    }

    pub fn attached_buffers(&self, slot: BufferSlot) -> Vec<CommandBuffer> {
        self.attached.lock().unwrap()[slot.index()].clone()
    }

    pub fn has_attached_buffers(&self, slot: BufferSlot) -> bool {
        !self.attached.lock().unwrap()[slot.index()].is_empty()
    }

    pub fn stats(&self) -> CameraStats {
        *self.stats.lock().unwrap()
    }

    pub fn reset_stats(&self) {
        self.stats.lock().unwrap().reset();
    }

    pub(crate) fn record_draw(&self, vertices: u32, triangles: u32) {
        let mut stats = self.stats.lock().unwrap();
        stats.draw_calls += 1;
        stats.vertices += vertices;
        stats.triangles += triangles;
    }

    pub(crate) fn record_light(&self) {
        self.stats.lock().unwrap().lights += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn view_proj_is_invertible() {
        let cam = Camera::new("main");
        cam.snap_transform(Transform::from_translation(Vec3::new(0.0, 0.0, 3.0)));
        cam.update_matrices(1.0);
        let vp = cam.view_projection_matrix();
        let id = vp * vp.inverse();
        assert!(id.abs_diff_eq(Mat4::IDENTITY, 1e-4));
    }

    #[test]
    fn frustum_accepts_point_in_front() {
        let cam = Camera::new("main");
        cam.snap_transform(Transform::IDENTITY);
        cam.update_matrices(1.0);
        let frustum = cam.frustum();
        // Default camera looks down -Z.
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -5.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 5.0)));
    }

    #[test]
    fn frustum_sphere_overlap_counts_as_visible() {
        let cam = Camera::new("main");
        cam.update_matrices(1.0);
        let frustum = cam.frustum();
        // Center behind the near plane, but the sphere pokes through.
        assert!(frustum.contains_sphere(Vec3::new(0.0, 0.0, 1.0), 2.0));
        assert!(!frustum.contains_sphere(Vec3::new(0.0, 0.0, 50.0), 2.0));
    }

    #[test]
    fn interpolation_blends_between_simulation_steps() {
        let cam = Camera::new("main");
        cam.snap_transform(Transform::from_translation(Vec3::ZERO));
        cam.set_transform(Transform::from_trs(
            Vec3::new(4.0, 0.0, 0.0),
            Quat::IDENTITY,
            Vec3::ONE,
        ));
        cam.update_matrices(0.25);
        assert!(cam.position().abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6));
    }
}
