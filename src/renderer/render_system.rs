// renderer/render_system.rs
//
// Per-frame orchestrator. `render` traverses the scene and records one
// command buffer per camera (plus dedicated shadow buffers), `present`
// drains the queue and executes everything on the present thread. All
// collaborators are injected; there is no global instance.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use glam::Vec3;
use log::warn;

use crate::renderer::backend::{Limits, RenderBackend};
use crate::renderer::command_buffer::{BlitSurface, CommandBuffer};
use crate::renderer::context::RenderContext;
use crate::renderer::queue::PendingCommandQueue;
use crate::renderer::resources::Material;
use crate::renderer::shadows::{ShadowBudget, ShadowMapKind, ShadowResources};
use crate::renderer::stats::FrameStats;
use crate::renderer::target_pool::TargetPool;
use crate::scene::camera::BufferSlot;
use crate::scene::light::{Light, LightKind, NO_SHADOW_SLOT};
use crate::scene::{Camera, Renderable, Scene};
use crate::settings::RenderSettings;

/// Fixed materials the pipeline needs regardless of scene content: the
/// post-process material applied by the terminal blit and the fallback
/// used when a proper material is unavailable.
pub struct RenderAssets {
    pub post_process_material: Arc<Material>,
    pub error_material: Arc<Material>,
}

pub struct RenderSystem {
    limits: Limits,
    settings: RenderSettings,
    assets: RenderAssets,
    queue: Arc<PendingCommandQueue>,
    context: RenderContext,
    shadows: ShadowResources,
    shadow_budget: ShadowBudget,
    /// Lights whose shadow map was already handled this frame, keyed by
    /// `Arc` identity. Cleared at frame start.
    shadowed_lights: HashSet<usize>,
    pool: TargetPool,
    stats: FrameStats,
}

impl RenderSystem {
    pub fn new(backend: &dyn RenderBackend, settings: RenderSettings, assets: RenderAssets) -> Self {
        let limits = backend.limits();
        let shadows = ShadowResources::new(backend, &limits, &settings);
        Self {
            limits,
            settings,
            assets,
            queue: Arc::new(PendingCommandQueue::new()),
            context: RenderContext::new(limits),
            shadows,
            shadow_budget: ShadowBudget::from_limits(&limits),
            shadowed_lights: HashSet::new(),
            pool: TargetPool::new(),
            stats: FrameStats::default(),
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Shared handle for producers that record and dispatch their own
    /// buffers from other threads.
    pub fn queue_handle(&self) -> Arc<PendingCommandQueue> {
        self.queue.clone()
    }

    /// Submit an externally-recorded buffer for the next present pass.
    pub fn dispatch(&self, buffer: CommandBuffer) {
        self.queue.dispatch(buffer);
    }

    /// Pre-create the well-known constant buffers from a freshly compiled
    /// shader. Binding a material does this lazily; registering up front
    /// keeps camera-matrix updates from landing before any draw ran.
    pub fn register_shader(
        &mut self,
        shader: &Arc<crate::renderer::resources::Shader>,
        backend: &dyn RenderBackend,
    ) {
        self.context
            .register_shader_reflection(&shader.reflection, backend);
    }

    /// Record one frame: every active camera in scene order, shadow maps
    /// deduplicated across cameras, finished buffers dispatched in order.
    pub fn render(&mut self, scene: &dyn Scene, lerp: f32) {
        self.stats.reset();
        self.shadow_budget.reset();
        self.shadowed_lights.clear();

        for camera in scene.cameras() {
            if !camera.is_active() {
                continue;
            }
            self.render_camera(&camera, scene, lerp);
        }

        let pending = self.queue.len();
        if pending > self.settings.pending_buffer_warning {
            warn!(
                "{pending} command buffers pending; present thread may be stalled"
            );
        }
    }

    fn render_camera(&mut self, camera: &Arc<Camera>, scene: &dyn Scene, lerp: f32) {
        let target = camera.render_target();
        if target.is_none() && !camera.renders_to_screen() {
            warn!(
                "camera '{}' has no render target; skipping for this frame",
                camera.name()
            );
            self.stats.cameras_skipped += 1;
            return;
        }

        camera.update_matrices(lerp);

        let mut cmd = CommandBuffer::new();
        cmd.set_camera(camera);
        cmd.set_camera_matrix("view", camera.view_matrix());
        cmd.set_camera_matrix("projection", camera.projection_matrix());
        cmd.set_camera_matrix("viewProjection", camera.view_projection_matrix());

        self.record_light_pass(&mut cmd, camera, scene, lerp);

        cmd.set_render_target(target.as_ref());
        self.record_renderable_pass(&mut cmd, camera, scene, lerp);

        for geometry in camera.attached_buffers(BufferSlot::Geometry) {
            cmd.merge(&geometry);
        }
        cmd.sort_draw_commands(camera.position());

        let has_post_process = camera.has_attached_buffers(BufferSlot::PostProcess);
        for post in camera.attached_buffers(BufferSlot::PostProcess) {
            cmd.merge(&post);
        }
        // Overlays render last, in attachment order, never distance-sorted.
        for overlay in camera.attached_buffers(BufferSlot::Overlay) {
            cmd.merge(&overlay);
        }

        if camera.renders_to_screen() {
            cmd.blit(
                BlitSurface::Previous,
                BlitSurface::Screen,
                &self.assets.post_process_material,
            );
        } else if has_post_process {
            let own = target.clone().expect("offscreen camera checked above");
            cmd.blit(
                BlitSurface::Previous,
                BlitSurface::Target(own),
                &self.assets.post_process_material,
            );
        }

        cmd.end_camera(camera);
        self.queue.dispatch(cmd);
        self.stats.cameras_rendered += 1;
    }

    /// Filter, sort and truncate the camera's lights, rendering shadow
    /// maps for the casters that have not been handled this frame.
    fn record_light_pass(
        &mut self,
        cmd: &mut CommandBuffer,
        camera: &Arc<Camera>,
        scene: &dyn Scene,
        lerp: f32,
    ) {
        let mask = camera.culling_mask();
        let camera_pos = camera.position();

        let mut visible: Vec<(f32, Arc<Light>)> = scene
            .lights()
            .into_iter()
            .filter(|light| {
                light.is_active() && mask.intersects(light.layer_mask()) && light.cull(camera)
            })
            .map(|light| (light.distance_sq_to(camera_pos), light))
            .collect();
        visible.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        if visible.len() > self.limits.max_lights {
            let dropped = visible.len() - self.limits.max_lights;
            warn!(
                "camera '{}' sees {} lights, limit is {}; dropping the {} farthest",
                camera.name(),
                visible.len(),
                self.limits.max_lights,
                dropped
            );
            self.stats.lights_truncated += dropped as u32;
            visible.truncate(self.limits.max_lights);
        }

        for (_, light) in &visible {
            if light.casts_shadows() {
                self.prepare_shadow_map(light, camera, scene, lerp);
            } else {
                light.set_shadow_slot(NO_SHADOW_SLOT);
            }
            cmd.draw_light(light);
        }
    }

    fn record_renderable_pass(
        &mut self,
        cmd: &mut CommandBuffer,
        camera: &Arc<Camera>,
        scene: &dyn Scene,
        lerp: f32,
    ) {
        let mask = camera.culling_mask();
        for renderable in scene.renderables() {
            if renderable.is_active()
                && mask.intersects(renderable.layer_mask())
                && renderable.cull(camera)
            {
                renderable.record_commands(cmd, lerp);
            }
        }
    }

    /// Render the light's shadow map into a dedicated buffer dispatched
    /// ahead of the camera's primary buffer, at most once per frame no
    /// matter how many cameras see the light. Budget overflow leaves the
    /// light on the no-shadow sentinel.
    fn prepare_shadow_map(
        &mut self,
        light: &Arc<Light>,
        camera: &Arc<Camera>,
        scene: &dyn Scene,
        lerp: f32,
    ) {
        let key = Arc::as_ptr(light) as usize;
        if self.shadowed_lights.contains(&key) {
            return;
        }
        self.shadowed_lights.insert(key);

        let kind = ShadowMapKind::for_light(light.kind());
        let Some(slot) = self.shadow_budget.allocate(kind) else {
            light.set_shadow_slot(NO_SHADOW_SLOT);
            return;
        };
        light.set_shadow_slot(slot);

        let casters: Vec<Arc<dyn Renderable>> = scene
            .renderables()
            .into_iter()
            .filter(|r| r.is_active() && r.casts_shadows())
            .collect();

        let mut shadow_cmd = CommandBuffer::new();
        match light.kind() {
            LightKind::Directional => {
                let Some(target) = self.shadows.array_slice(slot) else {
                    light.set_shadow_slot(NO_SHADOW_SLOT);
                    return;
                };
                shadow_cmd.set_render_target(Some(target));
                let matrix =
                    light.directional_shadow_matrix(camera.position(), shadow_focus(camera, lerp));
                shadow_cmd.set_camera_matrix("viewProjection", matrix);
                record_casters(&mut shadow_cmd, &casters, lerp);
            }
            LightKind::Spot => {
                let Some(target) = self.shadows.map_2d(slot) else {
                    light.set_shadow_slot(NO_SHADOW_SLOT);
                    return;
                };
                shadow_cmd.set_render_target(Some(target));
                shadow_cmd.set_camera_matrix("viewProjection", light.spot_shadow_matrix());
                record_casters(&mut shadow_cmd, &casters, lerp);
            }
            LightKind::Point => {
                let matrices = light.point_shadow_matrices();
                for (face, matrix) in matrices.iter().enumerate() {
                    let Some(target) = self.shadows.cube_face(slot, face) else {
                        continue;
                    };
                    shadow_cmd.set_render_target(Some(target));
                    shadow_cmd.set_camera_matrix("viewProjection", *matrix);
                    record_casters(&mut shadow_cmd, &casters, lerp);
                }
            }
        }

        self.stats.shadow_maps_rendered += 1;
        self.queue.dispatch(shadow_cmd);
    }

    /// Drain and execute every pending buffer on the present thread.
    /// Returns the totals for the frame just presented.
    pub fn present(&mut self, backend: &dyn RenderBackend) -> FrameStats {
        // The previous frame's queue has fully drained by now, so pooled
        // temp targets are no longer in flight.
        self.pool.reclaim();
        self.context.reset();

        for buffer in self.queue.drain() {
            self.context
                .execute(&buffer, backend, &mut self.pool, &mut self.stats);
            self.stats.buffers_executed += 1;
        }

        self.stats
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.stats
    }
}

fn record_casters(cmd: &mut CommandBuffer, casters: &[Arc<dyn Renderable>], lerp: f32) {
    for caster in casters {
        caster.record_commands(cmd, lerp);
    }
}

/// Focus point for fitting directional shadow maps: a spot a little way
/// down the camera's view direction.
fn shadow_focus(camera: &Camera, lerp: f32) -> Vec3 {
    const FOCUS_DISTANCE: f32 = 10.0;
    let transform = camera.interpolated_transform(lerp);
    transform.translation + transform.forward() * FOCUS_DISTANCE
}
