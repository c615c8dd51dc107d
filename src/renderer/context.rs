// renderer/context.rs
//
// Backend-side execution state machine. Persists for the backend's
// lifetime and caches the currently bound camera/shader/material/target so
// redundant rebinds never reach the native API. Only the present thread
// touches this type.

use std::sync::{Arc, Weak};

use glam::Mat4;
use log::{debug, warn};

use crate::renderer::backend::{Limits, RenderBackend, ShaderStage};
use crate::renderer::command_buffer::{BlitSurface, CommandBuffer, GpuCommand};
use crate::renderer::constant_buffer::{BufferKind, MappedConstantBuffer, ShaderReflection};
use crate::renderer::lights::{LightSample, LightsUniform};
use crate::renderer::resources::{
    Cubemap, Material, Mesh, RenderTarget, RenderTargetDescriptor,
};
use crate::renderer::stats::FrameStats;
use crate::renderer::target_pool::TargetPool;
use crate::scene::camera::Camera;
use crate::scene::light::Light;

pub struct RenderContext {
    camera: Weak<Camera>,
    shader: Option<Arc<crate::renderer::resources::Shader>>,
    material: Option<Arc<Material>>,
    /// Outer `None`: nothing bound since the last reset. Inner `None`: the
    /// screen/backbuffer is bound.
    target: Option<Option<Arc<RenderTarget>>>,
    lights: Vec<LightSample>,
    lights_updated: bool,
    /// The four well-known uniform blocks, indexed by `BufferKind::index()`.
    /// Created on first reflection sighting, kept for the backend lifetime.
    buffers: [Option<MappedConstantBuffer>; 4],
    limits: Limits,
}

impl RenderContext {
    pub fn new(limits: Limits) -> Self {
        Self {
            camera: Weak::new(),
            shader: None,
            material: None,
            target: None,
            lights: Vec::with_capacity(limits.max_lights),
            lights_updated: false,
            buffers: [None, None, None, None],
            limits,
        }
    }

    /// Clear every cached binding and the light list. Invoked on
    /// `EndCamera` and at the start of each present pass. The well-known
    /// constant buffers survive; they are per-backend, not per-camera.
    pub fn reset(&mut self) {
        self.camera = Weak::new();
        self.shader = None;
        self.material = None;
        self.target = None;
        self.lights.clear();
        self.lights_updated = false;
    }

    /// Create the well-known constant buffers a shader's reflection
    /// declares. Safe to call repeatedly; a mismatched layout for an
    /// already-created buffer logs and keeps the first-seen layout.
    pub fn register_shader_reflection(
        &mut self,
        reflection: &ShaderReflection,
        backend: &dyn RenderBackend,
    ) {
        for layout in &reflection.buffers {
            let Some(kind) = BufferKind::classify(&layout.name) else {
                debug!("constant buffer '{}' is not a well-known block", layout.name);
                continue;
            };
            match &self.buffers[kind.index()] {
                Some(existing) => {
                    if !existing.layout().matches(layout) {
                        warn!(
                            "shader declares conflicting layout for {:?} buffer '{}'; \
                             keeping the first-seen layout",
                            kind, layout.name
                        );
                    }
                }
                None => {
                    self.buffers[kind.index()] =
                        Some(MappedConstantBuffer::new(layout.clone(), backend));
                }
            }
        }
    }

    pub fn buffer(&self, kind: BufferKind) -> Option<&MappedConstantBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    fn buffer_mut(&mut self, kind: BufferKind) -> Option<&mut MappedConstantBuffer> {
        self.buffers[kind.index()].as_mut()
    }

    /// Execute one drained buffer in recording order.
    pub fn execute(
        &mut self,
        buffer: &CommandBuffer,
        backend: &dyn RenderBackend,
        pool: &mut TargetPool,
        stats: &mut FrameStats,
    ) {
        for command in buffer.commands() {
            match command {
                GpuCommand::SetCamera(camera) => self.set_camera(camera, backend),
                GpuCommand::EndCamera(camera) => self.end_camera(camera, backend),
                GpuCommand::DrawMesh {
                    mesh,
                    material,
                    model,
                    submesh,
                } => self.draw_mesh(mesh, material, *model, *submesh, backend, stats),
                GpuCommand::DrawMeshInstanced {
                    mesh,
                    material,
                    model,
                    instance_count,
                } => self.draw_mesh_instanced(mesh, material, *model, *instance_count, backend, stats),
                GpuCommand::DrawLight(light) => self.draw_light(light),
                GpuCommand::SetRenderTarget(target) => {
                    self.bind_render_target(target.clone(), backend)
                }
                GpuCommand::DrawFullscreenQuad(material) => {
                    self.draw_fullscreen_quad(material, backend, stats)
                }
                GpuCommand::RenderCubemap {
                    cubemap,
                    material,
                    dst_mip,
                } => self.render_cubemap(cubemap, material, *dst_mip, backend, pool, stats),
                GpuCommand::Blit { src, dst, material } => {
                    self.blit(src, dst, material, backend, stats)
                }
                GpuCommand::SetScissor(rect) => backend.set_scissor(*rect),
                GpuCommand::SetCameraMatrix { member, matrix } => {
                    self.set_camera_matrix(member, *matrix)
                }
                GpuCommand::CopyTexture {
                    src,
                    src_element,
                    src_mip,
                    dst,
                    dst_element,
                    dst_mip,
                } => backend.copy_texture(src, *src_element, *src_mip, dst, *dst_element, *dst_mip),
            }
        }
    }

    fn set_camera(&mut self, camera: &Weak<Camera>, backend: &dyn RenderBackend) {
        let Some(strong) = camera.upgrade() else {
            warn!("SetCamera references a dropped camera; skipping");
            return;
        };
        strong.reset_stats();
        backend.begin_camera(&strong);
        self.camera = camera.clone();
    }

    fn end_camera(&mut self, camera: &Weak<Camera>, backend: &dyn RenderBackend) {
        if let Some(strong) = camera.upgrade() {
            backend.end_camera(&strong);
        } else {
            warn!("EndCamera references a dropped camera");
        }
        self.reset();
    }

    fn bind_shader(
        &mut self,
        shader: &Arc<crate::renderer::resources::Shader>,
        backend: &dyn RenderBackend,
    ) {
        if let Some(current) = &self.shader {
            if Arc::ptr_eq(current, shader) {
                return;
            }
        }
        if let Some(old) = self.shader.take() {
            backend.unbind_shader(&old);
        }
        backend.bind_shader(shader);
        self.register_shader_reflection(&shader.reflection, backend);
        self.shader = Some(shader.clone());
    }

    fn bind_material(&mut self, material: &Arc<Material>, backend: &dyn RenderBackend) {
        if let Some(current) = &self.material {
            if Arc::ptr_eq(current, material) {
                return;
            }
        }
        self.bind_shader(&material.shader, backend);
        backend.bind_material(material);
        self.material = Some(material.clone());
    }

    fn bind_render_target(
        &mut self,
        target: Option<Arc<RenderTarget>>,
        backend: &dyn RenderBackend,
    ) {
        // A texture must never be bound as render target and shader input
        // at once; drop every shader-resource view first.
        backend.unbind_shader_resources();
        backend.bind_render_target(target.as_deref());
        self.target = Some(target);
    }

    fn draw_light(&mut self, light: &Weak<Light>) {
        let Some(strong) = light.upgrade() else {
            warn!("DrawLight references a dropped light; skipping");
            return;
        };
        if self.lights.len() >= self.limits.max_lights {
            debug!(
                "light list already at capacity ({}); dropping '{}'",
                self.limits.max_lights,
                strong.name()
            );
            return;
        }
        self.lights.push(LightSample::capture(&strong));
        self.lights_updated = true;
        if let Some(camera) = self.camera.upgrade() {
            camera.record_light();
        }
    }

    /// Serialize the light list into the Light constant buffer, at most
    /// once per change. Draw execution calls this before every draw; the
    /// flag makes the repeat calls free.
    fn flush_lights(&mut self, backend: &dyn RenderBackend) {
        if !self.lights_updated {
            return;
        }
        let uniform = LightsUniform::from_samples(&self.lights);
        if let Some(buffer) = self.buffer_mut(BufferKind::Light) {
            buffer.write_raw(0, bytemuck::bytes_of(&uniform));
        } else {
            backend.upload_lights(&uniform);
        }
        self.lights_updated = false;
    }

    fn bind_constant_buffers(&mut self, backend: &dyn RenderBackend) {
        for index in 0..self.buffers.len() {
            if let Some(buffer) = self.buffers[index].as_mut() {
                let slot = index as u32;
                buffer.bind(backend, ShaderStage::Vertex, slot);
                buffer.bind(backend, ShaderStage::Fragment, slot);
            }
        }
    }

    fn prepare_draw(&mut self, material: &Arc<Material>, model: Mat4, backend: &dyn RenderBackend) {
        self.bind_material(material, backend);
        self.flush_lights(backend);
        if let Some(buffer) = self.buffer_mut(BufferKind::Object) {
            buffer.update("model", &model.to_cols_array_2d());
        }
        self.bind_constant_buffers(backend);
    }

    fn draw_mesh(
        &mut self,
        mesh: &Arc<Mesh>,
        material: &Arc<Material>,
        model: Mat4,
        submesh: u32,
        backend: &dyn RenderBackend,
        stats: &mut FrameStats,
    ) {
        let Some(section) = mesh.submesh(submesh) else {
            warn!(
                "mesh '{}' has no submesh {}; draw dropped",
                mesh.name, submesh
            );
            return;
        };
        let triangles = section.triangle_count();
        self.prepare_draw(material, model, backend);
        backend.draw_mesh(mesh, submesh);
        stats.draw_calls += 1;
        if let Some(camera) = self.camera.upgrade() {
            camera.record_draw(mesh.vertex_count, triangles);
        }
    }

    fn draw_mesh_instanced(
        &mut self,
        mesh: &Arc<Mesh>,
        material: &Arc<Material>,
        model: Mat4,
        instance_count: u32,
        backend: &dyn RenderBackend,
        stats: &mut FrameStats,
    ) {
        self.prepare_draw(material, model, backend);
        backend.draw_mesh_instanced(mesh, instance_count);
        stats.draw_calls += 1;
        if let Some(camera) = self.camera.upgrade() {
            camera.record_draw(
                mesh.vertex_count * instance_count,
                mesh.triangle_count() * instance_count,
            );
        }
    }

    fn draw_fullscreen_quad(
        &mut self,
        material: &Arc<Material>,
        backend: &dyn RenderBackend,
        stats: &mut FrameStats,
    ) {
        self.bind_material(material, backend);
        self.flush_lights(backend);
        self.bind_constant_buffers(backend);
        backend.draw_fullscreen_quad();
        stats.draw_calls += 1;
        if let Some(camera) = self.camera.upgrade() {
            camera.record_draw(3, 1);
        }
    }

    fn render_cubemap(
        &mut self,
        cubemap: &Arc<Cubemap>,
        material: &Arc<Material>,
        dst_mip: u32,
        backend: &dyn RenderBackend,
        pool: &mut TargetPool,
        stats: &mut FrameStats,
    ) {
        self.bind_material(material, backend);
        let size = cubemap.mip_size(dst_mip);
        for face in 0..6 {
            let desc = RenderTargetDescriptor::color(
                format!("{}Face{face}Mip{dst_mip}", cubemap.name),
                size,
                size,
            );
            // The scratch target stays in flight until the next present
            // reclaims the pool.
            let (_, scratch) = pool.acquire(&desc, backend);
            backend.render_cubemap_face(cubemap, face, dst_mip, &scratch);
            stats.draw_calls += 1;
        }
    }

    fn blit(
        &mut self,
        src: &BlitSurface,
        dst: &BlitSurface,
        material: &Arc<Material>,
        backend: &dyn RenderBackend,
        stats: &mut FrameStats,
    ) {
        self.bind_material(material, backend);
        let src = self.resolve_surface(src);
        let dst = self.resolve_surface(dst);
        backend.unbind_shader_resources();
        backend.blit(src.as_deref(), dst.as_deref());
        self.target = Some(dst);
        stats.draw_calls += 1;
        if let Some(camera) = self.camera.upgrade() {
            camera.record_draw(3, 1);
        }
    }

    /// `Previous` resolves to whatever target is bound right now; with
    /// nothing bound it degrades to the screen.
    fn resolve_surface(&self, surface: &BlitSurface) -> Option<Arc<RenderTarget>> {
        match surface {
            BlitSurface::Screen => None,
            BlitSurface::Previous => self.target.clone().flatten(),
            BlitSurface::Target(target) => Some(target.clone()),
        }
    }

    fn set_camera_matrix(&mut self, member: &str, matrix: Mat4) {
        if let Some(buffer) = self.buffer_mut(BufferKind::Camera) {
            buffer.update(member, &matrix.to_cols_array_2d());
        } else {
            warn!(
                "no camera constant buffer reflected yet; '{}' update dropped",
                member
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::NullBackend;
    use crate::renderer::constant_buffer::{BufferLayout, BufferMember, MemberType};

    fn camera_reflection() -> ShaderReflection {
        ShaderReflection {
            buffers: vec![BufferLayout::new(
                "CameraBuffer",
                vec![BufferMember::new("view", 0, MemberType::Mat4)],
            )],
        }
    }

    #[test]
    fn conflicting_layout_keeps_first_seen() {
        let backend = NullBackend::new();
        let mut context = RenderContext::new(Limits::default());
        context.register_shader_reflection(&camera_reflection(), &backend);

        let conflicting = ShaderReflection {
            buffers: vec![BufferLayout::new(
                "CameraBuffer",
                vec![
                    BufferMember::new("view", 0, MemberType::Mat4),
                    BufferMember::new("projection", 64, MemberType::Mat4),
                ],
            )],
        };
        context.register_shader_reflection(&conflicting, &backend);

        let buffer = context.buffer(BufferKind::Camera).unwrap();
        assert!(buffer.layout().member("projection").is_none());
        assert_eq!(buffer.layout().size, 64);
    }

    #[test]
    fn reset_keeps_constant_buffers() {
        let backend = NullBackend::new();
        let mut context = RenderContext::new(Limits::default());
        context.register_shader_reflection(&camera_reflection(), &backend);
        context.reset();
        assert!(context.buffer(BufferKind::Camera).is_some());
    }
}
