// renderer/backend.rs
//
// The downstream contract. A backend owns the native API objects and
// executes the primitives the render context feeds it; everything above
// this trait is pure data flow. Only the present thread may call the
// execution methods.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::renderer::constant_buffer::ShaderReflection;
use crate::renderer::lights::LightsUniform;
use crate::renderer::resources::{
    Cubemap, Material, Mesh, RenderTarget, RenderTargetDescriptor, ScissorRect, Shader, SubMesh,
    Texture2D,
};
use crate::scene::Camera;

/// Opaque handle to a backend-owned constant buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Hardware/driver limits the light and shadow passes must respect.
#[derive(Clone, Copy, Debug)]
pub struct Limits {
    pub max_lights: usize,
    pub max_shadow_maps: usize,
    pub max_cascades: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_lights: 16,
            max_shadow_maps: 8,
            max_cascades: 4,
        }
    }
}

pub trait RenderBackend: Send + Sync {
    fn limits(&self) -> Limits;

    // Resource factories. Shared ownership so command buffers can keep
    // resources alive for the frames that reference them.
    fn create_mesh(&self, name: &str, vertex_count: u32, submeshes: Vec<SubMesh>) -> Arc<Mesh>;
    fn create_shader(&self, name: &str, source: &str, reflection: ShaderReflection) -> Arc<Shader>;
    fn create_texture2d(
        &self,
        name: &str,
        width: u32,
        height: u32,
        mip_count: u32,
        element_count: u32,
    ) -> Arc<Texture2D>;
    fn create_cubemap(&self, name: &str, size: u32, mip_count: u32) -> Arc<Cubemap>;
    fn create_render_target(&self, desc: &RenderTargetDescriptor) -> Arc<RenderTarget>;

    /// Materials carry no native objects of their own; backends may
    /// override to attach pipeline state.
    fn create_material(&self, name: &str, shader: &Arc<Shader>) -> Arc<Material> {
        Arc::new(Material::new(name, shader.clone()))
    }

    // Constant buffers.
    fn create_buffer(&self, name: &str, size: usize) -> BufferId;
    fn upload_buffer(&self, buffer: BufferId, data: &[u8]);
    fn bind_constant_buffer(&self, stage: ShaderStage, slot: u32, buffer: BufferId);

    // Execution primitives, one per command tag. Invoked by the render
    // context in recording order on the present thread.
    fn begin_camera(&self, camera: &Camera);
    fn end_camera(&self, camera: &Camera);
    fn bind_shader(&self, shader: &Shader);
    fn unbind_shader(&self, shader: &Shader);
    fn bind_material(&self, material: &Material);
    /// `None` binds the screen/backbuffer. Callers unbind shader-resource
    /// views first; see `RenderContext::bind_render_target`.
    fn bind_render_target(&self, target: Option<&RenderTarget>);
    fn unbind_shader_resources(&self);
    fn upload_lights(&self, lights: &LightsUniform);
    fn draw_mesh(&self, mesh: &Mesh, submesh: u32);
    fn draw_mesh_instanced(&self, mesh: &Mesh, instance_count: u32);
    fn draw_fullscreen_quad(&self);
    fn render_cubemap_face(&self, cubemap: &Cubemap, face: u32, dst_mip: u32, scratch: &RenderTarget);
    fn blit(&self, src: Option<&RenderTarget>, dst: Option<&RenderTarget>);
    fn set_scissor(&self, rect: ScissorRect);
    #[allow(clippy::too_many_arguments)]
    fn copy_texture(
        &self,
        src: &Texture2D,
        src_element: u32,
        src_mip: u32,
        dst: &Texture2D,
        dst_element: u32,
        dst_mip: u32,
    );
}

/// Headless no-op backend. Hands out resource ids and swallows every
/// execution primitive; useful for tests and server-side scene validation.
#[derive(Default)]
pub struct NullBackend {
    next_id: AtomicU64,
    limits: Limits,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            limits,
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl RenderBackend for NullBackend {
    fn limits(&self) -> Limits {
        self.limits
    }

    fn create_mesh(&self, name: &str, vertex_count: u32, submeshes: Vec<SubMesh>) -> Arc<Mesh> {
        Arc::new(Mesh {
            id: self.next_id(),
            name: name.to_string(),
            vertex_count,
            submeshes,
        })
    }

    fn create_shader(&self, name: &str, _source: &str, reflection: ShaderReflection) -> Arc<Shader> {
        Arc::new(Shader {
            id: self.next_id(),
            name: name.to_string(),
            reflection,
        })
    }

    fn create_texture2d(
        &self,
        name: &str,
        width: u32,
        height: u32,
        mip_count: u32,
        element_count: u32,
    ) -> Arc<Texture2D> {
        Arc::new(Texture2D {
            id: self.next_id(),
            name: name.to_string(),
            width,
            height,
            mip_count,
            element_count,
        })
    }

    fn create_cubemap(&self, name: &str, size: u32, mip_count: u32) -> Arc<Cubemap> {
        Arc::new(Cubemap {
            id: self.next_id(),
            name: name.to_string(),
            size,
            mip_count,
        })
    }

    fn create_render_target(&self, desc: &RenderTargetDescriptor) -> Arc<RenderTarget> {
        Arc::new(RenderTarget {
            id: self.next_id(),
            desc: desc.clone(),
        })
    }

    fn create_buffer(&self, _name: &str, _size: usize) -> BufferId {
        BufferId(self.next_id())
    }

    fn upload_buffer(&self, _buffer: BufferId, _data: &[u8]) {}
    fn bind_constant_buffer(&self, _stage: ShaderStage, _slot: u32, _buffer: BufferId) {}
    fn begin_camera(&self, _camera: &Camera) {}
    fn end_camera(&self, _camera: &Camera) {}
    fn bind_shader(&self, _shader: &Shader) {}
    fn unbind_shader(&self, _shader: &Shader) {}
    fn bind_material(&self, _material: &Material) {}
    fn bind_render_target(&self, _target: Option<&RenderTarget>) {}
    fn unbind_shader_resources(&self) {}
    fn upload_lights(&self, _lights: &LightsUniform) {}
    fn draw_mesh(&self, _mesh: &Mesh, _submesh: u32) {}
    fn draw_mesh_instanced(&self, _mesh: &Mesh, _instance_count: u32) {}
    fn draw_fullscreen_quad(&self) {}
    fn render_cubemap_face(
        &self,
        _cubemap: &Cubemap,
        _face: u32,
        _dst_mip: u32,
        _scratch: &RenderTarget,
    ) {
    }
    fn blit(&self, _src: Option<&RenderTarget>, _dst: Option<&RenderTarget>) {}
    fn set_scissor(&self, _rect: ScissorRect) {}
    fn copy_texture(
        &self,
        _src: &Texture2D,
        _src_element: u32,
        _src_mip: u32,
        _dst: &Texture2D,
        _dst_element: u32,
        _dst_mip: u32,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_backend_hands_out_unique_ids() {
        let backend = NullBackend::new();
        let a = backend.create_cubemap("a", 64, 1);
        let b = backend.create_cubemap("b", 64, 1);
        assert_ne!(a.id, b.id);
    }
}
