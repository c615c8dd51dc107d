// renderer/resources.rs
//
// Backend-agnostic resource descriptions. The concrete GPU objects live
// behind the backend; these carry the identity and metadata the recording
// and execution sides need. All of them are shared via `Arc` and kept
// alive by the command buffers that reference them.

use std::sync::Arc;

use crate::renderer::constant_buffer::ShaderReflection;

/// Index range of one drawable section of a mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubMesh {
    pub start_index: u32,
    pub index_count: u32,
}

impl SubMesh {
    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }
}

#[derive(Debug)]
pub struct Mesh {
    pub id: u64,
    pub name: String,
    pub vertex_count: u32,
    pub submeshes: Vec<SubMesh>,
}

impl Mesh {
    pub fn submesh(&self, index: u32) -> Option<&SubMesh> {
        self.submeshes.get(index as usize)
    }

    pub fn triangle_count(&self) -> u32 {
        self.submeshes.iter().map(SubMesh::triangle_count).sum()
    }
}

#[derive(Debug)]
pub struct Shader {
    pub id: u64,
    pub name: String,
    pub reflection: ShaderReflection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialFlags(u32);

impl MaterialFlags {
    pub const NONE: Self = Self(0);
    pub const ALPHA_BLEND: Self = Self(1 << 0);
    pub const DOUBLE_SIDED: Self = Self(1 << 1);
    pub const UNLIT: Self = Self(1 << 2);

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for MaterialFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug)]
pub struct Material {
    pub name: String,
    pub shader: Arc<Shader>,
    pub base_color: [f32; 4],
    pub flags: MaterialFlags,
}

impl Material {
    pub fn new(name: impl Into<String>, shader: Arc<Shader>) -> Self {
        Self {
            name: name.into(),
            shader,
            base_color: [1.0, 1.0, 1.0, 1.0],
            flags: MaterialFlags::NONE,
        }
    }

    /// Loud magenta fallback used when a proper material is unavailable.
    pub fn error(shader: Arc<Shader>) -> Self {
        Self {
            name: "Error".to_string(),
            shader,
            base_color: [1.0, 0.0, 1.0, 1.0],
            flags: MaterialFlags::UNLIT,
        }
    }

    pub fn with_base_color(mut self, color: [f32; 4]) -> Self {
        self.base_color = color;
        self
    }

    pub fn with_flags(mut self, flags: MaterialFlags) -> Self {
        self.flags.insert(flags);
        self
    }
}

#[derive(Debug)]
pub struct Texture2D {
    pub id: u64,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub mip_count: u32,
    pub element_count: u32,
}

#[derive(Debug)]
pub struct Cubemap {
    pub id: u64,
    pub name: String,
    pub size: u32,
    pub mip_count: u32,
}

impl Cubemap {
    /// Edge length of the given mip level, never below one texel.
    pub fn mip_size(&self, mip: u32) -> u32 {
        (self.size >> mip).max(1)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderTargetDescriptor {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub color: bool,
    pub depth: bool,
}

impl RenderTargetDescriptor {
    pub fn color(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            color: true,
            depth: true,
        }
    }

    pub fn depth_only(name: impl Into<String>, size: u32) -> Self {
        Self {
            name: name.into(),
            width: size,
            height: size,
            color: false,
            depth: true,
        }
    }

    /// Pool-compatibility check: name is a label, not identity.
    pub fn compatible_with(&self, other: &RenderTargetDescriptor) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.color == other.color
            && self.depth == other.depth
    }
}

#[derive(Debug)]
pub struct RenderTarget {
    pub id: u64,
    pub desc: RenderTargetDescriptor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submesh_triangle_count() {
        let sub = SubMesh {
            start_index: 0,
            index_count: 36,
        };
        assert_eq!(sub.triangle_count(), 12);
    }

    #[test]
    fn cubemap_mip_size_clamps_to_one() {
        let cube = Cubemap {
            id: 1,
            name: "env".into(),
            size: 8,
            mip_count: 6,
        };
        assert_eq!(cube.mip_size(0), 8);
        assert_eq!(cube.mip_size(3), 1);
        assert_eq!(cube.mip_size(5), 1);
    }

    #[test]
    fn pool_compatibility_ignores_name() {
        let a = RenderTargetDescriptor::color("a", 256, 256);
        let b = RenderTargetDescriptor::color("b", 256, 256);
        let c = RenderTargetDescriptor::depth_only("c", 256);
        assert!(a.compatible_with(&b));
        assert!(!a.compatible_with(&c));
    }
}
