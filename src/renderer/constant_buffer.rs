// renderer/constant_buffer.rs
//
// CPU-mirrored uniform blocks. Layouts come from shader reflection; the
// four well-known blocks (Global/Object/Camera/Light) are recognized by
// name substring and created once each, first-seen layout wins.

use log::warn;

use crate::renderer::backend::{BufferId, RenderBackend, ShaderStage};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberType {
    Float,
    Float2,
    Float3,
    Float4,
    Int,
    UInt,
    Mat4,
    /// Opaque blob, e.g. a light array; the size lives on the member.
    Raw,
}

impl MemberType {
    pub fn size(&self) -> usize {
        match self {
            MemberType::Float | MemberType::Int | MemberType::UInt => 4,
            MemberType::Float2 => 8,
            MemberType::Float3 => 12,
            MemberType::Float4 => 16,
            MemberType::Mat4 => 64,
            MemberType::Raw => 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferMember {
    pub name: String,
    pub offset: usize,
    pub size: usize,
    pub ty: MemberType,
}

impl BufferMember {
    pub fn new(name: impl Into<String>, offset: usize, ty: MemberType) -> Self {
        Self {
            name: name.into(),
            offset,
            size: ty.size(),
            ty,
        }
    }

    pub fn raw(name: impl Into<String>, offset: usize, size: usize) -> Self {
        Self {
            name: name.into(),
            offset,
            size,
            ty: MemberType::Raw,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferLayout {
    pub name: String,
    pub size: usize,
    members: Vec<BufferMember>,
}

impl BufferLayout {
    pub fn new(name: impl Into<String>, members: Vec<BufferMember>) -> Self {
        let end = members
            .iter()
            .map(|m| m.offset + m.size)
            .max()
            .unwrap_or(0);
        // Constant buffers are bound in 16-byte registers.
        let size = end.div_ceil(16) * 16;
        Self {
            name: name.into(),
            size,
            members,
        }
    }

    pub fn member(&self, name: &str) -> Option<&BufferMember> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn members(&self) -> &[BufferMember] {
        &self.members
    }

    pub fn matches(&self, other: &BufferLayout) -> bool {
        self.size == other.size && self.members == other.members
    }
}

/// Reflection output for one compiled shader: every constant-buffer block
/// it declares.
#[derive(Clone, Debug, Default)]
pub struct ShaderReflection {
    pub buffers: Vec<BufferLayout>,
}

/// The well-known uniform blocks, recognized by name substring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Global,
    Object,
    Camera,
    Light,
}

impl BufferKind {
    pub const ALL: [BufferKind; 4] = [
        BufferKind::Global,
        BufferKind::Object,
        BufferKind::Camera,
        BufferKind::Light,
    ];

    pub fn classify(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.contains("global") {
            Some(BufferKind::Global)
        } else if lower.contains("object") {
            Some(BufferKind::Object)
        } else if lower.contains("camera") {
            Some(BufferKind::Camera)
        } else if lower.contains("light") {
            Some(BufferKind::Light)
        } else {
            None
        }
    }

    pub const fn slot(self) -> u32 {
        match self {
            BufferKind::Global => 0,
            BufferKind::Camera => 1,
            BufferKind::Object => 2,
            BufferKind::Light => 3,
        }
    }

    pub const fn index(self) -> usize {
        self.slot() as usize
    }
}

/// One uniform block with a CPU mirror and a lazily-synchronized GPU copy.
/// `update` only touches the mirror; `flush` uploads when dirty; `bind`
/// flushes first and then attaches the buffer to a shader stage.
pub struct MappedConstantBuffer {
    layout: BufferLayout,
    cpu: Vec<u8>,
    gpu: BufferId,
    dirty: bool,
}

impl MappedConstantBuffer {
    pub fn new(layout: BufferLayout, backend: &dyn RenderBackend) -> Self {
        let gpu = backend.create_buffer(&layout.name, layout.size);
        let cpu = vec![0u8; layout.size];
        Self {
            layout,
            cpu,
            gpu,
            // First flush uploads the zeroed mirror so the GPU copy is
            // never uninitialized.
            dirty: true,
        }
    }

    pub fn layout(&self) -> &BufferLayout {
        &self.layout
    }

    pub fn gpu_buffer(&self) -> BufferId {
        self.gpu
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn update<T: bytemuck::Pod>(&mut self, member: &str, value: &T) {
        self.update_bytes(member, bytemuck::bytes_of(value));
    }

    /// Copy `data` into the mirror at the member's reflected offset. An
    /// unknown member name is a no-op with a warning; a size mismatch
    /// copies the overlapping prefix.
    pub fn update_bytes(&mut self, member: &str, data: &[u8]) {
        let Some(found) = self.layout.member(member) else {
            warn!(
                "constant buffer '{}' has no member '{}'; update dropped",
                self.layout.name, member
            );
            return;
        };
        if data.len() != found.size {
            warn!(
                "constant buffer '{}' member '{}' is {} bytes, got {}",
                self.layout.name,
                member,
                found.size,
                data.len()
            );
        }
        let count = data.len().min(found.size);
        let offset = found.offset;
        self.cpu[offset..offset + count].copy_from_slice(&data[..count]);
        self.dirty = true;
    }

    /// Whole-range write for array members (the serialized light list).
    /// Out-of-range bytes are clipped with a warning.
    pub fn write_raw(&mut self, offset: usize, data: &[u8]) {
        if offset >= self.cpu.len() {
            warn!(
                "constant buffer '{}' raw write at {} is past the end ({})",
                self.layout.name,
                offset,
                self.cpu.len()
            );
            return;
        }
        let count = data.len().min(self.cpu.len() - offset);
        if count < data.len() {
            warn!(
                "constant buffer '{}' raw write clipped to {} bytes",
                self.layout.name, count
            );
        }
        self.cpu[offset..offset + count].copy_from_slice(&data[..count]);
        self.dirty = true;
    }

    /// Upload the mirror if it changed since the last flush.
    pub fn flush(&mut self, backend: &dyn RenderBackend) {
        if !self.dirty {
            return;
        }
        backend.upload_buffer(self.gpu, &self.cpu);
        self.dirty = false;
    }

    /// Flush, then attach to the given stage at this buffer's slot.
    pub fn bind(&mut self, backend: &dyn RenderBackend, stage: ShaderStage, slot: u32) {
        self.flush(backend);
        backend.bind_constant_buffer(stage, slot, self.gpu);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::NullBackend;

    fn camera_layout() -> BufferLayout {
        BufferLayout::new(
            "CameraBuffer",
            vec![
                BufferMember::new("view", 0, MemberType::Mat4),
                BufferMember::new("projection", 64, MemberType::Mat4),
                BufferMember::new("position", 128, MemberType::Float3),
            ],
        )
    }

    #[test]
    fn layout_size_rounds_to_sixteen() {
        let layout = camera_layout();
        // 128 + 12 rounds up to 144.
        assert_eq!(layout.size, 144);
    }

    #[test]
    fn classify_well_known_names() {
        assert_eq!(BufferKind::classify("GlobalBuffer"), Some(BufferKind::Global));
        assert_eq!(BufferKind::classify("perObjectData"), Some(BufferKind::Object));
        assert_eq!(BufferKind::classify("CAMERA_CB"), Some(BufferKind::Camera));
        assert_eq!(BufferKind::classify("LightArray"), Some(BufferKind::Light));
        assert_eq!(BufferKind::classify("MaterialParams"), None);
    }

    #[test]
    fn update_marks_dirty_and_flush_clears() {
        let backend = NullBackend::new();
        let mut buffer = MappedConstantBuffer::new(camera_layout(), &backend);
        buffer.flush(&backend);
        assert!(!buffer.is_dirty());

        buffer.update("position", &[1.0f32, 2.0, 3.0]);
        assert!(buffer.is_dirty());
        buffer.flush(&backend);
        assert!(!buffer.is_dirty());
    }

    #[test]
    fn unknown_member_is_a_noop() {
        let backend = NullBackend::new();
        let mut buffer = MappedConstantBuffer::new(camera_layout(), &backend);
        buffer.flush(&backend);
        buffer.update("bogus", &1.0f32);
        assert!(!buffer.is_dirty());
    }

    #[test]
    fn update_lands_at_reflected_offset() {
        let backend = NullBackend::new();
        let mut buffer = MappedConstantBuffer::new(camera_layout(), &backend);
        buffer.update("position", &[5.0f32, 6.0, 7.0]);
        let bytes = &buffer.cpu[128..140];
        let values: &[f32] = bytemuck::cast_slice(bytes);
        assert_eq!(values, &[5.0, 6.0, 7.0]);
    }

    #[test]
    fn raw_write_clips_to_buffer_end() {
        let backend = NullBackend::new();
        let mut buffer = MappedConstantBuffer::new(camera_layout(), &backend);
        let big = vec![0xABu8; 1024];
        buffer.write_raw(140, &big);
        assert_eq!(buffer.cpu[143], 0xAB);
        assert_eq!(buffer.cpu.len(), 144);
    }
}
