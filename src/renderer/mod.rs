pub mod backend;
pub mod command_buffer;
pub mod constant_buffer;
pub mod context;
pub mod lights;
pub mod queue;
pub mod render_system;
pub mod resources;
pub mod shadows;
pub mod stats;
pub mod target_pool;

pub use backend::{BufferId, Limits, NullBackend, RenderBackend, ShaderStage};
pub use command_buffer::{BlitSurface, CommandBuffer, GpuCommand};
pub use constant_buffer::{
    BufferKind, BufferLayout, BufferMember, MappedConstantBuffer, MemberType, ShaderReflection,
};
pub use context::RenderContext;
pub use lights::{LightSample, LightsUniform};
pub use queue::PendingCommandQueue;
pub use render_system::{RenderAssets, RenderSystem};
pub use resources::{
    Cubemap, Material, MaterialFlags, Mesh, RenderTarget, RenderTargetDescriptor, ScissorRect,
    Shader, SubMesh, Texture2D,
};
pub use shadows::{ShadowBudget, ShadowMapKind, ShadowResources};
pub use stats::{CameraStats, FrameStats};
pub use target_pool::{TargetHandle, TargetPool};
