pub mod renderer;
pub mod scene;
pub mod settings;

pub use renderer::{
    CommandBuffer, FrameStats, GpuCommand, Limits, NullBackend, PendingCommandQueue,
    RenderAssets, RenderBackend, RenderSystem,
};
pub use scene::{Camera, LayerMask, Light, Renderable, Scene, Transform};
pub use settings::RenderSettings;

/// Install the default logger. Safe to call more than once; later calls
/// are ignored so tests and embedding applications can both use it.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
