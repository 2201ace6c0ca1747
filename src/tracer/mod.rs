mod context;
mod dispatch;

pub use context::GpuContext;
pub use dispatch::FrameDispatcher;

/// One frame producer, driven by the event loop. The windowing layer talks
/// to it through this interface only; pausing suppresses dispatch without
/// touching any camera or timing state.
pub trait FrameSource {
    fn render_frame(&mut self) -> anyhow::Result<()>;
    fn set_paused(&mut self, paused: bool);
    fn shutdown(&mut self);
    fn fps(&self) -> f64;
}
