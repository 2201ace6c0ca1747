use std::sync::Arc;

use anyhow::Context as _;
use winit::window::Window;

/// Explicitly owned GPU context — adapter, device and queue — handed by
/// reference into every component that needs it. Dropped on shutdown after
/// the event loop exits.
pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

impl GpuContext {
    /// Acquire an adapter/device pair compatible with the window surface.
    /// Failure here is fatal: there is no fallback without a
    /// compute-capable device.
    pub async fn new(window: Arc<Window>) -> anyhow::Result<(Self, wgpu::Surface<'static>)> {
        let instance = wgpu::Instance::default();

        let surface = instance
            .create_surface(window)
            .context("failed to create window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable GPU adapter found")?;

        log_adapter_info(&adapter);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Lucent Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .context("failed to create GPU device")?;

        let context = Self {
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
        };

        Ok((context, surface))
    }

    /// Upper bound on invocations per workgroup, the sizing input for the
    /// compute dispatch.
    pub fn max_workgroup_invocations(&self) -> u32 {
        self.device.limits().max_compute_invocations_per_workgroup
    }
}

fn log_adapter_info(adapter: &wgpu::Adapter) {
    let info = adapter.get_info();
    let limits = adapter.limits();

    log::info!(
        "using adapter: {} ({:?}, {:?} backend)",
        info.name,
        info.device_type,
        info.backend
    );
    log::info!(
        "  max workgroup invocations: {}",
        limits.max_compute_invocations_per_workgroup
    );
    log::info!(
        "  max workgroup size: {} x {} x {}",
        limits.max_compute_workgroup_size_x,
        limits.max_compute_workgroup_size_y,
        limits.max_compute_workgroup_size_z
    );
    log::info!("  max buffer size: {} bytes", limits.max_buffer_size);
}
