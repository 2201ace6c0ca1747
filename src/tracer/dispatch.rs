use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::Context as _;

use crate::camera::CameraMatrix;
use crate::frame::FrameExchange;

use super::context::GpuContext;
use super::FrameSource;

const MAX_LOCAL_WORK_SIZE: u32 = 256;
const FIELD_OF_VIEW_DEG: f32 = 45.0;

//
// ──────────────────────────────────────────────────────────────
//   Dispatch Sizing
// ──────────────────────────────────────────────────────────────
//

/// Work sizing, computed once at startup from the initial surface
/// dimensions. A window resize does not re-size the dispatch; the image
/// keeps its startup resolution for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSizing {
    pub local_work_size: u32,
    pub local_x: u32,
    pub local_y: u32,
    pub global_x: u32,
    pub global_y: u32,
    pub global_work_size: u64,
}

impl DispatchSizing {
    pub fn compute(width: u32, height: u32, max_workgroup_invocations: u32) -> Self {
        let local_work_size = MAX_LOCAL_WORK_SIZE.min(max_workgroup_invocations);

        // Known approximation: the square-root split truncates when
        // local_work_size is not a perfect square (200 -> 14x14 = 196),
        // leaving some lanes per group unused. The dispatch stays valid.
        let local_x = (local_work_size as f64).sqrt() as u32;
        let local_y = local_x;

        // Pad the total up to the next workgroup multiple; the output
        // buffer is allocated against the padded count and the kernel
        // leaves the padding cells untouched.
        let mut global_work_size = width as u64 * height as u64;
        let remainder = global_work_size % local_work_size as u64;
        if remainder != 0 {
            global_work_size += local_work_size as u64 - remainder;
        }

        Self {
            local_work_size,
            local_x,
            local_y,
            global_x: width,
            global_y: height,
            global_work_size,
        }
    }

    /// f32 cell count of the RGB output buffer (padded pixels × 3).
    pub fn output_floats(&self) -> u64 {
        self.global_work_size * 3
    }

    /// Workgroup counts covering the 2D pixel grid.
    pub fn workgroups(&self) -> (u32, u32) {
        (
            self.global_x.div_ceil(self.local_x),
            self.global_y.div_ceil(self.local_y),
        )
    }
}

//
// ──────────────────────────────────────────────────────────────
//   FPS estimate
// ──────────────────────────────────────────────────────────────
//

/// Rolling frame-rate estimate: exponential moving average with a
/// half-life of one frame.
#[derive(Debug, Default)]
struct FpsCounter {
    fps: f64,
}

impl FpsCounter {
    fn update(&mut self, elapsed_nanos: u64) {
        self.fps = 0.5 * self.fps + 0.5 * (1e9 / elapsed_nanos as f64);
    }

    fn get(&self) -> f64 {
        self.fps
    }

    fn is_first_frame(&self) -> bool {
        self.fps == 0.0
    }
}

//
// ──────────────────────────────────────────────────────────────
//   Kernel interface
// ──────────────────────────────────────────────────────────────
//

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct TraceParams {
    width: u32,
    height: u32,
    aspect: f32,
    half_fov_tan: f32,
}

// Catch CPU/GPU layout mismatches at compile time
const _: () = assert!(std::mem::size_of::<TraceParams>() == 16);

//
// ──────────────────────────────────────────────────────────────
//   FrameDispatcher
// ──────────────────────────────────────────────────────────────
//

pub struct FrameDispatcher {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,

    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    camera_buffer: wgpu::Buffer,
    output_buffer: wgpu::Buffer,
    staging_buffer: wgpu::Buffer,

    sizing: DispatchSizing,
    camera: Arc<Mutex<CameraMatrix>>,
    exchange: Arc<FrameExchange>,
    back: Vec<f32>,

    fps: FpsCounter,
    paused: bool,
}

impl FrameDispatcher {
    pub fn new(
        ctx: &GpuContext,
        width: u32,
        height: u32,
        camera: Arc<Mutex<CameraMatrix>>,
    ) -> anyhow::Result<Self> {
        let sizing = DispatchSizing::compute(width, height, ctx.max_workgroup_invocations());

        log::info!(
            "computing {} x {} ({}) pixels",
            width,
            height,
            width as u64 * height as u64
        );
        log::info!(
            "local work group size: {} ({} x {})",
            sizing.local_work_size,
            sizing.local_x,
            sizing.local_y
        );
        log::info!("global work size: {}", sizing.global_work_size);

        let (camera_buffer, output_buffer, staging_buffer, params_buffer) =
            create_buffers(&ctx.device, &sizing, width, height);

        let (pipeline, bind_group) = create_pipeline(
            &ctx.device,
            &sizing,
            &params_buffer,
            &camera_buffer,
            &output_buffer,
        )?;

        let len = sizing.output_floats() as usize;

        Ok(Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            pipeline,
            bind_group,
            camera_buffer,
            output_buffer,
            staging_buffer,
            sizing,
            camera,
            exchange: Arc::new(FrameExchange::new(len)),
            back: vec![0.0; len],
            fps: FpsCounter::default(),
            paused: false,
        })
    }

    /// Handle for the presenter's side of the double buffer.
    pub fn exchange(&self) -> Arc<FrameExchange> {
        self.exchange.clone()
    }

    /// f32 cell count of one exchanged frame.
    pub fn exchange_len(&self) -> u64 {
        self.back.len() as u64
    }

    fn read_back(&mut self) -> anyhow::Result<()> {
        let slice = self.staging_buffer.slice(..);

        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        // Blocking: suspend until the device has finished the whole frame
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .context("device disconnected during frame readback")?
            .context("failed to map frame staging buffer")?;

        {
            let data = slice.get_mapped_range();
            self.back.copy_from_slice(bytemuck::cast_slice(&data));
        }
        self.staging_buffer.unmap();

        Ok(())
    }
}

impl FrameSource for FrameDispatcher {
    fn render_frame(&mut self) -> anyhow::Result<()> {
        if self.paused {
            return Ok(());
        }

        // Snapshot the camera once per frame under its lock; input
        // callbacks mutate it from the event thread.
        let transform = *self.camera.lock().unwrap().transform();

        let start = Instant::now();

        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&transform));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Trace Encoder"),
            });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Trace Pass"),
                timestamp_writes: None,
            });

            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);

            let (groups_x, groups_y) = self.sizing.workgroups();
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }

        // The copy is ordered after the pass within the submission, so the
        // readback below observes the completed frame.
        encoder.copy_buffer_to_buffer(
            &self.output_buffer,
            0,
            &self.staging_buffer,
            0,
            self.staging_buffer.size(),
        );

        self.queue.submit(Some(encoder.finish()));

        self.read_back()?;
        self.exchange.publish(&mut self.back);

        let elapsed = start.elapsed();
        if self.fps.is_first_frame() {
            let in_flight = 2 * self.output_buffer.size();
            log::info!("device memory in flight: {} MB", in_flight / 1_000_000);
            log::info!(
                "first frame took {} ms ({} ns)",
                elapsed.as_millis(),
                elapsed.as_nanos()
            );
        }
        self.fps.update(elapsed.as_nanos() as u64);

        Ok(())
    }

    fn set_paused(&mut self, paused: bool) {
        // A pure gate: no camera, sizing or FPS state changes here
        self.paused = paused;
    }

    fn shutdown(&mut self) {
        log::info!("draining device queue before shutdown");
        self.device.poll(wgpu::Maintain::Wait);
    }

    fn fps(&self) -> f64 {
        self.fps.get()
    }
}

//
// ──────────────────────────────────────────────────────────────
//   Initialization Helpers
// ──────────────────────────────────────────────────────────────
//

fn create_buffers(
    device: &wgpu::Device,
    sizing: &DispatchSizing,
    width: u32,
    height: u32,
) -> (wgpu::Buffer, wgpu::Buffer, wgpu::Buffer, wgpu::Buffer) {
    use wgpu::util::DeviceExt;

    let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Camera Transform Buffer"),
        size: 16 * std::mem::size_of::<f32>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let output_size = sizing.output_floats() * std::mem::size_of::<f32>() as u64;

    let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Trace Output Buffer"),
        size: output_size,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    });

    let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Trace Staging Buffer"),
        size: output_size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let params = TraceParams {
        width,
        height,
        aspect: width as f32 / height as f32,
        half_fov_tan: (FIELD_OF_VIEW_DEG.to_radians() * 0.5).tan(),
    };

    let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Trace Params Buffer"),
        contents: bytemuck::bytes_of(&params),
        usage: wgpu::BufferUsages::UNIFORM,
    });

    (camera_buffer, output_buffer, staging_buffer, params_buffer)
}

fn create_pipeline(
    device: &wgpu::Device,
    sizing: &DispatchSizing,
    params_buffer: &wgpu::Buffer,
    camera_buffer: &wgpu::Buffer,
    output_buffer: &wgpu::Buffer,
) -> anyhow::Result<(wgpu::ComputePipeline, wgpu::BindGroup)> {
    // The workgroup size is only known once the device limits are, so it
    // is substituted into the WGSL source before compilation.
    let source = include_str!("shaders/raytracer.wgsl")
        .replace("{{WG_X}}", &sizing.local_x.to_string())
        .replace("{{WG_Y}}", &sizing.local_y.to_string());

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Trace Shader"),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let uniform_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Trace BGL"),
        entries: &[
            uniform_entry(0),
            uniform_entry(1),
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Trace BG"),
        layout: &layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: camera_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: output_buffer.as_entire_binding(),
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Trace Pipeline Layout"),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("Trace Pipeline"),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point: "trace",
        compilation_options: wgpu::PipelineCompilationOptions::default(),
    });

    Ok((pipeline, bind_group))
}

//
// ──────────────────────────────────────────────────────────────
//   Tests
// ──────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizing_for_the_default_window() {
        let sizing = DispatchSizing::compute(1024, 768, 256);

        assert_eq!(sizing.local_work_size, 256);
        assert_eq!(sizing.local_x, 16);
        assert_eq!(sizing.local_y, 16);
        assert_eq!(sizing.global_x, 1024);
        assert_eq!(sizing.global_y, 768);
        // 1024*768 is already a multiple of 256 — no padding
        assert_eq!(sizing.global_work_size, 786_432);
        assert_eq!(sizing.output_floats(), 786_432 * 3);
    }

    #[test]
    fn local_size_is_capped_at_256() {
        let sizing = DispatchSizing::compute(640, 480, 1024);
        assert_eq!(sizing.local_work_size, 256);

        let sizing = DispatchSizing::compute(640, 480, 64);
        assert_eq!(sizing.local_work_size, 64);
        assert_eq!(sizing.local_x, 8);
    }

    #[test]
    fn global_is_always_a_multiple_of_local() {
        let cases = [
            (1u32, 1u32, 256u32),
            (13, 7, 256),
            (1920, 1080, 256),
            (1023, 767, 200),
            (800, 600, 64),
            (333, 333, 100),
        ];

        for (w, h, max) in cases {
            let sizing = DispatchSizing::compute(w, h, max);
            assert_eq!(
                sizing.global_work_size % sizing.local_work_size as u64,
                0,
                "{w}x{h} max {max}"
            );
            assert!(sizing.global_work_size >= w as u64 * h as u64);
        }
    }

    #[test]
    fn square_root_split_never_exceeds_the_group_budget() {
        for max in [1u32, 4, 9, 64, 100, 128, 200, 255, 256, 1024] {
            let sizing = DispatchSizing::compute(640, 480, max);
            assert!(
                sizing.local_x * sizing.local_y <= sizing.local_work_size,
                "max {max}: {} x {} > {}",
                sizing.local_x,
                sizing.local_y,
                sizing.local_work_size
            );
        }
    }

    #[test]
    fn imperfect_square_truncates() {
        // 200 lanes split as 14x14 = 196; 4 lanes per group go unused
        let sizing = DispatchSizing::compute(640, 480, 200);
        assert_eq!(sizing.local_work_size, 200);
        assert_eq!(sizing.local_x, 14);
        assert_eq!(sizing.local_y, 14);
    }

    #[test]
    fn workgroups_cover_the_whole_grid() {
        let sizing = DispatchSizing::compute(1000, 700, 256);
        let (gx, gy) = sizing.workgroups();

        assert!(gx * sizing.local_x >= sizing.global_x);
        assert!(gy * sizing.local_y >= sizing.global_y);
        assert!((gx - 1) * sizing.local_x < sizing.global_x);
        assert!((gy - 1) * sizing.local_y < sizing.global_y);
    }

    #[test]
    fn fps_follows_the_half_life_average() {
        let mut fps = FpsCounter::default();
        assert!(fps.is_first_frame());

        // 16.666 ms frame -> 60 FPS; first sample lands at half weight
        fps.update(16_666_667);
        assert!(!fps.is_first_frame());
        assert!((fps.get() - 30.0).abs() < 0.01);

        fps.update(16_666_667);
        assert!((fps.get() - 45.0).abs() < 0.01);
    }
}
