use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use winit::{
  application::ApplicationHandler,
  dpi::PhysicalSize,
  event::WindowEvent,
  event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
  keyboard::KeyCode,
  window::{Window, WindowId},
};

use crate::camera::CameraMatrix;
use crate::input::InputState;
use crate::present::Presenter;
use crate::tracer::{FrameDispatcher, FrameSource, GpuContext};

const TITLE: &str = concat!("Lucent ", env!("CARGO_PKG_VERSION"));
const DEFAULT_WIDTH: u32 = 1024;
const DEFAULT_HEIGHT: u32 = 768;

// While paused (window unfocused) the loop wakes this often just to pump
// OS events.
const PAUSE_POLL: Duration = Duration::from_millis(500);

pub fn run() -> anyhow::Result<()>
{
  let event_loop = EventLoop::new().context("failed to create event loop")?;
  let mut app = LucentApp::new();

  event_loop.run_app(&mut app).context("event loop terminated abnormally")?;

  // Startup or per-frame failures surface here once the loop has unwound
  match app.failure
  {
    Some(err) => Err(err),
    None => Ok(()),
  }
}

enum RunState
{
  Running,
  Paused,
}

struct LucentApp
{
  window: Option<Arc<Window>>,
  presenter: Option<Presenter>,
  source: Option<Box<dyn FrameSource>>,
  camera: Arc<Mutex<CameraMatrix>>,
  input: InputState,
  state: RunState,
  failure: Option<anyhow::Error>,
}

impl LucentApp
{
  fn new() -> Self
  {
    Self {
      window: None,
      presenter: None,
      source: None,
      camera: Arc::new(Mutex::new(CameraMatrix::new())),
      input: InputState::new(),
      state: RunState::Running,
      failure: None,
    }
  }

  fn init_window_and_tracer(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()>
  {
    if self.window.is_some()
    {
      return Ok(());
    }

    let attrs = Window::default_attributes()
      .with_title(TITLE)
      .with_inner_size(PhysicalSize::new(DEFAULT_WIDTH, DEFAULT_HEIGHT));
    let window = Arc::new(event_loop.create_window(attrs).context("failed to create window")?);

    let (ctx, surface) = pollster::block_on(GpuContext::new(window.clone()))?;

    let size = window.inner_size();
    let dispatcher = FrameDispatcher::new(&ctx, size.width, size.height, self.camera.clone())?;

    let presenter = Presenter::new(
      &ctx,
      surface,
      size.width,
      size.height,
      dispatcher.exchange_len(),
      dispatcher.exchange(),
    );

    self.window = Some(window);
    self.presenter = Some(presenter);
    self.source = Some(Box::new(dispatcher));

    Ok(())
  }

  fn handle_window_event(&mut self, elwt: &ActiveEventLoop, window_id: WindowId, event: WindowEvent)
  {
    let window = match &self.window
    {
      Some(w) if w.id() == window_id => w.clone(),
      _ => return,
    };

    self.input.handle_event(&event);

    match event
    {
      WindowEvent::CloseRequested =>
      {
        // Terminal: drain the device, drop resources, leave the loop
        if let Some(source) = &mut self.source
        {
          source.shutdown();
        }
        elwt.exit();
      }

      WindowEvent::Focused(focused) =>
      {
        self.state = if focused { RunState::Running } else { RunState::Paused };
        if let Some(source) = &mut self.source
        {
          source.set_paused(!focused);
        }
        log::debug!("{}", if focused { "resumed" } else { "paused" });
      }

      WindowEvent::Resized(size) =>
      {
        if size.width == 0 || size.height == 0
        {
          return;
        }

        // Surface only — the dispatch keeps its startup sizing
        if let Some(presenter) = &mut self.presenter
        {
          presenter.resize(size.width, size.height);
        }

        window.request_redraw();
      }

      _ =>
      {}
    }
  }

  fn frame(&mut self, elwt: &ActiveEventLoop)
  {
    let (Some(window), Some(source), Some(presenter)) =
      (&self.window, &mut self.source, &mut self.presenter)
    else
    {
      return;
    };

    update_camera(&self.camera, &mut self.input);

    if let Err(err) = source.render_frame()
    {
      // No frame-level retry: a failed dispatch or transfer ends the run
      self.failure = Some(err);
      elwt.exit();
      return;
    }

    presenter.render();
    window.set_title(&format!("{TITLE} @ {:.0} FPS", source.fps()));
  }
}

impl ApplicationHandler for LucentApp
{
  fn resumed(&mut self, event_loop: &ActiveEventLoop)
  {
    if let Err(err) = self.init_window_and_tracer(event_loop)
    {
      self.failure = Some(err);
      event_loop.exit();
    }
  }

  fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent)
  {
    self.handle_window_event(event_loop, window_id, event);
  }

  fn about_to_wait(&mut self, event_loop: &ActiveEventLoop)
  {
    match self.state
    {
      RunState::Running =>
      {
        event_loop.set_control_flow(ControlFlow::Poll);
        self.frame(event_loop);
      }

      RunState::Paused =>
      {
        event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + PAUSE_POLL));
      }
    }
  }
}

/// Poll the held-keys set once per frame and apply movement, then drain
/// the accumulated mouse-drag rotation.
fn update_camera(camera: &Arc<Mutex<CameraMatrix>>, input: &mut InputState)
{
  let mut cam = camera.lock().unwrap();

  if input.is_held(KeyCode::KeyW) || input.is_held(KeyCode::ArrowUp)
  {
    cam.move_forward();
  }
  if input.is_held(KeyCode::KeyA) || input.is_held(KeyCode::ArrowLeft)
  {
    cam.move_left();
  }
  if input.is_held(KeyCode::KeyS) || input.is_held(KeyCode::ArrowDown)
  {
    cam.move_backward();
  }
  if input.is_held(KeyCode::KeyD) || input.is_held(KeyCode::ArrowRight)
  {
    cam.move_right();
  }
  if input.is_held(KeyCode::Space)
  {
    cam.move_up();
  }
  if input.is_held(KeyCode::ShiftLeft) || input.is_held(KeyCode::ShiftRight)
  {
    cam.move_down();
  }

  let (delta_yaw, delta_pitch) = input.take_rotation();
  if delta_yaw != 0.0 || delta_pitch != 0.0
  {
    cam.rotate(delta_yaw, delta_pitch);
  }
}
