mod app;
mod camera;
mod frame;
mod input;
mod present;
mod tracer;

fn main()
{
  // Initialise the logger so wgpu validation errors and warnings appear in the console.
  // Set RUST_LOG=warn for less output or RUST_LOG=wgpu=debug for more verbose GPU output.

  std::env::set_var("RUST_LOG", "info,wgpu_hal=off,naga=warn");
  env_logger::init();

  if let Err(err) = app::run()
  {
    log::error!("fatal: {err:#}");
    std::process::exit(1);
  }
}
