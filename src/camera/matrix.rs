use glam::Vec3;

use super::mat4::{self, Mat16, M_14, M_24, M_34};

//
// ──────────────────────────────────────────────────────────────
//   CameraMatrix
//
//   Free-look camera driven by the input layer. Owns the 16-float
//   row-major transform that the compute kernel consumes; the
//   dispatcher uploads it to the device once per frame, so after
//   any mutator returns the host buffer is the source of truth.
//
//   The full transform is Translation * Yaw * Pitch — rotation is
//   applied in camera-local space, not world space, so this is
//   intentionally not a conventional view matrix. The order must
//   not change.
// ──────────────────────────────────────────────────────────────
//

const MOVE_SPEED: f32 = 1.0; // world units per frame-tick
const SENSITIVITY: f64 = 0.005; // radians per pixel of mouse drag
const MAX_PITCH: f64 = 1.0;
const MIN_PITCH: f64 = -1.0;
const MAX_YAW: f64 = 2.0 * std::f64::consts::PI;

// The un-rotated look direction
const BASE_FORWARD: Vec3 = Vec3::new(0.0, 0.0, -1.0);

pub struct CameraMatrix
{
  position: Vec3,
  direction: Vec3,
  yaw: f64,
  pitch: f64,
  transform: Mat16,
}

impl CameraMatrix
{
  pub fn new() -> Self
  {
    Self {
      position: Vec3::ZERO,
      direction: BASE_FORWARD,
      yaw: 0.0,
      pitch: 0.0,
      transform: mat4::identity(),
    }
  }

  pub fn transform(&self) -> &Mat16
  {
    &self.transform
  }

  //
  // Translations patch only the affected translation cells; the
  // rotation sub-block is untouched, so no full recompute is needed.
  //

  pub fn move_forward(&mut self)
  {
    self.position.x += self.direction.x * MOVE_SPEED;
    self.position.z += self.direction.z * MOVE_SPEED;
    self.patch_horizontal();
  }

  pub fn move_backward(&mut self)
  {
    self.position.x -= self.direction.x * MOVE_SPEED;
    self.position.z -= self.direction.z * MOVE_SPEED;
    self.patch_horizontal();
  }

  /// Strafe along the horizontal perpendicular of the look direction.
  pub fn move_left(&mut self)
  {
    self.position.x -= self.direction.z * MOVE_SPEED;
    self.position.z += self.direction.x * MOVE_SPEED;
    self.patch_horizontal();
  }

  pub fn move_right(&mut self)
  {
    self.position.x += self.direction.z * MOVE_SPEED;
    self.position.z -= self.direction.x * MOVE_SPEED;
    self.patch_horizontal();
  }

  pub fn move_up(&mut self)
  {
    self.position.y += MOVE_SPEED;
    self.transform[M_24] = self.position.y;
  }

  pub fn move_down(&mut self)
  {
    self.position.y -= MOVE_SPEED;
    self.transform[M_24] = self.position.y;
  }

  /// Accumulate a mouse-drag rotation. `delta_yaw`/`delta_pitch` are in
  /// pixels; SENSITIVITY converts them to radians. Yaw wraps at ±2π,
  /// pitch clamps to ±1 rad (deliberately short of ±π/2 so the camera
  /// can never flip over the zenith).
  pub fn rotate(&mut self, delta_yaw: f64, delta_pitch: f64)
  {
    self.yaw += delta_yaw * SENSITIVITY;
    if self.yaw > MAX_YAW
    {
      self.yaw -= MAX_YAW;
    }
    else if self.yaw < -MAX_YAW
    {
      self.yaw += MAX_YAW;
    }

    self.pitch = (self.pitch + delta_pitch * SENSITIVITY).clamp(MIN_PITCH, MAX_PITCH);

    let rotation = mat4::multiply(&mat4::yaw_rotation(self.yaw), &mat4::pitch_rotation(self.pitch));
    self.direction = mat4::transform_point(&rotation, BASE_FORWARD);

    self.transform = mat4::multiply(&mat4::translation(self.position), &rotation);
  }

  fn patch_horizontal(&mut self)
  {
    self.transform[M_14] = self.position.x;
    self.transform[M_34] = self.position.z;
  }
}

//
// ──────────────────────────────────────────────────────────────
//   Tests
// ──────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests
{
  use super::*;

  fn rotation_block(m: &Mat16) -> [f32; 9]
  {
    [m[0], m[1], m[2], m[4], m[5], m[6], m[8], m[9], m[10]]
  }

  #[test]
  fn starts_at_origin_looking_down_negative_z()
  {
    let cam = CameraMatrix::new();

    assert_eq!(cam.position, Vec3::ZERO);
    assert_eq!(cam.direction, Vec3::new(0.0, 0.0, -1.0));
    assert_eq!(*cam.transform(), mat4::identity());
  }

  #[test]
  fn forward_then_backward_restores_position()
  {
    let mut cam = CameraMatrix::new();
    cam.rotate(123.0, -40.0);
    let before = cam.position;

    cam.move_forward();
    cam.move_backward();

    // Exact under float addition with matching magnitudes
    assert_eq!(cam.position, before);
  }

  #[test]
  fn left_then_right_restores_position()
  {
    let mut cam = CameraMatrix::new();
    cam.rotate(-77.0, 12.0);
    let before = cam.position;

    cam.move_left();
    cam.move_right();

    assert_eq!(cam.position, before);
  }

  #[test]
  fn vertical_moves_patch_only_the_y_cell()
  {
    let mut cam = CameraMatrix::new();
    cam.rotate(50.0, 20.0);
    let before = *cam.transform();

    cam.move_up();
    cam.move_up();
    cam.move_down();

    let after = cam.transform();
    assert_eq!(after[M_24], 1.0);
    for i in 0..16
    {
      if i != M_24
      {
        assert_eq!(after[i], before[i], "cell {i} changed");
      }
    }
  }

  #[test]
  fn translations_leave_rotation_block_untouched()
  {
    let mut cam = CameraMatrix::new();
    cam.rotate(200.0, -150.0);
    let before = rotation_block(cam.transform());

    cam.move_forward();
    cam.move_left();
    cam.move_up();
    cam.move_backward();

    assert_eq!(rotation_block(cam.transform()), before);
  }

  #[test]
  fn rotate_two_hundred_pixels_adds_one_radian_of_yaw()
  {
    let mut cam = CameraMatrix::new();
    cam.rotate(200.0, 0.0);

    assert_eq!(cam.yaw, 1.0);
  }

  #[test]
  fn yaw_wraps_past_two_pi()
  {
    let mut cam = CameraMatrix::new();

    // 7 radians of accumulated yaw, applied in one-radian steps
    for _ in 0..7
    {
      cam.rotate(200.0, 0.0);
    }

    assert!((cam.yaw - (7.0 - MAX_YAW)).abs() < 1e-12);
    assert!(cam.yaw > -MAX_YAW && cam.yaw <= MAX_YAW);
  }

  #[test]
  fn yaw_stays_in_range_under_arbitrary_drags()
  {
    // Single-step wrap: holds as long as one drag stays under 2π radians
    // (~1256 px at 0.005 rad/px), which a frame's worth of mouse motion does
    let mut cam = CameraMatrix::new();
    let drags = [500.0, -1200.0, 911.0, 1100.0, -3.5, -950.0, 1234.0, -1256.0];

    for d in drags
    {
      cam.rotate(d, 0.0);
      assert!(cam.yaw > -MAX_YAW && cam.yaw <= MAX_YAW, "yaw out of range: {}", cam.yaw);
    }
  }

  #[test]
  fn pitch_clamps_instead_of_wrapping()
  {
    let mut cam = CameraMatrix::new();

    cam.rotate(0.0, 100_000.0);
    assert_eq!(cam.pitch, MAX_PITCH);

    cam.rotate(0.0, -1_000_000.0);
    assert_eq!(cam.pitch, MIN_PITCH);
  }

  #[test]
  fn rotation_block_matches_analytic_product()
  {
    let mut cam = CameraMatrix::new();
    cam.rotate(321.0, -87.0);

    let expected =
      mat4::multiply(&mat4::yaw_rotation(cam.yaw), &mat4::pitch_rotation(cam.pitch));

    assert_eq!(rotation_block(cam.transform()), rotation_block(&expected));
  }

  #[test]
  fn rotate_preserves_current_translation()
  {
    let mut cam = CameraMatrix::new();
    cam.move_forward();
    cam.move_up();

    cam.rotate(90.0, 45.0);

    let m = cam.transform();
    assert_eq!(m[M_14], cam.position.x);
    assert_eq!(m[M_24], cam.position.y);
    assert_eq!(m[M_34], cam.position.z);
  }

  #[test]
  fn direction_follows_yaw()
  {
    let mut cam = CameraMatrix::new();

    // π/2 of yaw: forward swings from -Z to -X
    cam.rotate(std::f64::consts::FRAC_PI_2 / SENSITIVITY, 0.0);

    let dir = cam.direction;
    assert!((dir.x - -1.0).abs() < 1e-6);
    assert!(dir.z.abs() < 1e-6);
  }
}
