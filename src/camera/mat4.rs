use glam::Vec3;

//
// ──────────────────────────────────────────────────────────────
//   Row-major 4x4 matrix helpers
//
//   Cell M_rc lives at index r*4 + c (0-indexed). The compute
//   kernel consumes the identical layout, so this convention and
//   raytracer.wgsl must stay in lock-step.
// ──────────────────────────────────────────────────────────────
//

pub type Mat16 = [f32; 16];

// Translation cells (column 3 of rows 0..2)
pub const M_14: usize = 3;
pub const M_24: usize = 7;
pub const M_34: usize = 11;

pub fn identity() -> Mat16
{
  let mut m = [0.0; 16];
  m[0] = 1.0;
  m[5] = 1.0;
  m[10] = 1.0;
  m[15] = 1.0;
  m
}

pub fn translation(v: Vec3) -> Mat16
{
  let mut m = identity();
  m[M_14] = v.x;
  m[M_24] = v.y;
  m[M_34] = v.z;
  m
}

/// Rotation about the world Y axis (horizontal look).
pub fn yaw_rotation(yaw: f64) -> Mat16
{
  let cos = yaw.cos() as f32;
  let sin = yaw.sin() as f32;

  let mut m = identity();
  m[0] = cos; // M_11
  m[2] = sin; // M_13
  m[8] = -sin; // M_31
  m[10] = cos; // M_33
  m
}

/// Rotation about the camera-local X axis (vertical look).
pub fn pitch_rotation(pitch: f64) -> Mat16
{
  let cos = pitch.cos() as f32;
  let sin = pitch.sin() as f32;

  let mut m = identity();
  m[5] = cos; // M_22
  m[6] = -sin; // M_23
  m[9] = sin; // M_32
  m[10] = cos; // M_33
  m
}

/// Standard 4x4 product, row-major on both sides.
pub fn multiply(a: &Mat16, b: &Mat16) -> Mat16
{
  let mut result = [0.0; 16];

  for row in 0..4
  {
    for col in 0..4
    {
      let mut sum = 0.0;
      for k in 0..4
      {
        sum += a[row * 4 + k] * b[k * 4 + col];
      }
      result[row * 4 + col] = sum;
    }
  }

  result
}

/// Apply the matrix to a point (w = 1, translation included).
pub fn transform_point(m: &Mat16, v: Vec3) -> Vec3
{
  Vec3::new(
    v.x * m[0] + v.y * m[1] + v.z * m[2] + m[M_14],
    v.x * m[4] + v.y * m[5] + v.z * m[6] + m[M_24],
    v.x * m[8] + v.y * m[9] + v.z * m[10] + m[M_34],
  )
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

  #[test]
  fn multiply_by_identity_is_noop()
  {
    let m = translation(Vec3::new(3.0, -2.0, 7.5));

    assert_eq!(multiply(&m, &identity()), m);
    assert_eq!(multiply(&identity(), &m), m);
  }

  #[test]
  fn translation_moves_a_point()
  {
    let m = translation(Vec3::new(1.0, 2.0, 3.0));
    let p = transform_point(&m, Vec3::new(10.0, 20.0, 30.0));

    assert_eq!(p, Vec3::new(11.0, 22.0, 33.0));
  }

  #[test]
  fn yaw_quarter_turn_maps_forward_to_minus_x()
  {
    let m = yaw_rotation(std::f64::consts::FRAC_PI_2);
    let v = transform_point(&m, Vec3::new(0.0, 0.0, -1.0));

    assert!((v.x - -1.0).abs() < 1e-6);
    assert!(v.y.abs() < 1e-6);
    assert!(v.z.abs() < 1e-6);
  }

  #[test]
  fn pitch_quarter_turn_maps_forward_to_up()
  {
    let m = pitch_rotation(std::f64::consts::FRAC_PI_2);
    let v = transform_point(&m, Vec3::new(0.0, 0.0, -1.0));

    assert!(v.x.abs() < 1e-6);
    assert!((v.y - 1.0).abs() < 1e-6);
    assert!(v.z.abs() < 1e-6);
  }
}
