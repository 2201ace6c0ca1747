mod mat4;
mod matrix;

pub use matrix::CameraMatrix;
