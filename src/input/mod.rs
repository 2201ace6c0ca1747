use std::collections::HashSet;

use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

//
// ──────────────────────────────────────────────────────────────
//   InputState
//
//   Keyboard: OS auto-repeat is filtered out; only edge
//   transitions land in the held-keys set, which the app polls
//   once per frame.
//
//   Mouse: rotation is gated on the right button. While it is
//   held, cursor motion accumulates pixel deltas (screen Y
//   inverted) that the app drains into one rotate() call per
//   frame. Releasing the button or leaving the window drops the
//   anchor; already-accumulated deltas still apply.
// ──────────────────────────────────────────────────────────────
//

pub struct InputState
{
  keys: HashSet<KeyCode>,
  cursor: (f64, f64),
  anchor: Option<(f64, f64)>,
  pending_yaw: f64,
  pending_pitch: f64,
}

impl InputState
{
  pub fn new() -> Self
  {
    Self {
      keys: HashSet::new(),
      cursor: (0.0, 0.0),
      anchor: None,
      pending_yaw: 0.0,
      pending_pitch: 0.0,
    }
  }

  pub fn handle_event(&mut self, event: &WindowEvent)
  {
    match event
    {
      WindowEvent::KeyboardInput { event, .. } =>
      {
        // Auto-repeat only re-announces a key we already track
        if event.repeat
        {
          return;
        }

        if let PhysicalKey::Code(code) = event.physical_key
        {
          self.key_transition(code, event.state == ElementState::Pressed);
        }
      }

      WindowEvent::CursorMoved { position, .. } =>
      {
        self.cursor_moved(position.x, position.y);
      }

      WindowEvent::MouseInput { state, button: MouseButton::Right, .. } =>
      {
        self.rotate_button(*state == ElementState::Pressed);
      }

      WindowEvent::CursorLeft { .. } =>
      {
        self.anchor = None;
      }

      _ =>
      {}
    }
  }

  pub fn is_held(&self, code: KeyCode) -> bool
  {
    self.keys.contains(&code)
  }

  /// Drain the rotation accumulated since the last frame.
  pub fn take_rotation(&mut self) -> (f64, f64)
  {
    let delta = (self.pending_yaw, self.pending_pitch);
    self.pending_yaw = 0.0;
    self.pending_pitch = 0.0;
    delta
  }

  fn key_transition(&mut self, code: KeyCode, pressed: bool)
  {
    if pressed
    {
      self.keys.insert(code);
    }
    else
    {
      self.keys.remove(&code);
    }
  }

  fn cursor_moved(&mut self, x: f64, y: f64)
  {
    if let Some((ax, ay)) = self.anchor
    {
      self.pending_yaw += x - ax;
      self.pending_pitch += ay - y;
      self.anchor = Some((x, y));
    }

    self.cursor = (x, y);
  }

  fn rotate_button(&mut self, pressed: bool)
  {
    self.anchor = if pressed { Some(self.cursor) } else { None };
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

  #[test]
  fn drag_accumulates_deltas_with_inverted_y()
  {
    let mut input = InputState::new();

    input.cursor_moved(100.0, 100.0);
    input.rotate_button(true);
    input.cursor_moved(110.0, 104.0);
    input.cursor_moved(115.0, 90.0);

    assert_eq!(input.take_rotation(), (15.0, 10.0));
    assert_eq!(input.take_rotation(), (0.0, 0.0));
  }

  #[test]
  fn motion_without_the_button_is_ignored()
  {
    let mut input = InputState::new();

    input.cursor_moved(10.0, 10.0);
    input.cursor_moved(500.0, 500.0);

    assert_eq!(input.take_rotation(), (0.0, 0.0));
  }

  #[test]
  fn release_keeps_accumulated_delta_but_stops_tracking()
  {
    let mut input = InputState::new();

    input.cursor_moved(0.0, 0.0);
    input.rotate_button(true);
    input.cursor_moved(20.0, -5.0);
    input.rotate_button(false);
    input.cursor_moved(300.0, 300.0);

    assert_eq!(input.take_rotation(), (20.0, 5.0));
  }

  #[test]
  fn held_keys_track_edge_transitions()
  {
    let mut input = InputState::new();

    input.key_transition(KeyCode::KeyW, true);
    input.key_transition(KeyCode::Space, true);
    assert!(input.is_held(KeyCode::KeyW));
    assert!(input.is_held(KeyCode::Space));

    input.key_transition(KeyCode::KeyW, false);
    assert!(!input.is_held(KeyCode::KeyW));
    assert!(input.is_held(KeyCode::Space));
  }
}
