use std::sync::{Mutex, MutexGuard};

//
// ──────────────────────────────────────────────────────────────
//   FrameExchange
//
//   Double-buffered handoff between the compute pipeline and the
//   presenter. The dispatcher writes into its privately owned
//   back buffer and publishes it with a swap under the lock, so
//   the presenter never observes a half-written frame.
// ──────────────────────────────────────────────────────────────
//

pub struct FrameExchange
{
  front: Mutex<Vec<f32>>,
}

impl FrameExchange
{
  /// `len` is the f32 cell count of one frame (padded pixels × 3).
  pub fn new(len: usize) -> Self
  {
    Self { front: Mutex::new(vec![0.0; len]) }
  }

  /// Swap the freshly written back buffer with the presented front
  /// buffer. The caller gets the previous front back, ready to be
  /// overwritten by the next frame.
  pub fn publish(&self, back: &mut Vec<f32>)
  {
    let mut front = self.front.lock().unwrap();
    std::mem::swap(&mut *front, back);
  }

  /// The most recently published frame, held under the lock while
  /// the presenter uploads it.
  pub fn front(&self) -> MutexGuard<'_, Vec<f32>>
  {
    self.front.lock().unwrap()
  }
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn publish_swaps_back_and_front()
  {
    let exchange = FrameExchange::new(3);
    let mut back = vec![1.0, 2.0, 3.0];

    exchange.publish(&mut back);

    assert_eq!(*exchange.front(), vec![1.0, 2.0, 3.0]);
    assert_eq!(back, vec![0.0, 0.0, 0.0]);
  }

  #[test]
  fn successive_frames_recycle_buffers()
  {
    let exchange = FrameExchange::new(2);
    let mut back = vec![1.0, 1.0];

    exchange.publish(&mut back);
    back.fill(2.0);
    exchange.publish(&mut back);

    assert_eq!(*exchange.front(), vec![2.0, 2.0]);
    assert_eq!(back, vec![1.0, 1.0]);
  }
}
