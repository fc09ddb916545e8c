//! Frame source boundary.
//!
//! Real grabbers (screen capture, video players) are collaborators behind the
//! [`FrameSource`] trait; the engine only needs "hand me the current frame"
//! plus a wake-up when a new one exists. The capture task publishes frames
//! through a `watch` channel, so the newest frame is always available without
//! queueing and the channel's change notification doubles as the new-frame
//! signal the analysis loop waits on.

use std::sync::Arc;
use std::time::Duration;

use image::{Rgba, RgbaImage};
use tokio::sync::watch;
use tokio::time;

use crate::core_modules::color::{Rgb, norm_hue};

/// A collaborator that can hand out the most recent video frame.
pub trait FrameSource: Send + 'static {
    fn dimensions(&self) -> (u32, u32);

    /// Produces the current frame. Called once per capture round.
    fn frame(&mut self) -> RgbaImage;
}

/// Spawns the capture loop: polls the source at a fixed cadence and publishes
/// each frame. Returns the receiving end handed to the analysis loop.
pub fn spawn_capture<S: FrameSource>(
    mut source: S,
    period: Duration,
) -> watch::Receiver<Arc<RgbaImage>> {
    let (sender, receiver) = watch::channel(Arc::new(source.frame()));
    tokio::spawn(async move {
        loop {
            time::sleep(period).await;
            if sender.send(Arc::new(source.frame())).is_err() {
                // All consumers are gone; nothing left to capture for.
                break;
            }
        }
    });
    receiver
}

/// Synthetic stand-in source: two complementary hue fields drifting slowly
/// around the color wheel. Drives the demo mode and the integration tests.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    tick: u64,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tick: 0,
        }
    }
}

impl FrameSource for TestPatternSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn frame(&mut self) -> RgbaImage {
        self.tick += 1;
        let left_hue = norm_hue((self.tick % 4096) as f32 / 4096.0);
        let right_hue = norm_hue(left_hue + 0.5);
        let split = self.width / 2;
        RgbaImage::from_fn(self.width, self.height, |x, _y| {
            let hue = if x < split { left_hue } else { right_hue };
            let color = Rgb::from_hue(hue);
            Rgba([color.red, color.green, color.blue, 255])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_splits_the_frame_into_two_hue_fields() {
        let mut source = TestPatternSource::new(64, 32);
        let frame = source.frame();
        assert_eq!(frame.dimensions(), (64, 32));
        let left = frame.get_pixel(0, 0);
        let right = frame.get_pixel(63, 0);
        assert_ne!(left, right);
    }

    #[test]
    fn test_pattern_drifts_over_time() {
        let mut source = TestPatternSource::new(8, 8);
        let first = source.frame();
        for _ in 0..200 {
            source.frame();
        }
        let later = source.frame();
        assert_ne!(first.get_pixel(0, 0), later.get_pixel(0, 0));
    }
}
