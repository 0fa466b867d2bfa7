//! Rolling frame-rate measurement for the debug readout

/// Frames the average spans
const WINDOW: usize = 60;

/// Frame rate averaged over the last [`WINDOW`] display frames
#[derive(Debug, Clone)]
pub struct FrameRate {
    times: [Option<f64>; WINDOW],
    index: usize,
    fps: u32,
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRate {
    pub fn new() -> Self {
        Self {
            times: [None; WINDOW],
            index: 0,
            fps: 0,
        }
    }

    /// Record a frame at host time `now` (seconds)
    ///
    /// Returns the rate once a full window has been seen.
    pub fn record(&mut self, now: f64) -> Option<u32> {
        let oldest = self.times[self.index];
        self.times[self.index] = Some(now);
        self.index = (self.index + 1) % WINDOW;

        let elapsed = now - oldest?;
        if elapsed <= 0.0 {
            return None;
        }
        self.fps = (WINDOW as f64 / elapsed).round() as u32;
        Some(self.fps)
    }

    /// Last measured rate, 0 until the window fills
    pub fn fps(&self) -> u32 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rate_until_window_fills() {
        let mut rate = FrameRate::new();
        for i in 0..WINDOW {
            assert_eq!(rate.record(i as f64 / 60.0), None);
        }
        assert_eq!(rate.fps(), 0);
        assert_eq!(rate.record(1.0), Some(60));
    }

    #[test]
    fn test_rate_follows_frame_spacing() {
        let mut rate = FrameRate::new();
        let mut now = 0.0;
        for _ in 0..=WINDOW * 2 {
            rate.record(now);
            now += 1.0 / 30.0;
        }
        assert_eq!(rate.fps(), 30);
    }

    #[test]
    fn test_stalled_clock_reports_nothing() {
        let mut rate = FrameRate::new();
        for _ in 0..=WINDOW {
            assert_eq!(rate.record(5.0), None);
        }
    }
}
