//! Time management utilities

use std::time::{Duration, Instant};

/// Frame timer measuring elapsed time since start and per-frame deltas
pub struct Timer {
    start: Instant,
    last_frame: Instant,
    delta_time: f32,
    frame_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create a new timer starting now
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            delta_time: 0.0,
            frame_count: 0,
        }
    }

    /// Record the end of a frame (call once per presented frame)
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.delta_time = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.frame_count += 1;
    }

    /// Seconds since the timer was created
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Time since the timer was created
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get the time between the last two ticks in seconds
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Get the number of ticks so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average frames per second over the timer's lifetime
    pub fn average_fps(&self) -> f32 {
        Self::fps_over(self.frame_count, self.elapsed())
    }

    fn fps_over(frames: u64, elapsed: Duration) -> f32 {
        let secs = elapsed.as_secs_f32();
        if secs > 0.0 {
            frames as f32 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tick_counts_frames() {
        let mut timer = Timer::new();
        timer.tick();
        timer.tick();
        assert_eq!(timer.frame_count(), 2);
        assert!(timer.delta_time() >= 0.0);
    }

    #[test]
    fn test_fps_over_zero_duration_is_zero() {
        assert_relative_eq!(Timer::fps_over(10, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_fps_over_two_seconds() {
        assert_relative_eq!(Timer::fps_over(120, Duration::from_secs(2)), 60.0);
    }
}
